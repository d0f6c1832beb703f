//! Events tools backed by a built-in catalogue.

use agent_faults::ToolCall;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::collections::BTreeSet;

pub const FETCH_EVENTS: &str = "fetch_events";
pub const FETCH_VENUES: &str = "fetch_venues";

pub const TOOLS: [&str; 2] = [FETCH_EVENTS, FETCH_VENUES];

const VENUE_WORDS: [&str; 3] = ["venue", "venues", "where"];

/// Argument naming the city whose listings a call actually serves.
pub const LISTINGS_FROM: &str = "listings_from";

/// (name, type, venue)
type Listing = (&'static str, &'static str, &'static str);

const CATALOGUE: &[(&str, [Listing; 3])] = &[
    (
        "paris",
        [
            ("Louvre Late Night", "museum", "Louvre Museum"),
            ("Seine River Cruise", "tour", "Port de la Bourdonnais"),
            ("Jazz at Le Caveau", "music", "Le Caveau de la Huchette"),
        ],
    ),
    (
        "london",
        [
            ("West End Show", "theater", "Various"),
            ("Borough Market Food Tour", "food", "Borough Market"),
            ("British Museum Exhibition", "museum", "British Museum"),
        ],
    ),
    (
        "tokyo",
        [
            ("Shibuya Night Walk", "tour", "Shibuya"),
            ("Tsukiji Outer Market", "food", "Tsukiji"),
            ("Robot Restaurant Show", "entertainment", "Shinjuku"),
        ],
    ),
    (
        "berlin",
        [
            ("Berlin Wall Tour", "tour", "East Side Gallery"),
            ("Techno Night", "music", "Berghain"),
            ("Museum Island Visit", "museum", "Museum Island"),
        ],
    ),
    (
        "new york",
        [
            ("Broadway Show", "theater", "Times Square"),
            ("Central Park Walk", "tour", "Central Park"),
            ("Jazz at Blue Note", "music", "Blue Note"),
        ],
    ),
    (
        "sydney",
        [
            ("Opera House Tour", "tour", "Sydney Opera House"),
            ("Bondi Beach Day", "outdoor", "Bondi Beach"),
            ("Harbour Bridge Climb", "adventure", "Sydney Harbour"),
        ],
    ),
    (
        "mumbai",
        [
            ("Bollywood Studio Tour", "tour", "Film City"),
            ("Street Food Walk", "food", "Chowpatty Beach"),
            ("Gateway of India Visit", "landmark", "Gateway of India"),
        ],
    ),
    (
        "seattle",
        [
            ("Pike Place Market Tour", "food", "Pike Place"),
            ("Space Needle Visit", "landmark", "Space Needle"),
            ("Coffee Crawl", "food", "Capitol Hill"),
        ],
    ),
];

pub fn classify(words: &[String], location: &str) -> ToolCall {
    let name = if words.iter().any(|w| VENUE_WORDS.contains(&w.as_str())) {
        FETCH_VENUES
    } else {
        FETCH_EVENTS
    };
    ToolCall::new(name, json!({ "destination": location }))
}

pub fn alternate(current: &ToolCall) -> ToolCall {
    let name = if current.name == FETCH_EVENTS {
        FETCH_VENUES
    } else {
        FETCH_EVENTS
    };
    ToolCall::new(name, current.arguments.clone())
}

pub fn execute(call: &ToolCall) -> Option<Value> {
    let destination = call.arguments["destination"].as_str().unwrap_or("Unknown");
    let source = call.arguments[LISTINGS_FROM].as_str().unwrap_or(destination);
    match call.name.as_str() {
        FETCH_EVENTS => Some(events(destination, source)),
        FETCH_VENUES => Some(venues(destination, source)),
        _ => None,
    }
}

/// Same tool, serving `city`'s listings or a random other catalogue city's
/// under the requested destination.
pub fn relocate(call: &ToolCall, city: Option<&str>) -> Option<ToolCall> {
    let destination = call.arguments["destination"].as_str().unwrap_or("Unknown");
    let source = match city.map(str::trim).filter(|c| !c.is_empty()) {
        Some(city) => city.to_string(),
        None => other_city(destination)?.to_string(),
    };
    let mut arguments = call.arguments.clone();
    arguments[LISTINGS_FROM] = json!(source);
    Some(ToolCall::new(call.name.clone(), arguments))
}

fn other_city(destination: &str) -> Option<&'static str> {
    let key = destination.trim().to_lowercase();
    let others: Vec<&str> = CATALOGUE
        .iter()
        .map(|(city, _)| *city)
        .filter(|city| *city != key)
        .collect();
    others.choose(&mut rand::thread_rng()).copied()
}

/// The payload with no events or venues left in it.
pub fn hollow(payload: &Value) -> Option<Value> {
    let mut hollowed = payload.clone();
    let destination = payload["destination"].as_str().unwrap_or("Unknown");
    if payload.get("events").is_some() {
        hollowed["events"] = json!([]);
        hollowed["count"] = json!(0);
        hollowed["summary"] = json!(format!("No events found in {}.", destination));
    } else if payload.get("venues").is_some() {
        hollowed["venues"] = json!([]);
        hollowed["summary"] = json!(format!("No venues found in {}.", destination));
    } else {
        return None;
    }
    Some(hollowed)
}

fn listings(destination: &str) -> Vec<Value> {
    let key = destination.trim().to_lowercase();
    match CATALOGUE.iter().find(|(city, _)| *city == key) {
        Some((_, entries)) => entries
            .iter()
            .map(|(name, kind, venue)| json!({ "name": name, "type": kind, "venue": venue }))
            .collect(),
        None => vec![
            json!({ "name": format!("{} Food Festival", destination), "type": "food", "venue": "TBD" }),
            json!({ "name": format!("{} Art Walk", destination), "type": "art", "venue": "TBD" }),
            json!({ "name": format!("Live Music at {} Park", destination), "type": "music", "venue": format!("{} Park", destination) }),
        ],
    }
}

fn events(destination: &str, source: &str) -> Value {
    let events = listings(source);
    let names: Vec<&str> = events
        .iter()
        .take(2)
        .filter_map(|e| e["name"].as_str())
        .collect();
    json!({
        "summary": format!("Check out {}.", names.join(", ")),
        "destination": destination,
        "count": events.len(),
        "events": events,
    })
}

fn venues(destination: &str, source: &str) -> Value {
    let venues = unique_venues(&listings(source));
    json!({
        "summary": format!("Popular venues in {}: {}.", destination, venues.join(", ")),
        "destination": destination,
        "venues": venues,
    })
}

/// Venue names in first-seen order, each once.
fn unique_venues(listings: &[Value]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    listings
        .iter()
        .filter_map(|e| e["venue"].as_str())
        .filter(|venue| seen.insert(*venue))
        .map(str::to_string)
        .collect()
}

/// Invented listing that no catalogue backs.
pub fn fabricate(destination: &str) -> Value {
    json!({
        "summary": format!("Check out the {} Midnight Lantern Parade.", destination),
        "destination": destination,
        "count": 1,
        "events": [
            { "name": format!("{} Midnight Lantern Parade", destination), "type": "festival", "venue": "Old Town" }
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        crate::profiles::words(s)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&words("What's on in Paris?"), "Paris").name, FETCH_EVENTS);
        assert_eq!(classify(&words("Where should I go in Tokyo"), "Tokyo").name, FETCH_VENUES);
    }

    #[test]
    fn test_alternate_swaps() {
        let events = classify(&words("events"), "Paris");
        assert_eq!(alternate(&events).name, FETCH_VENUES);
        assert_eq!(alternate(&alternate(&events)).name, FETCH_EVENTS);
    }

    #[test]
    fn test_catalogue_lookup_is_case_insensitive() {
        let data = execute(&ToolCall::new(FETCH_EVENTS, json!({"destination": "New York"}))).unwrap();
        assert_eq!(data["events"][0]["name"], "Broadway Show");
        assert_eq!(data["count"], 3);
        assert_eq!(data["summary"], "Check out Broadway Show, Central Park Walk.");
    }

    #[test]
    fn test_unknown_city_gets_generic_listing() {
        let data = execute(&ToolCall::new(FETCH_EVENTS, json!({"destination": "Reykjavik"}))).unwrap();
        assert_eq!(data["events"][0]["name"], "Reykjavik Food Festival");
    }

    #[test]
    fn test_venues() {
        let data = execute(&ToolCall::new(FETCH_VENUES, json!({"destination": "paris"}))).unwrap();
        assert_eq!(data["venues"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_venues_deduplicated_wherever_they_repeat() {
        let listings = vec![
            json!({"venue": "Blue Note"}),
            json!({"venue": "Central Park"}),
            json!({"venue": "Blue Note"}),
            json!({"venue": "Times Square"}),
            json!({"venue": "Central Park"}),
        ];
        assert_eq!(
            unique_venues(&listings),
            vec!["Blue Note", "Central Park", "Times Square"]
        );
    }

    #[test]
    fn test_relocated_call_serves_other_city_under_same_destination() {
        let call = classify(&words("events"), "Paris");
        let moved = relocate(&call, Some("Tokyo")).unwrap();
        assert_eq!(moved.name, FETCH_EVENTS);

        let data = execute(&moved).unwrap();
        assert_eq!(data["destination"], "Paris");
        assert_eq!(data["events"][0]["name"], "Shibuya Night Walk");
    }

    #[test]
    fn test_relocation_without_city_never_picks_destination() {
        let call = classify(&words("events"), "paris");
        for _ in 0..50 {
            let moved = relocate(&call, None).unwrap();
            let source = moved.arguments[LISTINGS_FROM].as_str().unwrap();
            assert_ne!(source, "paris");
            assert!(CATALOGUE.iter().any(|(city, _)| *city == source));
        }
    }

    #[test]
    fn test_hollow_empties_listings() {
        let events = execute(&classify(&words("events"), "Berlin")).unwrap();
        let hollowed = hollow(&events).unwrap();
        assert_eq!(hollowed["events"], json!([]));
        assert_eq!(hollowed["count"], 0);
        assert_eq!(hollowed["summary"], "No events found in Berlin.");

        let venues = execute(&classify(&words("venues"), "Berlin")).unwrap();
        assert_eq!(hollow(&venues).unwrap()["venues"], json!([]));

        assert!(hollow(&json!({"temperature": 12})).is_none());
    }
}
