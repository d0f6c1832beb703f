//! Weather tools with deterministic simulated data.

use agent_faults::ToolCall;
use serde_json::{json, Value};

pub const GET_CURRENT_WEATHER: &str = "get_current_weather";
pub const GET_FORECAST: &str = "get_forecast";
pub const GET_HISTORICAL_WEATHER: &str = "get_historical_weather";

pub const TOOLS: [&str; 3] = [GET_CURRENT_WEATHER, GET_FORECAST, GET_HISTORICAL_WEATHER];

const FORECAST_WORDS: [&str; 5] = ["forecast", "next", "tomorrow", "week", "upcoming"];
const HISTORY_WORDS: [&str; 6] = ["yesterday", "last", "historical", "was", "were", "past"];

const DEFAULT_FORECAST_DAYS: u64 = 3;
const DEFAULT_HISTORY_DATE: &str = "2026-01-25";

pub fn classify(words: &[String], location: &str) -> ToolCall {
    let has = |set: &[&str]| words.iter().any(|w| set.contains(&w.as_str()));

    if has(&FORECAST_WORDS) {
        call(GET_FORECAST, location)
    } else if has(&HISTORY_WORDS) {
        call(GET_HISTORICAL_WEATHER, location)
    } else {
        call(GET_CURRENT_WEATHER, location)
    }
}

/// current -> forecast -> historical -> current
pub fn alternate(current: &ToolCall) -> ToolCall {
    let location = current.arguments["location"].as_str().unwrap_or("Unknown");
    let next = match current.name.as_str() {
        GET_CURRENT_WEATHER => GET_FORECAST,
        GET_FORECAST => GET_HISTORICAL_WEATHER,
        _ => GET_CURRENT_WEATHER,
    };
    call(next, location)
}

fn call(name: &str, location: &str) -> ToolCall {
    let arguments = match name {
        GET_FORECAST => json!({ "location": location, "days": DEFAULT_FORECAST_DAYS }),
        GET_HISTORICAL_WEATHER => json!({ "location": location, "date": DEFAULT_HISTORY_DATE }),
        _ => json!({ "location": location }),
    };
    ToolCall::new(name, arguments)
}

pub fn execute(call: &ToolCall) -> Option<Value> {
    let location = call.arguments["location"].as_str().unwrap_or("Unknown");
    match call.name.as_str() {
        GET_CURRENT_WEATHER => Some(current(location)),
        GET_FORECAST => {
            let days = call.arguments["days"]
                .as_u64()
                .unwrap_or(DEFAULT_FORECAST_DAYS)
                .clamp(1, 7);
            Some(forecast(location, days))
        }
        GET_HISTORICAL_WEATHER => {
            let date = call.arguments["date"].as_str().unwrap_or(DEFAULT_HISTORY_DATE);
            Some(historical(location, date))
        }
        _ => None,
    }
}

fn current(location: &str) -> Value {
    json!({
        "summary": format!("Currently 57°F and rainy in {} with 85% humidity.", location),
        "location": location,
        "temperature": "57°F",
        "condition": "rainy",
        "humidity": "85%",
        "wind_speed": "12 mph",
    })
}

fn forecast(location: &str, days: u64) -> Value {
    const CONDITIONS: [&str; 4] = ["sunny", "cloudy", "rainy", "partly cloudy"];
    let days: Vec<Value> = (0..days)
        .map(|i| {
            json!({
                "day": i + 1,
                "high": format!("{}°F", 65 + i * 3),
                "low": format!("{}°F", 45 + i * 2),
                "condition": CONDITIONS[i as usize % CONDITIONS.len()],
            })
        })
        .collect();
    json!({
        "summary": format!("Expect sunny skies in {} tomorrow, turning cloudy later.", location),
        "location": location,
        "forecast": days,
    })
}

fn historical(location: &str, date: &str) -> Value {
    json!({
        "summary": format!("On {} {} was partly cloudy with a high of 62°F.", date, location),
        "location": location,
        "date": date,
        "high": "62°F",
        "low": "48°F",
        "condition": "partly cloudy",
        "precipitation": "0.1 in",
    })
}

/// Confident answer produced without looking anything up.
pub fn fabricate(location: &str) -> Value {
    json!({
        "summary": "The weather is 22°C and sunny with light winds.",
        "location": location,
        "temperature": "22°C",
        "condition": "sunny",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        crate::profiles::words(s)
    }

    #[test]
    fn test_classify_by_keyword() {
        assert_eq!(classify(&words("Forecast for Paris"), "Paris").name, GET_FORECAST);
        assert_eq!(
            classify(&words("What was it like yesterday in Rome?"), "Rome").name,
            GET_HISTORICAL_WEATHER
        );
        assert_eq!(
            classify(&words("Current weather in Berlin?"), "Berlin").name,
            GET_CURRENT_WEATHER
        );
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "Washington" contains "was" but is not a history keyword
        assert_eq!(
            classify(&words("Weather in Washington"), "Washington").name,
            GET_CURRENT_WEATHER
        );
    }

    #[test]
    fn test_alternate_rotation() {
        let current = call(GET_CURRENT_WEATHER, "Oslo");
        let second = alternate(&current);
        let third = alternate(&second);
        let back = alternate(&third);

        assert_eq!(second.name, GET_FORECAST);
        assert_eq!(third.name, GET_HISTORICAL_WEATHER);
        assert_eq!(back.name, GET_CURRENT_WEATHER);
        assert_eq!(third.arguments["date"], DEFAULT_HISTORY_DATE);
    }

    #[test]
    fn test_forecast_days() {
        let data = execute(&call(GET_FORECAST, "Lima")).unwrap();
        assert_eq!(data["forecast"].as_array().unwrap().len(), 3);
        assert_eq!(data["forecast"][1]["high"], "68°F");
        assert_eq!(data["forecast"][2]["condition"], "rainy");
    }

    #[test]
    fn test_unknown_tool() {
        assert!(execute(&ToolCall::new("get_tides", json!({}))).is_none());
    }
}
