//! Request-scoped error collection.

use std::sync::Mutex;

use crate::contracts::AgentError;

/// Append-only error list shared by the concurrent calls of one plan.
///
/// Entries carry the agent's configured position so the final list is
/// ordered by configuration, not by completion.
#[derive(Default)]
pub struct ErrorCollector {
    entries: Mutex<Vec<(usize, AgentError)>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, position: usize, error: AgentError) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push((position, error)),
            Err(poisoned) => poisoned.into_inner().push((position, error)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Errors in configured agent order.
    pub fn into_ordered(self) -> Vec<AgentError> {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.sort_by_key(|(position, _)| *position);
        entries.into_iter().map(|(_, error)| error).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ErrorKind;

    fn error(agent: &str) -> AgentError {
        AgentError {
            agent_name: agent.to_string(),
            kind: ErrorKind::Timeout,
            detail: "timeout".to_string(),
        }
    }

    #[test]
    fn test_orders_by_position() {
        let collector = ErrorCollector::new();
        collector.record(2, error("c"));
        collector.record(0, error("a"));
        collector.record(1, error("b"));

        assert_eq!(collector.len(), 3);
        let names: Vec<String> = collector
            .into_ordered()
            .into_iter()
            .map(|e| e.agent_name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let collector = ErrorCollector::new();
        let writes = (0..32).map(|i| {
            let collector = &collector;
            async move {
                tokio::task::yield_now().await;
                collector.record(i, error(&format!("agent-{}", i)));
            }
        });
        futures::future::join_all(writes).await;

        let ordered = collector.into_ordered();
        assert_eq!(ordered.len(), 32);
        assert_eq!(ordered[0].agent_name, "agent-0");
        assert_eq!(ordered[31].agent_name, "agent-31");
    }
}
