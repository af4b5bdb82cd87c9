//! Broadcast events shared by every agent of a session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a broadcast event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    BuildBroken,
    DependencyAdded,
    ApiChanged,
    CriticalBlocker,
    Info,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::BuildBroken => "build_broken",
            EventType::DependencyAdded => "dependency_added",
            EventType::ApiChanged => "api_changed",
            EventType::CriticalBlocker => "critical_blocker",
            EventType::Info => "info",
            EventType::Other(kind) => kind,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "build_broken" => EventType::BuildBroken,
            "dependency_added" => EventType::DependencyAdded,
            "api_changed" => EventType::ApiChanged,
            "critical_blocker" => EventType::CriticalBlocker,
            "info" => EventType::Info,
            _ => EventType::Other(value),
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(kind: EventType) -> Self {
        kind.as_str().to_string()
    }
}

/// One entry of a (workspace, session) event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: String,
    pub agent_id: String,
    pub event_type: EventType,
    pub message: String,
    pub workspace: String,
    pub session_id: String,
}

impl Event {
    pub fn new(
        workspace: &str,
        session_id: &str,
        agent_id: &str,
        event_type: EventType,
        message: &str,
    ) -> Self {
        Self {
            timestamp: crate::format_timestamp(&crate::now()),
            agent_id: agent_id.to_string(),
            event_type,
            message: message.to_string(),
            workspace: workspace.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_string_mapping() {
        assert_eq!(EventType::from("api_changed"), EventType::ApiChanged);
        assert_eq!(
            EventType::from("deploy_started"),
            EventType::Other("deploy_started".to_string())
        );
        assert_eq!(String::from(EventType::CriticalBlocker), "critical_blocker");
    }

    #[test]
    fn test_event_serializes_type_as_string() {
        let event = Event::new("/w", "s1", "α", EventType::BuildBroken, "cargo check fails");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "build_broken");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
