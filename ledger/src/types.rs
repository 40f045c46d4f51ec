use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type UserId = String;
pub type ActivityId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Dinner,
    Event,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Dinner => "dinner",
            ActivityKind::Event => "event",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The linkage between two distinct users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: String,
    pub pair_key: String,
    /// Sorted, never equal.
    pub members: [UserId; 2],
    pub dinner_refs: BTreeSet<ActivityId>,
    pub event_refs: BTreeSet<ActivityId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl docstore::Document for ConnectionRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl ConnectionRecord {
    pub fn refs(&self, kind: ActivityKind) -> &BTreeSet<ActivityId> {
        match kind {
            ActivityKind::Dinner => &self.dinner_refs,
            ActivityKind::Event => &self.event_refs,
        }
    }

    pub fn refs_mut(&mut self, kind: ActivityKind) -> &mut BTreeSet<ActivityId> {
        match kind {
            ActivityKind::Dinner => &mut self.dinner_refs,
            ActivityKind::Event => &mut self.event_refs,
        }
    }

    /// True once no activity links the pair anymore.
    pub fn is_empty(&self) -> bool {
        self.dinner_refs.is_empty() && self.event_refs.is_empty()
    }

    pub fn contains(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    /// The member which is not `user`, if `user` is a member.
    pub fn other_member(&self, user: &str) -> Option<&str> {
        match &self.members {
            [a, b] if a == user => Some(b.as_str()),
            [a, b] if b == user => Some(a.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub title: String,
    pub starts_at: Option<u64>,
}

/// A connection with its activity references resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetailedConnection {
    pub id: String,
    pub pair_key: String,
    pub members: [UserId; 2],
    pub dinners: Vec<ActivitySummary>,
    pub events: Vec<ActivitySummary>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_member() {
        let record = ConnectionRecord {
            id: "c1".into(),
            pair_key: "1:a_1:b".into(),
            members: ["a".into(), "b".into()],
            dinner_refs: BTreeSet::new(),
            event_refs: BTreeSet::from(["e1".to_string()]),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(record.other_member("a"), Some("b"));
        assert_eq!(record.other_member("b"), Some("a"));
        assert_eq!(record.other_member("c"), None);
        assert!(!record.is_empty());
        assert!(record.refs(ActivityKind::Dinner).is_empty());
    }

    #[test]
    fn test_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ActivityKind::Dinner).unwrap(),
            "\"dinner\""
        );
        let kind: ActivityKind = serde_json::from_str("\"event\"").unwrap();
        assert_eq!(kind, ActivityKind::Event);
    }
}
