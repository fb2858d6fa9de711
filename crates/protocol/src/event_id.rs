use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a timeline event.
///
/// Shared so that lane maps, the spatial hash and the label set can all key
/// on it every frame without copying the text. Compares, hashes and orders
/// by content; lane assignment uses the byte order as its last tie-breaker,
/// so `"era10"` comes before `"era9"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EventId(Arc<str>);

impl EventId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for EventId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EventId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EventId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for EventId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.as_str().to_owned()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn lane_map_lookup_by_str() {
        let mut lanes: HashMap<EventId, usize> = HashMap::new();
        lanes.insert(EventId::from("cambrian"), 2);
        lanes.insert(EventId::from(String::from("ordovician")), 0);
        assert_eq!(lanes.get("cambrian"), Some(&2));
        assert_eq!(lanes.get("ordovician"), Some(&0));
        assert_eq!(lanes.get("silurian"), None);
    }

    #[test]
    fn tie_break_order_is_bytewise() {
        let mut ids: Vec<EventId> = ["era9", "Era1", "era10", "era"]
            .into_iter()
            .map(EventId::from)
            .collect();
        ids.sort();
        let names: Vec<&str> = ids.iter().map(EventId::as_str).collect();
        assert_eq!(names, vec!["Era1", "era", "era10", "era9"]);
    }

    #[test]
    fn clones_share_text_and_compare_equal() {
        let id = EventId::from("k-pg boundary");
        let copy = id.clone();
        assert!(Arc::ptr_eq(&id.0, &copy.0));
        assert_eq!(id, copy);
        assert_eq!(id, EventId::from("k-pg boundary"));
        assert_eq!(copy.to_string(), "k-pg boundary");
    }

    #[test]
    fn json_form_is_a_plain_string() {
        let id = EventId::from("big \"bang\"");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#""big \"bang\"""#);
        let back: EventId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, "big \"bang\"");
        assert!(serde_json::from_str::<EventId>("42").is_err());
    }
}
