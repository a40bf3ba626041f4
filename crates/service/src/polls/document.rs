//! On-disk vote document: the canonical `{"votes": {...}}` wrapper and the
//! older bare `{poll_id: {option: n}}` mapping.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

/// `option_id -> count`
pub type OptionTally = BTreeMap<String, u64>;
/// `poll_id -> tally`
pub type Votes = BTreeMap<String, OptionTally>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteDocument {
    Canonical(Votes),
    Legacy(Votes),
    /// Valid JSON that is neither shape (array, scalar).
    Unrecognised,
}

impl VoteDocument {
    /// Canonical wins when `votes` holds an object; any other object is legacy.
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Object(map) => match map.get("votes") {
                Some(Value::Object(inner)) => VoteDocument::Canonical(normalize(inner)),
                _ => VoteDocument::Legacy(normalize(map)),
            },
            _ => VoteDocument::Unrecognised,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            VoteDocument::Canonical(_) => "canonical",
            VoteDocument::Legacy(_) => "legacy",
            VoteDocument::Unrecognised => "unrecognised",
        }
    }

    pub fn into_votes(self) -> Votes {
        match self {
            VoteDocument::Canonical(v) | VoteDocument::Legacy(v) => v,
            VoteDocument::Unrecognised => Votes::new(),
        }
    }
}

/// Always the wrapped form.
pub fn encode(votes: &Votes) -> Value {
    serde_json::json!({ "votes": votes })
}

fn normalize(map: &Map<String, Value>) -> Votes {
    let mut votes = Votes::new();
    for (poll_id, options) in map {
        let Value::Object(options) = options else {
            warn!(%poll_id, "dropping poll entry that is not an object");
            continue;
        };
        let mut tally = OptionTally::new();
        for (option_id, count) in options {
            match count.as_u64() {
                Some(n) => {
                    tally.insert(option_id.clone(), n);
                }
                None => warn!(%poll_id, %option_id, %count, "dropping non-integer tally"),
            }
        }
        votes.insert(poll_id.clone(), tally);
    }
    votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_both_shapes_to_the_same_votes() {
        let canonical = VoteDocument::decode(&json!({"votes": {"alaska-tour": {"yes": 3}}}));
        let legacy = VoteDocument::decode(&json!({"alaska-tour": {"yes": 3}}));
        assert_eq!(canonical.shape(), "canonical");
        assert_eq!(legacy.shape(), "legacy");
        assert_eq!(canonical.into_votes(), legacy.into_votes());
    }

    #[test]
    fn votes_field_that_is_not_an_object_means_legacy() {
        let doc = VoteDocument::decode(&json!({"votes": 5, "p1": {"a": 1}}));
        assert_eq!(doc.shape(), "legacy");
        let votes = doc.into_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes["p1"]["a"], 1);
    }

    #[test]
    fn non_objects_are_unrecognised() {
        assert_eq!(VoteDocument::decode(&json!([1, 2])), VoteDocument::Unrecognised);
        assert_eq!(VoteDocument::decode(&json!("votes")), VoteDocument::Unrecognised);
        assert!(VoteDocument::decode(&json!(null)).into_votes().is_empty());
    }

    #[test]
    fn invalid_tallies_are_dropped() {
        let votes = VoteDocument::decode(&json!({"votes": {
            "p1": {"a": 2, "b": -1, "c": "three", "d": 1.5},
            "p2": [1, 2],
        }}))
        .into_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes["p1"].len(), 1);
        assert_eq!(votes["p1"]["a"], 2);
    }

    #[test]
    fn encode_wraps_votes() {
        let mut votes = Votes::new();
        votes.entry("p1".into()).or_default().insert("a".into(), 1);
        assert_eq!(encode(&votes), json!({"votes": {"p1": {"a": 1}}}));
        assert_eq!(encode(&Votes::new()), json!({"votes": {}}));
    }
}
