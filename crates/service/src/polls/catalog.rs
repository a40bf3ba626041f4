//! Known poll ids, read from the site's poll registry export.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ServiceError;

const ID_FIELDS: [&str; 3] = ["id", "poll_id", "slug"];

/// Read a catalog file. Unlike the vote document, a missing or broken
/// catalog is an error: backfilling from nothing would hide the problem.
pub async fn load_catalog<P: AsRef<Path>>(path: P) -> Result<BTreeSet<String>, ServiceError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ServiceError::Catalog(format!("read {}: {e}", path.display())))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ServiceError::Catalog(format!("parse {}: {e}", path.display())))?;
    let ids = parse_catalog(&value)?;
    debug!(path = %path.display(), polls = ids.len(), "catalog loaded");
    Ok(ids)
}

/// Accepts `["id", ...]`, `[{"id": ..}, ...]` or `{"polls": [...]}`.
pub fn parse_catalog(value: &Value) -> Result<BTreeSet<String>, ServiceError> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("polls") {
            Some(Value::Array(items)) => items,
            _ => return Err(ServiceError::Catalog("object catalog needs a `polls` array".into())),
        },
        _ => return Err(ServiceError::Catalog("catalog must be an array or an object".into())),
    };

    let mut ids = BTreeSet::new();
    for (idx, entry) in entries.iter().enumerate() {
        match entry_id(entry) {
            Some(id) => {
                ids.insert(id);
            }
            None => warn!(idx, "catalog entry has no usable id; skipped"),
        }
    }
    Ok(ids)
}

fn entry_id(entry: &Value) -> Option<String> {
    let raw = match entry {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ID_FIELDS.iter().find_map(|field| match map.get(*field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }),
        _ => None,
    }?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_catalog_shape() {
        let want: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_catalog(&json!(["a", "b", "a"])).unwrap(), want);
        assert_eq!(parse_catalog(&json!([{"id": "a"}, {"poll_id": "b"}])).unwrap(), want);
        assert_eq!(parse_catalog(&json!({"polls": [{"slug": "a"}, "b"]})).unwrap(), want);
    }

    #[test]
    fn first_present_field_wins_and_blanks_are_skipped() {
        let ids = parse_catalog(&json!([
            {"id": "", "poll_id": "from-poll-id", "slug": "from-slug"},
            {"id": 42},
            "   ",
            null,
            {"question": "no id here"}
        ]))
        .unwrap();
        let want: BTreeSet<String> = ["42", "from-poll-id"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, want);
    }

    #[test]
    fn rejects_non_catalogs() {
        assert!(matches!(parse_catalog(&json!("a")), Err(ServiceError::Catalog(_))));
        assert!(matches!(parse_catalog(&json!({"items": []})), Err(ServiceError::Catalog(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("catalog_{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(load_catalog(&path).await, Err(ServiceError::Catalog(_))));
    }
}
