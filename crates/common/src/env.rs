//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the data directory exists and warn when the vote file is not there yet.
pub async fn ensure_env(data_dir: &str, votes_file: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {data_dir}: {e}"))?;
    if tokio::fs::metadata(votes_file).await.is_err() {
        warn!(%votes_file, "vote file not found; it will be created on the first vote");
    } else {
        info!(%votes_file, "vote file present");
    }
    Ok(())
}

/// Join a file name onto the data directory unless it is already absolute.
pub fn resolve_in(data_dir: &str, file: &str) -> String {
    let p = Path::new(file);
    if p.is_absolute() || p.starts_with(data_dir) {
        file.to_string()
    } else {
        Path::new(data_dir).join(p).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_in_joins_relative_names() {
        assert_eq!(resolve_in("data", "polls.json"), Path::new("data").join("polls.json").to_string_lossy());
        assert_eq!(resolve_in("data", "data/polls.json"), "data/polls.json");
        assert_eq!(resolve_in("data", "/var/lib/polls.json"), "/var/lib/polls.json");
    }

    #[tokio::test]
    async fn ensure_env_creates_data_dir() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("ensure_env_{}", std::process::id()));
        let dir_s = dir.to_string_lossy().into_owned();
        let votes = resolve_in(&dir_s, "polls.json");
        ensure_env(&dir_s, &votes).await?;
        assert!(tokio::fs::metadata(&dir).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
