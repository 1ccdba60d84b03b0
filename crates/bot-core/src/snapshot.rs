//! Buffer persistence — save/load templates as JSON.
//!
//! Only templates and the episode counter are stored. Episode traces are
//! consumed at consolidation and never persisted.

use crate::buffer::MetaBuffer;
use crate::config::BufferConfig;
use crate::error::{BufferError, BufferResult};
use crate::template::ThoughtTemplate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable state of a template buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub version: u32,
    pub snapshot_id: String,
    /// Episode index the next episode will receive.
    pub next_episode: u64,
    pub templates: Vec<ThoughtTemplate>,
}

impl BufferSnapshot {
    /// Capture a buffer, templates ordered by creation.
    pub fn capture(buffer: &MetaBuffer, next_episode: u64) -> Self {
        let mut templates: Vec<ThoughtTemplate> = buffer.iter().cloned().collect();
        templates.sort_by(|a, b| {
            a.created_at_episode()
                .cmp(&b.created_at_episode())
                .then_with(|| a.name().cmp(b.name()))
        });
        Self {
            version: SNAPSHOT_VERSION,
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            next_episode,
            templates,
        }
    }

    /// Rebuild a buffer under `config`.
    ///
    /// Templates are re-added in creation order, so a smaller capacity than
    /// the snapshot was taken with evicts the same way live insertion would.
    pub fn restore(&self, config: BufferConfig) -> BufferResult<MetaBuffer> {
        let mut buffer = MetaBuffer::new(config)?;
        let mut templates = self.templates.clone();
        templates.sort_by_key(|t| t.created_at_episode());
        for template in templates {
            buffer.add(template)?;
        }
        Ok(buffer)
    }

    pub fn save(&self, path: &Path) -> BufferResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> BufferResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: BufferSnapshot = serde_json::from_str(&json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BufferError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn template(name: &str, episode: u64, usage: u64) -> ThoughtTemplate {
        let sig = FeatureSummary::new(
            GridPos::new(0, 0),
            Direction::East,
            GoalLocation::Known(GridPos::new(episode as i32, 2)),
        );
        ThoughtTemplate::new(name, "d", "p {facing}", sig, episode).with_usage_count(usage)
    }

    #[test]
    fn test_save_and_load() {
        let mut buffer = MetaBuffer::new(BufferConfig::default()).unwrap();
        buffer.add(template("b", 2, 1)).unwrap();
        buffer.add(template("a", 1, 4)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("buffer.json");
        BufferSnapshot::capture(&buffer, 3).save(&path).unwrap();

        let loaded = BufferSnapshot::load(&path).unwrap();
        assert_eq!(loaded.next_episode, 3);
        assert_eq!(loaded.templates[0].name(), "a");

        let restored = loaded.restore(BufferConfig::default()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get("a").unwrap().usage_count(), 4);
    }

    #[test]
    fn test_restore_into_smaller_capacity() {
        let mut buffer = MetaBuffer::new(BufferConfig::default()).unwrap();
        buffer.add(template("rare", 1, 1)).unwrap();
        buffer.add(template("common", 2, 5)).unwrap();
        buffer.add(template("fresh", 3, 1)).unwrap();

        let snapshot = BufferSnapshot::capture(&buffer, 4);
        let restored = snapshot.restore(BufferConfig::default().with_capacity(2)).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(!restored.contains("rare"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let snapshot = BufferSnapshot {
            version: SNAPSHOT_VERSION,
            snapshot_id: "x".into(),
            next_episode: 0,
            templates: vec![template("a", 1, 1), template("a", 2, 1)],
        };
        assert!(matches!(
            snapshot.restore(BufferConfig::default()),
            Err(BufferError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.json");
        let mut snapshot = BufferSnapshot::capture(&MetaBuffer::new(BufferConfig::default()).unwrap(), 0);
        snapshot.version = 99;
        snapshot.save(&path).unwrap();
        assert!(matches!(
            BufferSnapshot::load(&path),
            Err(BufferError::VersionMismatch { found: 99, .. })
        ));
    }
}
