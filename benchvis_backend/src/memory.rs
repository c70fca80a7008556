use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::personality::{MoodHistory, PersonalityState};

pub const CONVERSATION_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub command: String,
    pub timestamp: DateTime<Utc>,
}

/// Interaction counters carried across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub interactions: u64,
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub conversations: VecDeque<ConversationEntry>,
}

impl MemorySnapshot {
    pub fn record_interaction(&mut self, command: &str, at: DateTime<Utc>) {
        self.interactions += 1;
        self.last_interaction = Some(at);
        if self.conversations.len() == CONVERSATION_LOG_CAPACITY {
            self.conversations.pop_front();
        }
        self.conversations.push_back(ConversationEntry {
            command: command.to_string(),
            timestamp: at,
        });
    }

    /// Whole days since the last recorded interaction.
    pub fn days_since_last(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_interaction
            .map(|last| now.signed_duration_since(last).num_days())
    }
}

/// Everything persisted between sessions, as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub memory: MemorySnapshot,
    #[serde(default)]
    pub personality: PersonalityState,
    #[serde(default)]
    pub mood_history: MoodHistory,
    #[serde(default)]
    pub active_profile: Option<String>,
}

impl Default for SnapshotFile {
    fn default() -> Self {
        let personality = PersonalityState::default();
        let mut mood_history = MoodHistory::new();
        mood_history.push(personality.mood());
        Self {
            memory: MemorySnapshot::default(),
            personality,
            mood_history,
            active_profile: None,
        }
    }
}

/// Single-writer snapshot file. Read once at startup, rewritten at shutdown.
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt snapshots yield fresh defaults.
    pub fn load(&self) -> SnapshotFile {
        match self.try_load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    "Loaded memory snapshot from {:?} ({} interactions)",
                    self.path,
                    snapshot.memory.interactions
                );
                snapshot
            }
            Ok(None) => {
                tracing::info!("No memory snapshot at {:?}; starting fresh", self.path);
                SnapshotFile::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable memory snapshot: {:#}", e);
                SnapshotFile::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<SnapshotFile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let mut snapshot: SnapshotFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        snapshot.personality = snapshot.personality.normalized();
        Ok(Some(snapshot))
    }

    /// Writes to a sibling temp file first so a crash never leaves half a snapshot.
    pub fn save(&self, snapshot: &SnapshotFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }

        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize memory snapshot")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        tracing::info!("Saved memory snapshot to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::Trait;
    use chrono::Duration;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryStore::new(dir.path().join("memoria.json"));
        let snapshot = store.load();
        assert_eq!(snapshot.memory.interactions, 0);
        assert!(snapshot.memory.last_interaction.is_none());
        assert_eq!(snapshot.mood_history.len(), 1);
        assert!(snapshot.active_profile.is_none());
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memoria.json");
        fs::write(&path, "{not json").unwrap();
        let snapshot = MemoryStore::new(&path).load();
        assert_eq!(snapshot, SnapshotFile::default());
    }

    #[test]
    fn save_then_load_restores_profile_and_counters() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryStore::new(dir.path().join("nested").join("memoria.json"));

        let mut snapshot = SnapshotFile::default();
        snapshot.memory.record_interaction("listar projetos", Utc::now());
        snapshot.memory.preferences.insert("linguagem".into(), "python".into());
        snapshot.personality.set(Trait::Sarcasm, 12.0);
        snapshot.mood_history.push(33.0);
        snapshot.active_profile = Some("zoeiro".to_string());

        store.save(&snapshot).expect("save snapshot");
        let loaded = store.load();

        assert_eq!(loaded.memory.interactions, 1);
        assert_eq!(loaded.memory.conversations[0].command, "listar projetos");
        assert_eq!(loaded.personality.get(Trait::Sarcasm), 12.0);
        assert_eq!(loaded.mood_history.latest(), Some(33.0));
        assert_eq!(loaded.active_profile.as_deref(), Some("zoeiro"));
        assert_eq!(loaded.memory.preferences["linguagem"], "python");
    }

    #[test]
    fn out_of_range_traits_are_clamped_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memoria.json");
        let mut value = serde_json::to_value(SnapshotFile::default()).unwrap();
        value["personality"]["energy"] = serde_json::json!(450.0);
        fs::write(&path, value.to_string()).unwrap();

        let loaded = MemoryStore::new(&path).load();
        assert_eq!(loaded.personality.energy(), 100.0);
    }

    #[test]
    fn conversation_log_is_bounded() {
        let mut memory = MemorySnapshot::default();
        let start = Utc::now();
        for i in 0..(CONVERSATION_LOG_CAPACITY + 3) {
            memory.record_interaction(&format!("cmd {}", i), start);
        }
        assert_eq!(memory.interactions, (CONVERSATION_LOG_CAPACITY + 3) as u64);
        assert_eq!(memory.conversations.len(), CONVERSATION_LOG_CAPACITY);
        assert_eq!(memory.conversations[0].command, "cmd 3");
        assert_eq!(memory.days_since_last(start + Duration::days(9)), Some(9));
    }
}
