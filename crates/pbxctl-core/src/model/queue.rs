// ── Call queue domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use super::record_id::RecordId;
use super::{Record, RecordKind, patch, patch_optional};

/// Member selection strategy, spelled as `queues.conf` expects.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueueStrategy {
    #[default]
    Ringall,
    Leastrecent,
    Fewestcalls,
    Random,
    Rrmemory,
    Linear,
    Wrandom,
}

/// A call queue. `members` keeps insertion order; it is rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: RecordId,
    pub name: String,
    pub strategy: QueueStrategy,
    /// Seconds to ring a member before trying the next.
    pub timeout: u32,
    pub wrapuptime: u32,
    /// Zero means unlimited callers.
    pub maxlen: u32,
    pub announce: Option<String>,
    pub members: Vec<String>,
    pub music_class: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Queue {
    const KIND: RecordKind = RecordKind::Queue;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<QueueStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapuptime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlen: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_class: Option<String>,
}

impl CreateQueueRequest {
    pub fn into_record(self, now: DateTime<Utc>) -> Queue {
        Queue {
            id: RecordId::new(),
            name: self.name,
            strategy: self.strategy.unwrap_or_default(),
            timeout: self.timeout.unwrap_or(15),
            wrapuptime: self.wrapuptime.unwrap_or(0),
            maxlen: self.maxlen.unwrap_or(0),
            announce: self.announce,
            members: self.members,
            music_class: self.music_class.unwrap_or_else(|| "default".into()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQueueRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<QueueStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapuptime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxlen: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announce: Option<String>,
    /// Replaces the whole member list when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_class: Option<String>,
}

impl UpdateQueueRequest {
    pub fn apply(self, queue: &mut Queue, now: DateTime<Utc>) {
        patch(&mut queue.name, self.name);
        patch(&mut queue.strategy, self.strategy);
        patch(&mut queue.timeout, self.timeout);
        patch(&mut queue.wrapuptime, self.wrapuptime);
        patch(&mut queue.maxlen, self.maxlen);
        patch_optional(&mut queue.announce, self.announce);
        patch(&mut queue.members, self.members);
        patch(&mut queue.music_class, self.music_class);
        queue.updated_at = now;
    }
}
