// ── Call detail records ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use super::record_id::RecordId;
use super::{Record, RecordKind};

/// Final state of a call as reported by the switch.
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
#[strum(ascii_case_insensitive)]
pub enum CallDisposition {
    #[serde(rename = "ANSWERED")]
    #[strum(serialize = "ANSWERED")]
    Answered,
    #[serde(rename = "NO ANSWER")]
    #[strum(serialize = "NO ANSWER")]
    NoAnswer,
    #[serde(rename = "BUSY")]
    #[strum(serialize = "BUSY")]
    Busy,
    #[serde(rename = "FAILED")]
    #[strum(serialize = "FAILED")]
    Failed,
    #[default]
    #[serde(rename = "UNKNOWN")]
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

/// One completed call, keyed by the switch-assigned `UniqueID`.
///
/// Created once from a call-teardown event and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDetailRecord {
    pub id: RecordId,
    pub unique_id: String,
    pub src: String,
    pub dst: String,
    pub dcontext: String,
    pub clid: String,
    pub channel: String,
    pub dstchannel: String,
    pub lastapp: String,
    pub lastdata: String,
    pub start: DateTime<Utc>,
    pub answer: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Total seconds from start to end.
    pub duration: u32,
    /// Seconds from answer to end.
    pub billsec: u32,
    pub disposition: CallDisposition,
    pub amaflags: Option<String>,
    pub accountcode: Option<String>,
    pub userfield: Option<String>,
    pub recordingfile: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for CallDetailRecord {
    const KIND: RecordKind = RecordKind::CallDetailRecord;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.unique_id.clone()
    }
}
