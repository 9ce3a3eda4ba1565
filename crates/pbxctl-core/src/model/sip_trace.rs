// ── SIP trace logs ──
//
// Captured SIP messages kept for troubleshooting. Stored only while trace
// logging is enabled in configuration.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::record_id::RecordId;
use super::{Record, RecordKind};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TraceDirection {
    #[default]
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipTraceLog {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub destination_ip: String,
    /// Request method, or the CSeq method for responses.
    pub method: String,
    pub call_id: Option<String>,
    pub from_user: Option<String>,
    pub to_user: Option<String>,
    pub status_code: Option<u16>,
    pub reason_phrase: Option<String>,
    pub headers: IndexMap<String, String>,
    pub body: Option<String>,
    pub direction: TraceDirection,
}

impl Record for SipTraceLog {
    const KIND: RecordKind = RecordKind::SipTrace;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.id.to_string()
    }
}

/// A captured message as submitted for storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSipTrace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub source_ip: String,
    pub destination_ip: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub direction: TraceDirection,
}

impl NewSipTrace {
    pub fn into_record(self, now: DateTime<Utc>) -> SipTraceLog {
        SipTraceLog {
            id: RecordId::new(),
            timestamp: self.timestamp.unwrap_or(now),
            source_ip: self.source_ip,
            destination_ip: self.destination_ip,
            method: self.method,
            call_id: self.call_id,
            from_user: self.from_user,
            to_user: self.to_user,
            status_code: self.status_code,
            reason_phrase: self.reason_phrase,
            headers: self.headers,
            body: self.body,
            direction: self.direction,
        }
    }
}
