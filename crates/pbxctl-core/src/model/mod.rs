// ── Domain model ──
//
// Stored configuration records (extensions, trunks, queues, routes) plus
// the call and SIP-trace history the switch produces. Every record type
// implements [`Record`] so the store can index it by id and natural key.

pub mod call_record;
pub mod common;
pub mod extension;
pub mod queue;
pub mod record_id;
pub mod route;
pub mod sip_trace;
pub mod trunk;

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{Display, EnumString};

// ── Re-exports ──────────────────────────────────────────────────────

pub use call_record::{CallDetailRecord, CallDisposition};
pub use common::{DEFAULT_CODECS, DtmfMode, NatMode, SipTransport};
pub use extension::{
    CreateExtensionRequest, DEFAULT_EXTENSION_CONTEXT, Extension, UpdateExtensionRequest,
};
pub use queue::{CreateQueueRequest, Queue, QueueStrategy, UpdateQueueRequest};
pub use record_id::RecordId;
pub use route::{
    CreateInboundRouteRequest, CreateOutboundRouteRequest, DestinationType, InboundRoute,
    OutboundRoute, UpdateInboundRouteRequest, UpdateOutboundRouteRequest,
};
pub use sip_trace::{NewSipTrace, SipTraceLog, TraceDirection};
pub use trunk::{CreateTrunkRequest, Trunk, TrunkKind, UpdateTrunkRequest};

// ── RecordKind ──────────────────────────────────────────────────────

/// The stored entity kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    serde::Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecordKind {
    Extension,
    Trunk,
    Queue,
    InboundRoute,
    OutboundRoute,
    #[strum(serialize = "cdr")]
    #[serde(rename = "cdr")]
    CallDetailRecord,
    SipTrace,
}

impl RecordKind {
    /// Kinds whose records are projected into switch config files.
    pub const CONFIGURATION: [RecordKind; 5] = [
        RecordKind::Extension,
        RecordKind::Trunk,
        RecordKind::Queue,
        RecordKind::InboundRoute,
        RecordKind::OutboundRoute,
    ];
}

// ── Record ──────────────────────────────────────────────────────────

/// A persisted record with a stable id and a unique natural key.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    fn id(&self) -> RecordId;

    /// Human-assigned unique key (extension number, trunk name, ...).
    fn natural_key(&self) -> String;
}

// ── Update helpers ──────────────────────────────────────────────────

pub(crate) fn patch<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// `Some("")` clears the field, `None` leaves it alone.
pub(crate) fn patch_optional(slot: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *slot = if v.is_empty() { None } else { Some(v) };
    }
}
