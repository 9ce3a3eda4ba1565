//! Configuration and supervision layer between `pbxctl-ami` and the CLI.
//!
//! This crate owns the domain model and the business logic of pbxctl:
//!
//! - **[`Pbx`]**: central facade. [`open()`](Pbx::open) works offline
//!   against the record store and config directory;
//!   [`connect()`](Pbx::connect) also logs in to the switch so mutations
//!   reload the affected module. Every mutation returns a
//!   [`MutationOutcome`] that separates "record saved" from "switch
//!   updated".
//!
//! - **[`RecordStore`]**: one [`Repository`] per record kind.
//!   [`MemoryStore`] keeps records in `DashMap` collections and can persist
//!   them to a JSON snapshot.
//!
//! - **Config sync**: [`render`] turns records into config sections,
//!   [`merge`] splices them into existing file text without disturbing
//!   hand-written sections, and [`SyncOrchestrator`] ties the two together
//!   with per-file locking and module reloads.
//!
//! - **[`Switch`]**: typed queries and commands over the manager
//!   connection (status, channels, peers, originate, queue runtime
//!   control).
//!
//! - **Event listeners**: [`CdrRecorder`] stores call detail records and
//!   [`CallEventLogger`] traces call progress.

pub mod cdr;
pub mod config;
pub mod error;
pub mod events;
pub mod merge;
pub mod model;
pub mod pbx;
pub mod render;
pub mod store;
pub mod switch;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cdr::{CallStats, CallSummary, CdrPage, CdrQuery, CdrRecorder, NumberCount, StatsGroup};
pub use config::PbxConfig;
pub use error::CoreError;
pub use events::CallEventLogger;
pub use pbx::{Dashboard, MutationOutcome, Pbx, TracePage, TraceQuery};
pub use store::{MemoryStore, RecordStore, Repository};
pub use switch::{
    ChannelInfo, ExtensionState, ExtensionStatus, OriginateAccepted, OriginateRequest, PeerInfo,
    Switch, SwitchStatus,
};
pub use sync::{
    ConfigFile, ConfigFs, DiskFs, FileOutcome, FileStatus, MemoryFs, ModuleReloader, ReloadOutcome,
    ReloadStatus, SyncOrchestrator, SyncReport,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CallDetailRecord, CallDisposition, CreateExtensionRequest, CreateInboundRouteRequest,
    CreateOutboundRouteRequest, CreateQueueRequest, CreateTrunkRequest, DestinationType, DtmfMode,
    Extension, InboundRoute, NatMode, NewSipTrace, OutboundRoute, Queue, QueueStrategy, RecordId,
    RecordKind, SipTraceLog, SipTransport, TraceDirection, Trunk, TrunkKind,
    UpdateExtensionRequest, UpdateInboundRouteRequest, UpdateOutboundRouteRequest,
    UpdateQueueRequest, UpdateTrunkRequest,
};
