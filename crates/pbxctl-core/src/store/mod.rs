// ── Record store ──
//
// The store is an external collaborator reached through the object-safe
// [`Repository`] trait, one repository per record kind. `MemoryStore` is
// the bundled implementation: concurrent in-process collections with an
// optional JSON snapshot file.

mod collection;
pub mod memory;

use futures_util::future::BoxFuture;

use crate::error::CoreError;
use crate::model::{
    CallDetailRecord, Extension, InboundRoute, OutboundRoute, Queue, Record, RecordId, SipTraceLog,
    Trunk,
};

pub use memory::MemoryStore;

/// A filter evaluated against each stored record.
pub type Predicate<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

/// CRUD and query access to one record kind.
///
/// `create` and `update` refuse a natural key owned by another record with
/// [`CoreError::Conflict`]; `update` of an unknown id is
/// [`CoreError::NotFound`].
pub trait Repository<R: Record>: Send + Sync {
    /// All records, ordered by natural key.
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<R>, CoreError>>;

    /// Records matching `predicate`, ordered by natural key.
    fn find_where<'a>(
        &'a self,
        predicate: Predicate<'a, R>,
    ) -> BoxFuture<'a, Result<Vec<R>, CoreError>>;

    fn find_one(&self, id: RecordId) -> BoxFuture<'_, Result<Option<R>, CoreError>>;

    fn find_by_key<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<R>, CoreError>>;

    fn create(&self, record: R) -> BoxFuture<'_, Result<R, CoreError>>;

    fn update(&self, record: R) -> BoxFuture<'_, Result<R, CoreError>>;

    /// Returns the removed record, or `None` if the id was unknown.
    fn delete(&self, id: RecordId) -> BoxFuture<'_, Result<Option<R>, CoreError>>;

    fn count(&self) -> BoxFuture<'_, Result<usize, CoreError>>;
}

/// The full set of repositories the services need.
pub trait RecordStore: Send + Sync + 'static {
    fn extensions(&self) -> &dyn Repository<Extension>;
    fn trunks(&self) -> &dyn Repository<Trunk>;
    fn queues(&self) -> &dyn Repository<Queue>;
    fn inbound_routes(&self) -> &dyn Repository<InboundRoute>;
    fn outbound_routes(&self) -> &dyn Repository<OutboundRoute>;
    fn call_records(&self) -> &dyn Repository<CallDetailRecord>;
    fn sip_traces(&self) -> &dyn Repository<SipTraceLog>;
}

/// Maps a record type to its repository, for code generic over kinds.
pub trait Stored: Record {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self>;
}

impl Stored for Extension {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.extensions()
    }
}

impl Stored for Trunk {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.trunks()
    }
}

impl Stored for Queue {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.queues()
    }
}

impl Stored for InboundRoute {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.inbound_routes()
    }
}

impl Stored for OutboundRoute {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.outbound_routes()
    }
}

impl Stored for CallDetailRecord {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.call_records()
    }
}

impl Stored for SipTraceLog {
    fn repository(store: &dyn RecordStore) -> &dyn Repository<Self> {
        store.sip_traces()
    }
}
