// ── In-process record store ──
//
// Concurrent collections per record kind. When opened with a path, every
// mutation rewrites a JSON snapshot of all tables (temp file + rename), so
// the CLI can run as a series of short-lived processes over one data file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::collection::{RecordCollection, WriteConflict};
use super::{Predicate, RecordStore, Repository};
use crate::error::CoreError;
use crate::model::{
    CallDetailRecord, Extension, InboundRoute, OutboundRoute, Queue, Record, RecordId, SipTraceLog,
    Trunk,
};
use crate::sync::write_atomic;

// ── Tables ───────────────────────────────────────────────────────────

struct Tables {
    extensions: RecordCollection<Extension>,
    trunks: RecordCollection<Trunk>,
    queues: RecordCollection<Queue>,
    inbound_routes: RecordCollection<InboundRoute>,
    outbound_routes: RecordCollection<OutboundRoute>,
    call_records: RecordCollection<CallDetailRecord>,
    sip_traces: RecordCollection<SipTraceLog>,
}

/// On-disk layout of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    extensions: Vec<Extension>,
    #[serde(default)]
    trunks: Vec<Trunk>,
    #[serde(default)]
    queues: Vec<Queue>,
    #[serde(default)]
    inbound_routes: Vec<InboundRoute>,
    #[serde(default)]
    outbound_routes: Vec<OutboundRoute>,
    #[serde(default)]
    call_records: Vec<CallDetailRecord>,
    #[serde(default)]
    sip_traces: Vec<SipTraceLog>,
}

fn owned<R: Record>(col: &RecordCollection<R>) -> Vec<R> {
    col.values().iter().map(|r| R::clone(r)).collect()
}

impl Tables {
    fn new() -> Self {
        Self {
            extensions: RecordCollection::new(),
            trunks: RecordCollection::new(),
            queues: RecordCollection::new(),
            inbound_routes: RecordCollection::new(),
            outbound_routes: RecordCollection::new(),
            call_records: RecordCollection::new(),
            sip_traces: RecordCollection::new(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            extensions: owned(&self.extensions),
            trunks: owned(&self.trunks),
            queues: owned(&self.queues),
            inbound_routes: owned(&self.inbound_routes),
            outbound_routes: owned(&self.outbound_routes),
            call_records: owned(&self.call_records),
            sip_traces: owned(&self.sip_traces),
        }
    }

    fn restore(&self, snapshot: Snapshot) -> Result<(), WriteConflict> {
        self.extensions.load(snapshot.extensions)?;
        self.trunks.load(snapshot.trunks)?;
        self.queues.load(snapshot.queues)?;
        self.inbound_routes.load(snapshot.inbound_routes)?;
        self.outbound_routes.load(snapshot.outbound_routes)?;
        self.call_records.load(snapshot.call_records)?;
        self.sip_traces.load(snapshot.sip_traces)?;
        Ok(())
    }

    fn revision(&self) -> u64 {
        self.extensions.version()
            + self.trunks.version()
            + self.queues.version()
            + self.inbound_routes.version()
            + self.outbound_routes.version()
            + self.call_records.version()
            + self.sip_traces.version()
    }
}

// ── Snapshot persistence ─────────────────────────────────────────────

struct SnapshotFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotFile {
    async fn save(&self, tables: &Tables) -> Result<(), CoreError> {
        let _guard = self.lock.lock().await;
        let json = serde_json::to_vec_pretty(&tables.snapshot())?;
        write_atomic(&self.path, &json).await?;
        debug!(path = %self.path.display(), bytes = json.len(), "record snapshot saved");
        Ok(())
    }
}

// ── MemoryTable ──────────────────────────────────────────────────────

/// Repository over one collection of a [`MemoryStore`].
pub struct MemoryTable<R: Record> {
    tables: Arc<Tables>,
    select: fn(&Tables) -> &RecordCollection<R>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl<R: Record> MemoryTable<R> {
    fn rows(&self) -> &RecordCollection<R> {
        (self.select)(&self.tables)
    }

    async fn persist(&self) -> Result<(), CoreError> {
        match &self.snapshot {
            Some(file) => file.save(&self.tables).await,
            None => Ok(()),
        }
    }

    /// Undo of an in-memory write whose snapshot failed to save.
    fn roll_back(&self, undone: Result<Arc<R>, WriteConflict>) {
        if let Err(e) = undone {
            warn!(kind = %R::KIND, error = ?e, "could not roll back unsaved write");
        }
    }

    fn conflict(err: WriteConflict, id: RecordId) -> CoreError {
        match err {
            WriteConflict::KeyTaken { key, .. } => {
                CoreError::conflict(format!("{} '{key}' already exists", R::KIND))
            }
            WriteConflict::Missing => CoreError::not_found(R::KIND, id.to_string()),
        }
    }
}

impl<R: Record> Repository<R> for MemoryTable<R> {
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<R>, CoreError>> {
        Box::pin(async move { Ok(owned(self.rows())) })
    }

    fn find_where<'a>(
        &'a self,
        predicate: Predicate<'a, R>,
    ) -> BoxFuture<'a, Result<Vec<R>, CoreError>> {
        Box::pin(async move {
            Ok(self
                .rows()
                .values()
                .iter()
                .filter(|r| predicate(r))
                .map(|r| R::clone(r))
                .collect())
        })
    }

    fn find_one(&self, id: RecordId) -> BoxFuture<'_, Result<Option<R>, CoreError>> {
        Box::pin(async move { Ok(self.rows().get(&id).map(|r| R::clone(&r))) })
    }

    fn find_by_key<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<R>, CoreError>> {
        Box::pin(async move { Ok(self.rows().get_by_key(key).map(|r| R::clone(&r))) })
    }

    fn create(&self, record: R) -> BoxFuture<'_, Result<R, CoreError>> {
        Box::pin(async move {
            let id = record.id();
            let stored = self
                .rows()
                .insert(record)
                .map_err(|e| Self::conflict(e, id))?;
            if let Err(e) = self.persist().await {
                self.rows().remove(&id);
                return Err(e);
            }
            Ok(R::clone(&stored))
        })
    }

    fn update(&self, record: R) -> BoxFuture<'_, Result<R, CoreError>> {
        Box::pin(async move {
            let id = record.id();
            let previous = self.rows().get(&id);
            let stored = self
                .rows()
                .replace(record)
                .map_err(|e| Self::conflict(e, id))?;
            if let Err(e) = self.persist().await {
                if let Some(previous) = previous {
                    self.roll_back(self.rows().replace(R::clone(&previous)));
                }
                return Err(e);
            }
            Ok(R::clone(&stored))
        })
    }

    fn delete(&self, id: RecordId) -> BoxFuture<'_, Result<Option<R>, CoreError>> {
        Box::pin(async move {
            let removed = self.rows().remove(&id);
            if let Some(record) = &removed {
                if let Err(e) = self.persist().await {
                    self.roll_back(self.rows().insert(R::clone(record)));
                    return Err(e);
                }
            }
            Ok(removed.map(|r| R::clone(&r)))
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<usize, CoreError>> {
        Box::pin(async move { Ok(self.rows().len()) })
    }
}

// ── MemoryStore ──────────────────────────────────────────────────────

/// In-process [`RecordStore`], optionally backed by a JSON snapshot file.
pub struct MemoryStore {
    tables: Arc<Tables>,
    path: Option<PathBuf>,
    extensions: MemoryTable<Extension>,
    trunks: MemoryTable<Trunk>,
    queues: MemoryTable<Queue>,
    inbound_routes: MemoryTable<InboundRoute>,
    outbound_routes: MemoryTable<OutboundRoute>,
    call_records: MemoryTable<CallDetailRecord>,
    sip_traces: MemoryTable<SipTraceLog>,
}

impl MemoryStore {
    /// A store that lives only as long as the process.
    pub fn new() -> Self {
        Self::build(Arc::new(Tables::new()), None)
    }

    /// Open (or start) a store persisted at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let tables = Arc::new(Tables::new());

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                tables.restore(snapshot).map_err(|e| CoreError::Store {
                    message: format!("{} contains duplicate keys: {e:?}", path.display()),
                })?;
                debug!(path = %path.display(), "record snapshot loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no record snapshot yet");
            }
            Err(e) => return Err(e.into()),
        }

        let snapshot = Arc::new(SnapshotFile {
            path: path.clone(),
            lock: Mutex::new(()),
        });
        Ok(Self::build(tables, Some(snapshot)))
    }

    fn build(tables: Arc<Tables>, snapshot: Option<Arc<SnapshotFile>>) -> Self {
        let path = snapshot.as_ref().map(|s| s.path.clone());

        Self {
            extensions: table_of(&tables, &snapshot, |t| &t.extensions),
            trunks: table_of(&tables, &snapshot, |t| &t.trunks),
            queues: table_of(&tables, &snapshot, |t| &t.queues),
            inbound_routes: table_of(&tables, &snapshot, |t| &t.inbound_routes),
            outbound_routes: table_of(&tables, &snapshot, |t| &t.outbound_routes),
            call_records: table_of(&tables, &snapshot, |t| &t.call_records),
            sip_traces: table_of(&tables, &snapshot, |t| &t.sip_traces),
            tables,
            path,
        }
    }

    /// Snapshot file backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Monotonic counter of mutations across all tables.
    pub fn revision(&self) -> u64 {
        self.tables.revision()
    }
}

fn table_of<R: Record>(
    tables: &Arc<Tables>,
    snapshot: &Option<Arc<SnapshotFile>>,
    select: fn(&Tables) -> &RecordCollection<R>,
) -> MemoryTable<R> {
    MemoryTable {
        tables: Arc::clone(tables),
        select,
        snapshot: snapshot.clone(),
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn extensions(&self) -> &dyn Repository<Extension> {
        &self.extensions
    }

    fn trunks(&self) -> &dyn Repository<Trunk> {
        &self.trunks
    }

    fn queues(&self) -> &dyn Repository<Queue> {
        &self.queues
    }

    fn inbound_routes(&self) -> &dyn Repository<InboundRoute> {
        &self.inbound_routes
    }

    fn outbound_routes(&self) -> &dyn Repository<OutboundRoute> {
        &self.outbound_routes
    }

    fn call_records(&self) -> &dyn Repository<CallDetailRecord> {
        &self.call_records
    }

    fn sip_traces(&self) -> &dyn Repository<SipTraceLog> {
        &self.sip_traces
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{CreateExtensionRequest, CreateTrunkRequest, UpdateExtensionRequest};

    fn extension(number: &str) -> Extension {
        CreateExtensionRequest {
            extension: number.into(),
            name: format!("User {number}"),
            secret: "s3cret".into(),
            ..Default::default()
        }
        .into_record(Utc::now())
    }

    #[tokio::test]
    async fn duplicate_key_is_a_conflict() {
        let store = MemoryStore::new();
        store.extensions().create(extension("101")).await.unwrap();

        let err = store
            .extensions()
            .create(extension("101"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");
        assert_eq!(store.extensions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .extensions()
            .update(extension("101"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn rename_frees_old_key() {
        let store = MemoryStore::new();
        let mut ext = store.extensions().create(extension("101")).await.unwrap();
        UpdateExtensionRequest {
            extension: Some("201".into()),
            ..Default::default()
        }
        .apply(&mut ext, Utc::now());
        store.extensions().update(ext).await.unwrap();

        assert!(
            store
                .extensions()
                .find_by_key("101")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .extensions()
                .find_by_key("201")
                .await
                .unwrap()
                .is_some()
        );
        store.extensions().create(extension("101")).await.unwrap();
    }

    #[tokio::test]
    async fn find_all_is_ordered_by_key() {
        let store = MemoryStore::new();
        for number in ["103", "101", "102"] {
            store.extensions().create(extension(number)).await.unwrap();
        }
        let keys: Vec<String> = store
            .extensions()
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.extension)
            .collect();
        assert_eq!(keys, vec!["101", "102", "103"]);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = MemoryStore::open(&path).await.unwrap();
        let ext = store.extensions().create(extension("101")).await.unwrap();
        store
            .trunks()
            .create(
                CreateTrunkRequest {
                    name: "T1".into(),
                    host: "sip.example.net".into(),
                    ..Default::default()
                }
                .into_record(Utc::now()),
            )
            .await
            .unwrap();
        drop(store);

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(
            reopened.extensions().find_one(ext.id).await.unwrap(),
            Some(ext)
        );
        assert_eq!(reopened.trunks().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_save_leaves_tables_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = MemoryStore::open(&path).await.unwrap();
        let ext = store.extensions().create(extension("101")).await.unwrap();

        // A non-empty directory in place of the snapshot makes the rename fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"").unwrap();

        let err = store
            .extensions()
            .create(extension("102"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Io(_)), "{err:?}");
        assert!(
            store
                .extensions()
                .find_by_key("102")
                .await
                .unwrap()
                .is_none()
        );

        let mut renamed = ext.clone();
        UpdateExtensionRequest {
            extension: Some("201".into()),
            ..Default::default()
        }
        .apply(&mut renamed, Utc::now());
        store.extensions().update(renamed).await.unwrap_err();
        assert_eq!(
            store.extensions().find_one(ext.id).await.unwrap(),
            Some(ext.clone())
        );
        assert!(
            store
                .extensions()
                .find_by_key("201")
                .await
                .unwrap()
                .is_none()
        );

        store.extensions().delete(ext.id).await.unwrap_err();
        assert_eq!(
            store.extensions().find_by_key("101").await.unwrap(),
            Some(ext)
        );
        assert_eq!(store.extensions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("none.json"))
            .await
            .unwrap();
        assert_eq!(store.extensions().count().await.unwrap(), 0);
        assert_eq!(store.revision(), 0);
    }
}
