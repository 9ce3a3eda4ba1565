// ── Sync orchestrator ──
//
// After a mutation of some record kind, re-renders every section that
// kind owns, merges the result into each affected file, writes files
// whose content changed, then asks the switch to reload the one module
// the kind maps to. Sync and reload failures land in the `SyncReport`;
// they never undo the record store change.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures_util::future::BoxFuture;
use pbxctl_ami::{Action, ManagerClient};
use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::merge::{self, SectionEdit};
use crate::model::RecordKind;
use crate::render::{self, RenderedSection};
use crate::store::RecordStore;

// ── Config files ─────────────────────────────────────────────────────

/// The switch config files this crate manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigFile {
    /// `sip.conf`, read by the SIP channel driver.
    Sip,
    /// `extensions.conf`, the dialplan.
    Dialplan,
    /// `queues.conf`.
    Queues,
}

impl ConfigFile {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Sip => "sip.conf",
            Self::Dialplan => "extensions.conf",
            Self::Queues => "queues.conf",
        }
    }

    /// Content a missing file starts from.
    pub fn skeleton(self) -> &'static str {
        match self {
            Self::Sip => render::SIP_SKELETON,
            Self::Dialplan => render::DIALPLAN_SKELETON,
            Self::Queues => render::QUEUES_SKELETON,
        }
    }

    /// Module that re-reads this file.
    pub fn reload_module(self) -> &'static str {
        match self {
            Self::Sip => CHANNEL_DRIVER_MODULE,
            Self::Dialplan => DIALPLAN_MODULE,
            Self::Queues => QUEUE_MODULE,
        }
    }
}

pub const CHANNEL_DRIVER_MODULE: &str = "chan_sip.so";
pub const DIALPLAN_MODULE: &str = "pbx_config.so";
pub const QUEUE_MODULE: &str = "app_queue.so";

/// Module reloaded after `kind` changes. History kinds have none.
pub fn reload_module(kind: RecordKind) -> Option<&'static str> {
    match kind {
        RecordKind::Extension | RecordKind::Trunk => Some(CHANNEL_DRIVER_MODULE),
        RecordKind::Queue => Some(QUEUE_MODULE),
        RecordKind::InboundRoute | RecordKind::OutboundRoute => Some(DIALPLAN_MODULE),
        RecordKind::CallDetailRecord | RecordKind::SipTrace => None,
    }
}

// ── Rendered parts ───────────────────────────────────────────────────

/// One independently rendered piece of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    ExtensionPeers,
    TrunkPeers,
    QueueDefinitions,
    InternalContext,
    FromTrunkContext,
    OutboundContext,
    QueuesContext,
}

impl Part {
    const ALL: [Part; 7] = [
        Part::ExtensionPeers,
        Part::TrunkPeers,
        Part::QueueDefinitions,
        Part::InternalContext,
        Part::FromTrunkContext,
        Part::OutboundContext,
        Part::QueuesContext,
    ];

    fn file(self) -> ConfigFile {
        match self {
            Part::ExtensionPeers | Part::TrunkPeers => ConfigFile::Sip,
            Part::QueueDefinitions => ConfigFile::Queues,
            Part::InternalContext
            | Part::FromTrunkContext
            | Part::OutboundContext
            | Part::QueuesContext => ConfigFile::Dialplan,
        }
    }

    /// Kind whose stale per-record sections this part cleans up.
    fn owner(self) -> Option<RecordKind> {
        match self {
            Part::ExtensionPeers => Some(RecordKind::Extension),
            Part::TrunkPeers => Some(RecordKind::Trunk),
            Part::QueueDefinitions => Some(RecordKind::Queue),
            _ => None,
        }
    }

    fn for_kind(kind: RecordKind) -> &'static [Part] {
        match kind {
            RecordKind::Extension => &[Part::ExtensionPeers, Part::InternalContext],
            RecordKind::Trunk => &[Part::TrunkPeers],
            RecordKind::Queue => &[Part::QueueDefinitions, Part::QueuesContext],
            RecordKind::InboundRoute => &[Part::FromTrunkContext],
            RecordKind::OutboundRoute => &[Part::OutboundContext, Part::InternalContext],
            RecordKind::CallDetailRecord | RecordKind::SipTrace => &[],
        }
    }

    async fn render(self, store: &dyn RecordStore) -> Result<Vec<RenderedSection>, CoreError> {
        Ok(match self {
            Part::ExtensionPeers => {
                render::sip_extension_sections(&store.extensions().find_all().await?)
            }
            Part::TrunkPeers => render::sip_trunk_sections(&store.trunks().find_all().await?),
            Part::QueueDefinitions => render::queue_sections(&store.queues().find_all().await?),
            Part::InternalContext => {
                let extensions = store.extensions().find_all().await?;
                let has_outbound = store.outbound_routes().count().await? > 0;
                vec![render::internal_context(&extensions, has_outbound)]
            }
            Part::FromTrunkContext => {
                vec![render::from_trunk_context(
                    &store.inbound_routes().find_all().await?,
                )]
            }
            Part::OutboundContext => {
                vec![render::outbound_context(
                    &store.outbound_routes().find_all().await?,
                )]
            }
            Part::QueuesContext => {
                vec![render::queues_context(&store.queues().find_all().await?)]
            }
        })
    }
}

// ── Config filesystem ────────────────────────────────────────────────

/// Where config files are read from and written to.
pub trait ConfigFs: Send + Sync + 'static {
    /// Full file text, or `None` when the file does not exist.
    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, io::Result<Option<String>>>;

    /// Replace the file's content.
    fn write<'a>(&'a self, name: &'a str, contents: String) -> BoxFuture<'a, io::Result<()>>;

    /// Human-readable location of `name`, for reports and logs.
    fn location(&self, name: &str) -> String;
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    tmp_name.push(".pbxctl-tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Config files in a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ConfigFs for DiskFs {
    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, io::Result<Option<String>>> {
        Box::pin(async move {
            match tokio::fs::read_to_string(self.root.join(name)).await {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn write<'a>(&'a self, name: &'a str, contents: String) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move { write_atomic(&self.root.join(name), contents.as_bytes()).await })
    }

    fn location(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }
}

/// In-memory config files, with switchable I/O failures. Used for dry
/// runs and tests.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: DashMap<String, String>,
    failing: DashSet<String>,
    writes: DashMap<String, usize>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file.
    pub fn with_file(self, name: &str, contents: &str) -> Self {
        self.files.insert(name.to_owned(), contents.to_owned());
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.files.get(name).map(|f| f.value().clone())
    }

    /// Make every read and write of `name` fail.
    pub fn fail(&self, name: &str) {
        self.failing.insert(name.to_owned());
    }

    pub fn recover(&self, name: &str) {
        self.failing.remove(name);
    }

    /// Number of successful writes to `name`.
    pub fn write_count(&self, name: &str) -> usize {
        self.writes.get(name).map_or(0, |n| *n)
    }

    fn check(&self, name: &str) -> io::Result<()> {
        if self.failing.contains(name) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{name} is not accessible"),
            ));
        }
        Ok(())
    }
}

impl ConfigFs for MemoryFs {
    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, io::Result<Option<String>>> {
        Box::pin(async move {
            self.check(name)?;
            Ok(self.get(name))
        })
    }

    fn write<'a>(&'a self, name: &'a str, contents: String) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            self.check(name)?;
            self.files.insert(name.to_owned(), contents);
            *self.writes.entry(name.to_owned()).or_insert(0) += 1;
            Ok(())
        })
    }

    fn location(&self, name: &str) -> String {
        format!("memory:{name}")
    }
}

// ── Module reload ────────────────────────────────────────────────────

/// Asks the switch to re-read one module's configuration.
pub trait ModuleReloader: Send + Sync + 'static {
    fn reload<'a>(&'a self, module: &'a str) -> BoxFuture<'a, Result<(), CoreError>>;
}

impl ModuleReloader for ManagerClient {
    fn reload<'a>(&'a self, module: &'a str) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            self.execute(Action::new("Reload").param("Module", module))
                .await?;
            Ok(())
        })
    }
}

// ── Reports ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Written,
    Unchanged,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub file: ConfigFile,
    pub location: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReloadStatus {
    Reloaded,
    /// No file changed, so the running switch is already current.
    NotNeeded,
    /// No switch connection was configured.
    Skipped {
        reason: String,
    },
    /// A file this module reads was written, but the pass reloaded another
    /// module. The switch runs the old content until this one reloads.
    Pending {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub module: String,
    #[serde(flatten)]
    pub status: ReloadStatus,
}

/// What one synchronization pass did to files and the live switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub files: Vec<FileOutcome>,
    pub reloads: Vec<ReloadOutcome>,
}

impl SyncReport {
    /// Every affected file is current on disk.
    pub fn files_synced(&self) -> bool {
        !self
            .files
            .iter()
            .any(|f| matches!(f.status, FileStatus::Failed { .. }))
    }

    /// Files are current and the switch has loaded them.
    pub fn live_updated(&self) -> bool {
        self.files_synced()
            && self
                .reloads
                .iter()
                .all(|r| matches!(r.status, ReloadStatus::Reloaded | ReloadStatus::NotNeeded))
    }

    pub fn written(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Written))
    }

    /// Human-readable problems, one per failed file or reload.
    pub fn warnings(&self) -> Vec<String> {
        let files = self.files.iter().filter_map(|f| match &f.status {
            FileStatus::Failed { error } => Some(format!("{}: {error}", f.location)),
            _ => None,
        });
        let reloads = self.reloads.iter().filter_map(|r| match &r.status {
            ReloadStatus::Failed { error } => Some(format!("reload {}: {error}", r.module)),
            ReloadStatus::Skipped { reason } => {
                Some(format!("reload {} skipped: {reason}", r.module))
            }
            ReloadStatus::Pending { reason } => {
                Some(format!("reload {} pending: {reason}", r.module))
            }
            _ => None,
        });
        files.chain(reloads).collect()
    }
}

// ── SyncOrchestrator ─────────────────────────────────────────────────

struct FileLocks {
    sip: Mutex<()>,
    dialplan: Mutex<()>,
    queues: Mutex<()>,
}

impl FileLocks {
    fn get(&self, file: ConfigFile) -> &Mutex<()> {
        match file {
            ConfigFile::Sip => &self.sip,
            ConfigFile::Dialplan => &self.dialplan,
            ConfigFile::Queues => &self.queues,
        }
    }
}

/// Render -> merge -> write -> reload, one file at a time.
pub struct SyncOrchestrator {
    store: Arc<dyn RecordStore>,
    fs: Arc<dyn ConfigFs>,
    reloader: Option<Arc<dyn ModuleReloader>>,
    locks: FileLocks,
}

impl SyncOrchestrator {
    /// An orchestrator that writes files but never reloads.
    pub fn new(store: Arc<dyn RecordStore>, fs: Arc<dyn ConfigFs>) -> Self {
        Self {
            store,
            fs,
            reloader: None,
            locks: FileLocks {
                sip: Mutex::new(()),
                dialplan: Mutex::new(()),
                queues: Mutex::new(()),
            },
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<dyn ModuleReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn has_reloader(&self) -> bool {
        self.reloader.is_some()
    }

    /// Resynchronize everything `kind` renders, then reload its module.
    ///
    /// Only that one module is reloaded. Other written files (the dialplan
    /// after an extension or queue change) are reported as `Pending`.
    pub async fn sync_kind(&self, kind: RecordKind) -> SyncReport {
        let parts = Part::for_kind(kind);
        let Some(module) = reload_module(kind) else {
            return SyncReport::default();
        };

        let files = self.sync_parts(parts).await;
        let any_written = files.iter().any(|f| f.status == FileStatus::Written);
        let mut reloads = vec![self.reload(module, any_written).await];
        for outcome in files.iter().filter(|f| f.status == FileStatus::Written) {
            let other = outcome.file.reload_module();
            if other == module || reloads.iter().any(|r| r.module == other) {
                continue;
            }
            reloads.push(self.not_reloaded(other, outcome.file, module));
        }
        SyncReport { files, reloads }
    }

    /// Resynchronize every file, reloading the module of each file written.
    pub async fn sync_all(&self) -> SyncReport {
        let files = self.sync_parts(&Part::ALL).await;
        let mut reloads = Vec::new();
        for outcome in &files {
            let written = outcome.status == FileStatus::Written;
            reloads.push(self.reload(outcome.file.reload_module(), written).await);
        }
        SyncReport { files, reloads }
    }

    /// The text `file` would have after a full sync, without writing it.
    pub async fn preview(&self, file: ConfigFile) -> Result<String, CoreError> {
        let parts: Vec<Part> = Part::ALL.into_iter().filter(|p| p.file() == file).collect();
        let _guard = self.locks.get(file).lock().await;
        let current = self.read_or_skeleton(file).await?;
        let edits = self.edits(&parts, &current).await?;
        Ok(merge::merge(&current, &edits))
    }

    async fn sync_parts(&self, parts: &[Part]) -> Vec<FileOutcome> {
        let mut outcomes = Vec::new();
        for file in ConfigFile::iter() {
            let file_parts: Vec<Part> =
                parts.iter().copied().filter(|p| p.file() == file).collect();
            if file_parts.is_empty() {
                continue;
            }
            let location = self.fs.location(file.file_name());
            let status = match self.sync_file(file, &file_parts).await {
                Ok(true) => {
                    info!(file = %location, "config file updated");
                    FileStatus::Written
                }
                Ok(false) => {
                    debug!(file = %location, "config file unchanged");
                    FileStatus::Unchanged
                }
                Err(e) => {
                    warn!(file = %location, error = %e, "config file sync failed");
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(FileOutcome {
                file,
                location,
                status,
            });
        }
        outcomes
    }

    /// Returns whether the file was written.
    async fn sync_file(&self, file: ConfigFile, parts: &[Part]) -> Result<bool, CoreError> {
        let _guard = self.locks.get(file).lock().await;

        let existing = self.fs.read(file.file_name()).await?;
        let current = existing
            .as_deref()
            .unwrap_or_else(|| file.skeleton())
            .to_owned();
        let edits = self.edits(parts, &current).await?;
        let merged = merge::merge(&current, &edits);

        if existing.as_deref() == Some(merged.as_str()) {
            return Ok(false);
        }
        self.fs.write(file.file_name(), merged).await?;
        Ok(true)
    }

    async fn read_or_skeleton(&self, file: ConfigFile) -> Result<String, CoreError> {
        Ok(self
            .fs
            .read(file.file_name())
            .await?
            .unwrap_or_else(|| file.skeleton().to_owned()))
    }

    /// Upserts for everything rendered, plus removal of managed sections
    /// whose record no longer exists.
    async fn edits(&self, parts: &[Part], current: &str) -> Result<Vec<SectionEdit>, CoreError> {
        let mut edits = Vec::new();
        for part in parts {
            let sections = part.render(self.store.as_ref()).await?;
            if let Some(owner) = part.owner() {
                let live: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
                for stale in merge::managed_sections(current, &owner.to_string()) {
                    if !live.contains(&stale.as_str()) {
                        debug!(section = %stale, kind = %owner, "removing stale section");
                        edits.push(SectionEdit::Remove(stale));
                    }
                }
            }
            edits.extend(sections.into_iter().map(SectionEdit::Upsert));
        }
        Ok(edits)
    }

    fn not_reloaded(&self, module: &str, file: ConfigFile, reloaded: &str) -> ReloadOutcome {
        let status = if self.reloader.is_some() {
            debug!(
                module,
                file = file.file_name(),
                reloaded,
                "reload left to a later pass"
            );
            ReloadStatus::Pending {
                reason: format!(
                    "{} changed, this change reloads only {reloaded}",
                    file.file_name()
                ),
            }
        } else {
            ReloadStatus::Skipped {
                reason: "no switch connection".into(),
            }
        };
        ReloadOutcome {
            module: module.to_owned(),
            status,
        }
    }

    async fn reload(&self, module: &str, any_written: bool) -> ReloadOutcome {
        let status = if !any_written {
            ReloadStatus::NotNeeded
        } else if let Some(reloader) = &self.reloader {
            match reloader.reload(module).await {
                Ok(()) => {
                    info!(module, "module reloaded");
                    ReloadStatus::Reloaded
                }
                Err(e) => {
                    warn!(module, error = %e, "module reload failed");
                    ReloadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            }
        } else {
            debug!(module, "no switch connection, reload skipped");
            ReloadStatus::Skipped {
                reason: "no switch connection".into(),
            }
        };
        ReloadOutcome {
            module: module.to_owned(),
            status,
        }
    }
}
