// ── Pbx facade ──
//
// Entry point for consumers. Owns the record store, the sync orchestrator
// and (when connected) the switch. Every configuration mutation validates
// first, writes the record, then resynchronizes the files its kind renders.
// The returned `MutationOutcome` keeps "record saved" apart from "switch
// updated": sync and reload problems are reported, never raised.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pbxctl_ami::{ManagerClient, ReconnectPolicy, TcpConnector};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cdr::{
    self, CallStats, CallSummary, CdrPage, CdrQuery, CdrRecorder, NumberCount, StatsGroup,
};
use crate::config::PbxConfig;
use crate::error::CoreError;
use crate::events::CallEventLogger;
use crate::model::{
    CallDetailRecord, CreateExtensionRequest, CreateInboundRouteRequest,
    CreateOutboundRouteRequest, CreateQueueRequest, CreateTrunkRequest, Extension, InboundRoute,
    NewSipTrace, OutboundRoute, Queue, Record, RecordId, RecordKind, SipTraceLog, Trunk,
    UpdateExtensionRequest, UpdateInboundRouteRequest, UpdateOutboundRouteRequest,
    UpdateQueueRequest, UpdateTrunkRequest,
};
use crate::render::RESERVED_SIP_SECTIONS;
use crate::store::{MemoryStore, RecordStore, Stored};
use crate::switch::{ChannelInfo, Switch, SwitchStatus};
use crate::sync::{ConfigFile, DiskFs, SyncOrchestrator, SyncReport};

// ── Outcomes ─────────────────────────────────────────────────────────

/// A saved record plus what happened to the switch afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome<T> {
    pub record: T,
    pub sync: SyncReport,
}

impl<T> MutationOutcome<T> {
    /// Config files are current and the switch reloaded them.
    pub fn live_updated(&self) -> bool {
        self.sync.live_updated()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.sync.warnings()
    }
}

// ── Trace queries ────────────────────────────────────────────────────

/// Filter and page over stored SIP traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the method.
    pub method: Option<String>,
    pub source_ip: Option<String>,
    pub call_id: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for TraceQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            method: None,
            source_ip: None,
            call_id: None,
            page: 1,
            limit: 50,
        }
    }
}

impl TraceQuery {
    fn matches(&self, trace: &SipTraceLog) -> bool {
        let method = self.method.as_ref().map(|m| m.to_lowercase());
        self.from.is_none_or(|from| trace.timestamp >= from)
            && self.to.is_none_or(|to| trace.timestamp <= to)
            && method
                .as_ref()
                .is_none_or(|m| trace.method.to_lowercase().contains(m.as_str()))
            && self
                .source_ip
                .as_ref()
                .is_none_or(|ip| trace.source_ip == *ip)
            && self
                .call_id
                .as_ref()
                .is_none_or(|id| trace.call_id.as_ref() == Some(id))
    }
}

/// One page of traces, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TracePage {
    pub records: Vec<SipTraceLog>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

// ── Dashboard ────────────────────────────────────────────────────────

/// Counts and live state for the overview screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub extensions: usize,
    pub trunks: usize,
    pub queues: usize,
    pub inbound_routes: usize,
    pub outbound_routes: usize,
    pub calls_today: CallSummary,
    /// `None` when the switch is offline or did not answer.
    pub active_calls: Option<usize>,
    pub switch: Option<SwitchStatus>,
    pub switch_error: Option<String>,
}

// ── Validation ───────────────────────────────────────────────────────

fn key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn pattern_char(c: char) -> bool {
    c.is_ascii_digit()
        || matches!(
            c,
            'X' | 'x' | 'Z' | 'z' | 'N' | 'n' | '.' | '!' | '[' | ']' | '-' | '+' | '*' | '#'
        )
}

fn did_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '*' | '#' | '_' | '.' | '!' | '-')
}

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    single_line(field, value)
}

fn single_line(field: &str, value: &str) -> Result<(), CoreError> {
    if value.contains(['\n', '\r']) {
        return Err(CoreError::validation(format!(
            "{field} must be a single line"
        )));
    }
    Ok(())
}

fn single_line_opt(field: &str, value: Option<&String>) -> Result<(), CoreError> {
    value.map_or(Ok(()), |v| single_line(field, v))
}

fn charset(
    field: &str,
    value: &str,
    allowed: fn(char) -> bool,
    hint: &str,
) -> Result<(), CoreError> {
    require(field, value)?;
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(CoreError::validation(format!(
            "{field} '{value}' contains '{bad}'; allowed: {hint}"
        )));
    }
    Ok(())
}

fn email_shape(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

fn validate_extension(ext: &Extension) -> Result<(), CoreError> {
    charset(
        "extension",
        &ext.extension,
        key_char,
        "letters, digits, '_', '.', '-'",
    )?;
    require("name", &ext.name)?;
    require("secret", &ext.secret)?;
    require("context", &ext.context)?;
    require("host", &ext.host)?;
    require("allow", &ext.allow)?;
    single_line("disallow", &ext.disallow)?;
    single_line_opt("call group", ext.call_group.as_ref())?;
    single_line_opt("pickup group", ext.pickup_group.as_ref())?;
    single_line_opt("mailbox", ext.mailbox.as_ref())?;
    if let Some(email) = &ext.email {
        if !email_shape(email) {
            return Err(CoreError::validation(format!(
                "email '{email}' is not a valid address"
            )));
        }
    }
    Ok(())
}

fn validate_trunk(trunk: &Trunk) -> Result<(), CoreError> {
    charset(
        "trunk name",
        &trunk.name,
        key_char,
        "letters, digits, '_', '.', '-'",
    )?;
    require("host", &trunk.host)?;
    require("context", &trunk.context)?;
    require("allow", &trunk.allow)?;
    single_line("insecure", &trunk.insecure)?;
    single_line("disallow", &trunk.disallow)?;
    single_line_opt("username", trunk.username.as_ref())?;
    single_line_opt("secret", trunk.secret.as_ref())
}

fn validate_member(member: &str) -> Result<(), CoreError> {
    require("queue member", member)?;
    if member.contains(char::is_whitespace) {
        return Err(CoreError::validation(format!(
            "queue member '{member}' must not contain whitespace"
        )));
    }
    Ok(())
}

fn validate_queue(queue: &Queue) -> Result<(), CoreError> {
    charset(
        "queue name",
        &queue.name,
        |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'),
        "letters, digits, '_', '-'",
    )?;
    if queue.name == "general" {
        return Err(CoreError::validation("queue name 'general' is reserved"));
    }
    require("music class", &queue.music_class)?;
    single_line_opt("announce", queue.announce.as_ref())?;
    for (i, member) in queue.members.iter().enumerate() {
        validate_member(member)?;
        if queue.members[..i].contains(member) {
            return Err(CoreError::validation(format!(
                "queue member '{member}' is listed twice"
            )));
        }
    }
    Ok(())
}

fn validate_inbound(route: &InboundRoute) -> Result<(), CoreError> {
    require("route name", &route.name)?;
    charset(
        "destination",
        &route.destination,
        key_char,
        "letters, digits, '_', '.', '-'",
    )?;
    if let Some(did) = &route.did {
        charset(
            "DID",
            did,
            did_char,
            "digits, letters, '+', '*', '#', '_', '.', '!', '-'",
        )?;
    }
    single_line_opt("caller ID name", route.caller_id_name.as_ref())
}

fn validate_outbound(route: &OutboundRoute) -> Result<(), CoreError> {
    require("route name", &route.name)?;
    require("trunk", &route.trunk)?;
    let body = route.pattern.trim_start_matches('_');
    if body.is_empty() {
        return Err(CoreError::validation("pattern must not be empty"));
    }
    charset(
        "pattern",
        body,
        pattern_char,
        "digits, X, Z, N, '.', '!', '[', ']', '-', '+', '*', '#'",
    )?;
    if let Some(prefix) = &route.prefix {
        charset("prefix", prefix, |c| c.is_ascii_digit(), "digits")?;
    }
    if let Some(prepend) = &route.prepend {
        charset(
            "prepend",
            prepend,
            |c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'),
            "digits, '+', '*', '#'",
        )?;
    }
    single_line_opt("caller ID name", route.caller_id_name.as_ref())?;
    single_line_opt("caller ID number", route.caller_id_number.as_ref())
}

// ── Pbx ──────────────────────────────────────────────────────────────

/// Configuration services plus optional live switch access.
#[derive(Clone)]
pub struct Pbx {
    store: Arc<dyn RecordStore>,
    sync: Arc<SyncOrchestrator>,
    switch: Option<Switch>,
    sip_trace_enabled: bool,
}

async fn open_store(config: &PbxConfig) -> Result<Arc<dyn RecordStore>, CoreError> {
    Ok(match &config.data_file {
        Some(path) => Arc::new(MemoryStore::open(path.clone()).await?),
        None => Arc::new(MemoryStore::new()),
    })
}

impl Pbx {
    /// Assemble from explicit parts. Used by tests and embedders.
    pub fn from_parts(
        store: Arc<dyn RecordStore>,
        sync: SyncOrchestrator,
        switch: Option<Switch>,
    ) -> Self {
        Self {
            store,
            sync: Arc::new(sync),
            switch,
            sip_trace_enabled: false,
        }
    }

    pub fn with_sip_trace(mut self, enabled: bool) -> Self {
        self.sip_trace_enabled = enabled;
        self
    }

    /// Open the store and config directory without touching the switch.
    /// Mutations write files; reloads are reported as skipped.
    pub async fn open(config: &PbxConfig) -> Result<Self, CoreError> {
        let store = open_store(config).await?;
        let fs = Arc::new(DiskFs::new(&config.config_dir));
        let sync = SyncOrchestrator::new(Arc::clone(&store), fs);
        debug!(config_dir = %config.config_dir.display(), "pbx opened offline");
        Ok(Self::from_parts(store, sync, None).with_sip_trace(config.sip_trace_enabled))
    }

    /// Open the store and log in to the switch.
    pub async fn connect(config: &PbxConfig) -> Result<Self, CoreError> {
        let store = open_store(config).await?;

        let mut connector = TcpConnector::new(&config.ami_host, config.ami_port);
        connector.connect_timeout = config.connect_timeout;
        let client = ManagerClient::new(config.manager.clone(), Arc::new(connector));
        client.start().await;
        if client.wait_connected(config.connect_timeout).await.is_err() {
            client.stop().await;
            return Err(CoreError::ConnectionFailed {
                target: config.ami_target(),
                reason: format!(
                    "no manager session within {}s",
                    config.connect_timeout.as_secs()
                ),
            });
        }
        info!(switch = %config.ami_target(), "connected to switch");

        let fs = Arc::new(DiskFs::new(&config.config_dir));
        let sync =
            SyncOrchestrator::new(Arc::clone(&store), fs).with_reloader(Arc::new(client.clone()));
        Ok(Self::from_parts(store, sync, Some(Switch::new(client)))
            .with_sip_trace(config.sip_trace_enabled))
    }

    /// Connect, run `f`, disconnect. The session does not reconnect.
    pub async fn oneshot<F, Fut, T>(config: PbxConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Pbx) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.manager.reconnect = ReconnectPolicy::none();

        let pbx = Pbx::connect(&cfg).await?;
        let result = f(pbx.clone()).await;
        pbx.shutdown().await;
        result
    }

    /// Log off the switch, if connected.
    pub async fn shutdown(&self) {
        if let Some(switch) = &self.switch {
            switch.client().stop().await;
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.switch.is_some()
    }

    /// The live switch, or [`CoreError::NotConnected`] when offline.
    pub fn switch(&self) -> Result<&Switch, CoreError> {
        self.switch.as_ref().ok_or(CoreError::NotConnected)
    }

    pub fn sip_trace_enabled(&self) -> bool {
        self.sip_trace_enabled
    }

    /// Start the CDR recorder and call-event logger on the event stream.
    pub fn spawn_listeners(&self) -> Result<Vec<JoinHandle<()>>, CoreError> {
        let client = self.switch()?.client();
        Ok(vec![
            client.spawn_listener(CdrRecorder::new(Arc::clone(&self.store))),
            client.spawn_listener(CallEventLogger::new()),
        ])
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Regenerate every managed file and reload what changed.
    pub async fn sync_all(&self) -> SyncReport {
        let report = self.sync.sync_all().await;
        for warning in report.warnings() {
            warn!("{warning}");
        }
        report
    }

    pub async fn preview(&self, file: ConfigFile) -> Result<String, CoreError> {
        self.sync.preview(file).await
    }

    // ── Generic record plumbing ──────────────────────────────────────

    /// Look a record up by id, falling back to its natural key.
    async fn resolve<R: Stored>(&self, key: &str) -> Result<R, CoreError> {
        let repo = R::repository(self.store.as_ref());
        if let Ok(id) = key.parse::<RecordId>() {
            if let Some(record) = repo.find_one(id).await? {
                return Ok(record);
            }
        }
        repo.find_by_key(key)
            .await?
            .ok_or_else(|| CoreError::not_found(R::KIND, key))
    }

    async fn synced<R: Record>(&self, record: R) -> MutationOutcome<R> {
        let sync = self.sync.sync_kind(R::KIND).await;
        for warning in sync.warnings() {
            warn!(kind = %R::KIND, "{warning}");
        }
        MutationOutcome { record, sync }
    }

    async fn save_new<R: Stored>(&self, record: R) -> Result<MutationOutcome<R>, CoreError> {
        let record = R::repository(self.store.as_ref()).create(record).await?;
        info!(kind = %R::KIND, key = %record.natural_key(), "record created");
        Ok(self.synced(record).await)
    }

    async fn save_existing<R: Stored>(&self, record: R) -> Result<MutationOutcome<R>, CoreError> {
        let record = R::repository(self.store.as_ref()).update(record).await?;
        info!(kind = %R::KIND, key = %record.natural_key(), "record updated");
        Ok(self.synced(record).await)
    }

    async fn remove<R: Stored>(&self, record: R) -> Result<MutationOutcome<R>, CoreError> {
        let removed = R::repository(self.store.as_ref())
            .delete(record.id())
            .await?
            .ok_or_else(|| CoreError::not_found(R::KIND, record.natural_key()))?;
        info!(kind = %R::KIND, key = %removed.natural_key(), "record deleted");
        Ok(self.synced(removed).await)
    }

    /// `sip.conf` headers are shared by extensions and trunks.
    async fn ensure_sip_name_free(&self, name: &str, kind: RecordKind) -> Result<(), CoreError> {
        if RESERVED_SIP_SECTIONS.contains(&name) {
            return Err(CoreError::validation(format!(
                "'{name}' is a reserved sip.conf section"
            )));
        }
        let taken_by = match kind {
            RecordKind::Extension => self
                .store
                .trunks()
                .find_by_key(name)
                .await?
                .map(|_| RecordKind::Trunk),
            _ => self
                .store
                .extensions()
                .find_by_key(name)
                .await?
                .map(|_| RecordKind::Extension),
        };
        match taken_by {
            Some(other) => Err(CoreError::conflict(format!(
                "'{name}' is already used by a {other}; sip.conf sections would collide"
            ))),
            None => Ok(()),
        }
    }

    // ── Extensions ───────────────────────────────────────────────────

    pub async fn list_extensions(&self) -> Result<Vec<Extension>, CoreError> {
        self.store.extensions().find_all().await
    }

    pub async fn extension(&self, key: &str) -> Result<Extension, CoreError> {
        self.resolve(key).await
    }

    pub async fn create_extension(
        &self,
        request: CreateExtensionRequest,
    ) -> Result<MutationOutcome<Extension>, CoreError> {
        let record = request.into_record(Utc::now());
        validate_extension(&record)?;
        self.ensure_sip_name_free(&record.extension, RecordKind::Extension)
            .await?;
        self.save_new(record).await
    }

    pub async fn update_extension(
        &self,
        key: &str,
        request: UpdateExtensionRequest,
    ) -> Result<MutationOutcome<Extension>, CoreError> {
        let mut record: Extension = self.resolve(key).await?;
        let previous = record.extension.clone();
        request.apply(&mut record, Utc::now());
        validate_extension(&record)?;
        if record.extension != previous {
            self.ensure_sip_name_free(&record.extension, RecordKind::Extension)
                .await?;
        }
        self.save_existing(record).await
    }

    pub async fn delete_extension(
        &self,
        key: &str,
    ) -> Result<MutationOutcome<Extension>, CoreError> {
        let record: Extension = self.resolve(key).await?;
        self.remove(record).await
    }

    // ── Trunks ───────────────────────────────────────────────────────

    pub async fn list_trunks(&self) -> Result<Vec<Trunk>, CoreError> {
        self.store.trunks().find_all().await
    }

    pub async fn trunk(&self, key: &str) -> Result<Trunk, CoreError> {
        self.resolve(key).await
    }

    pub async fn create_trunk(
        &self,
        request: CreateTrunkRequest,
    ) -> Result<MutationOutcome<Trunk>, CoreError> {
        let record = request.into_record(Utc::now());
        validate_trunk(&record)?;
        self.ensure_sip_name_free(&record.name, RecordKind::Trunk)
            .await?;
        self.save_new(record).await
    }

    pub async fn update_trunk(
        &self,
        key: &str,
        request: UpdateTrunkRequest,
    ) -> Result<MutationOutcome<Trunk>, CoreError> {
        let mut record: Trunk = self.resolve(key).await?;
        let previous = record.name.clone();
        request.apply(&mut record, Utc::now());
        validate_trunk(&record)?;
        if record.name != previous {
            self.ensure_trunk_unreferenced(&previous, "renamed").await?;
            self.ensure_sip_name_free(&record.name, RecordKind::Trunk)
                .await?;
        }
        self.save_existing(record).await
    }

    pub async fn delete_trunk(&self, key: &str) -> Result<MutationOutcome<Trunk>, CoreError> {
        let record: Trunk = self.resolve(key).await?;
        self.ensure_trunk_unreferenced(&record.name, "deleted")
            .await?;
        self.remove(record).await
    }

    async fn ensure_trunk_unreferenced(&self, name: &str, verb: &str) -> Result<(), CoreError> {
        let routes = self
            .store
            .outbound_routes()
            .find_where(&|route| route.trunk == name)
            .await?;
        if routes.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = routes.iter().map(|r| r.name.as_str()).collect();
        Err(CoreError::conflict(format!(
            "trunk '{name}' cannot be {verb}: used by outbound route(s) {}",
            names.join(", ")
        )))
    }

    // ── Queues ───────────────────────────────────────────────────────

    pub async fn list_queues(&self) -> Result<Vec<Queue>, CoreError> {
        self.store.queues().find_all().await
    }

    pub async fn queue(&self, key: &str) -> Result<Queue, CoreError> {
        self.resolve(key).await
    }

    pub async fn create_queue(
        &self,
        request: CreateQueueRequest,
    ) -> Result<MutationOutcome<Queue>, CoreError> {
        let record = request.into_record(Utc::now());
        validate_queue(&record)?;
        self.save_new(record).await
    }

    pub async fn update_queue(
        &self,
        key: &str,
        request: UpdateQueueRequest,
    ) -> Result<MutationOutcome<Queue>, CoreError> {
        let mut record: Queue = self.resolve(key).await?;
        request.apply(&mut record, Utc::now());
        validate_queue(&record)?;
        self.save_existing(record).await
    }

    pub async fn delete_queue(&self, key: &str) -> Result<MutationOutcome<Queue>, CoreError> {
        let record: Queue = self.resolve(key).await?;
        self.remove(record).await
    }

    /// Append `member` to the stored queue.
    pub async fn add_queue_member(
        &self,
        key: &str,
        member: &str,
    ) -> Result<MutationOutcome<Queue>, CoreError> {
        validate_member(member)?;
        let mut record: Queue = self.resolve(key).await?;
        if record.members.iter().any(|m| m == member) {
            return Err(CoreError::conflict(format!(
                "'{member}' is already a member of queue '{}'",
                record.name
            )));
        }
        record.members.push(member.to_owned());
        record.updated_at = Utc::now();
        self.save_existing(record).await
    }

    pub async fn remove_queue_member(
        &self,
        key: &str,
        member: &str,
    ) -> Result<MutationOutcome<Queue>, CoreError> {
        let mut record: Queue = self.resolve(key).await?;
        let Some(position) = record.members.iter().position(|m| m == member) else {
            return Err(CoreError::not_found(
                RecordKind::Queue,
                format!("member '{member}' of '{}'", record.name),
            ));
        };
        record.members.remove(position);
        record.updated_at = Utc::now();
        self.save_existing(record).await
    }

    async fn queue_with_member(&self, key: &str, member: &str) -> Result<Queue, CoreError> {
        let queue: Queue = self.resolve(key).await?;
        if !queue.members.iter().any(|m| m == member) {
            return Err(CoreError::not_found(
                RecordKind::Queue,
                format!("member '{member}' of '{}'", queue.name),
            ));
        }
        Ok(queue)
    }

    // ── Queue runtime ────────────────────────────────────────────────

    /// Live `queue show` output for one stored queue, or for all.
    pub async fn queue_status(&self, key: Option<&str>) -> Result<Vec<String>, CoreError> {
        let switch = self.switch()?;
        match key {
            Some(key) => {
                let queue: Queue = self.resolve(key).await?;
                switch.queue_status(Some(&queue.name)).await
            }
            None => switch.queue_status(None).await,
        }
    }

    pub async fn pause_queue_member(
        &self,
        key: &str,
        member: &str,
        reason: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        let switch = self.switch()?;
        let queue = self.queue_with_member(key, member).await?;
        switch.pause_member(&queue.name, member, reason).await
    }

    pub async fn unpause_queue_member(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Vec<String>, CoreError> {
        let switch = self.switch()?;
        let queue = self.queue_with_member(key, member).await?;
        switch.unpause_member(&queue.name, member).await
    }

    /// Add a member to the running queue only.
    pub async fn add_dynamic_queue_member(
        &self,
        key: &str,
        member: &str,
        penalty: Option<u32>,
    ) -> Result<Vec<String>, CoreError> {
        validate_member(member)?;
        let switch = self.switch()?;
        let queue: Queue = self.resolve(key).await?;
        switch
            .add_dynamic_member(&queue.name, member, penalty)
            .await
    }

    pub async fn remove_dynamic_queue_member(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Vec<String>, CoreError> {
        let switch = self.switch()?;
        let queue: Queue = self.resolve(key).await?;
        switch.remove_dynamic_member(&queue.name, member).await
    }

    pub async fn reset_queue_stats(&self, key: &str) -> Result<Vec<String>, CoreError> {
        let switch = self.switch()?;
        let queue: Queue = self.resolve(key).await?;
        switch.reset_queue_stats(&queue.name).await
    }

    // ── Inbound routes ───────────────────────────────────────────────

    pub async fn list_inbound_routes(&self) -> Result<Vec<InboundRoute>, CoreError> {
        self.store.inbound_routes().find_all().await
    }

    pub async fn inbound_route(&self, key: &str) -> Result<InboundRoute, CoreError> {
        self.resolve(key).await
    }

    pub async fn create_inbound_route(
        &self,
        request: CreateInboundRouteRequest,
    ) -> Result<MutationOutcome<InboundRoute>, CoreError> {
        let record = request.into_record(Utc::now());
        validate_inbound(&record)?;
        self.ensure_did_free(&record).await?;
        self.save_new(record).await
    }

    pub async fn update_inbound_route(
        &self,
        key: &str,
        request: UpdateInboundRouteRequest,
    ) -> Result<MutationOutcome<InboundRoute>, CoreError> {
        let mut record: InboundRoute = self.resolve(key).await?;
        request.apply(&mut record, Utc::now());
        validate_inbound(&record)?;
        self.ensure_did_free(&record).await?;
        self.save_existing(record).await
    }

    pub async fn delete_inbound_route(
        &self,
        key: &str,
    ) -> Result<MutationOutcome<InboundRoute>, CoreError> {
        let record: InboundRoute = self.resolve(key).await?;
        self.remove(record).await
    }

    async fn ensure_did_free(&self, route: &InboundRoute) -> Result<(), CoreError> {
        let Some(did) = route.did.as_deref() else {
            return Ok(());
        };
        let id = route.id;
        let clashing = self
            .store
            .inbound_routes()
            .find_where(&|other| other.id != id && other.did.as_deref() == Some(did))
            .await?;
        match clashing.first() {
            Some(other) => Err(CoreError::conflict(format!(
                "DID '{did}' is already routed by '{}'",
                other.name
            ))),
            None => Ok(()),
        }
    }

    // ── Outbound routes ──────────────────────────────────────────────

    pub async fn list_outbound_routes(&self) -> Result<Vec<OutboundRoute>, CoreError> {
        self.store.outbound_routes().find_all().await
    }

    pub async fn outbound_route(&self, key: &str) -> Result<OutboundRoute, CoreError> {
        self.resolve(key).await
    }

    pub async fn create_outbound_route(
        &self,
        request: CreateOutboundRouteRequest,
    ) -> Result<MutationOutcome<OutboundRoute>, CoreError> {
        let record = request.into_record(Utc::now());
        validate_outbound(&record)?;
        self.ensure_trunk_exists(&record.trunk).await?;
        self.save_new(record).await
    }

    pub async fn update_outbound_route(
        &self,
        key: &str,
        request: UpdateOutboundRouteRequest,
    ) -> Result<MutationOutcome<OutboundRoute>, CoreError> {
        let mut record: OutboundRoute = self.resolve(key).await?;
        request.apply(&mut record, Utc::now());
        validate_outbound(&record)?;
        self.ensure_trunk_exists(&record.trunk).await?;
        self.save_existing(record).await
    }

    pub async fn delete_outbound_route(
        &self,
        key: &str,
    ) -> Result<MutationOutcome<OutboundRoute>, CoreError> {
        let record: OutboundRoute = self.resolve(key).await?;
        self.remove(record).await
    }

    async fn ensure_trunk_exists(&self, name: &str) -> Result<(), CoreError> {
        if self.store.trunks().find_by_key(name).await?.is_none() {
            return Err(CoreError::validation(format!(
                "trunk '{name}' does not exist"
            )));
        }
        Ok(())
    }

    // ── Call records ─────────────────────────────────────────────────

    pub async fn calls(&self, query: &CdrQuery) -> Result<CdrPage, CoreError> {
        cdr::query_calls(self.store.as_ref(), query).await
    }

    /// One call by record id or switch `UniqueID`.
    pub async fn call(&self, key: &str) -> Result<CallDetailRecord, CoreError> {
        self.resolve(key).await
    }

    pub async fn recent_calls(&self, limit: usize) -> Result<Vec<CallDetailRecord>, CoreError> {
        cdr::recent_calls(self.store.as_ref(), limit).await
    }

    pub async fn calls_today(&self) -> Result<CallSummary, CoreError> {
        cdr::today_summary(self.store.as_ref(), Utc::now()).await
    }

    pub async fn call_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        group: StatsGroup,
    ) -> Result<Vec<CallStats>, CoreError> {
        cdr::stats(self.store.as_ref(), from, to, group).await
    }

    pub async fn top_destinations(&self, limit: usize) -> Result<Vec<NumberCount>, CoreError> {
        cdr::top_destinations(self.store.as_ref(), limit).await
    }

    pub async fn top_callers(&self, limit: usize) -> Result<Vec<NumberCount>, CoreError> {
        cdr::top_callers(self.store.as_ref(), limit).await
    }

    // ── SIP traces ───────────────────────────────────────────────────

    /// Store one captured SIP message.
    pub async fn record_trace(&self, trace: NewSipTrace) -> Result<SipTraceLog, CoreError> {
        if !self.sip_trace_enabled {
            return Err(CoreError::TraceLoggingDisabled);
        }
        require("source IP", &trace.source_ip)?;
        require("destination IP", &trace.destination_ip)?;
        require("method", &trace.method)?;
        let record = self
            .store
            .sip_traces()
            .create(trace.into_record(Utc::now()))
            .await?;
        debug!(method = %record.method, source = %record.source_ip, "sip trace stored");
        Ok(record)
    }

    /// Store a batch of traces. Stops at the first rejected trace.
    pub async fn import_traces(&self, traces: Vec<NewSipTrace>) -> Result<usize, CoreError> {
        let mut stored = 0;
        for trace in traces {
            self.record_trace(trace).await?;
            stored += 1;
        }
        info!(count = stored, "sip traces imported");
        Ok(stored)
    }

    pub async fn list_traces(&self, query: &TraceQuery) -> Result<TracePage, CoreError> {
        let mut matched = self
            .store
            .sip_traces()
            .find_where(&|trace| query.matches(trace))
            .await?;
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let limit = query.limit.max(1);
        let page = query.page.max(1);
        let total = matched.len();
        let records = matched
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Ok(TracePage {
            records,
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        })
    }

    pub async fn trace(&self, key: &str) -> Result<SipTraceLog, CoreError> {
        self.resolve(key).await
    }

    /// Every message of one SIP dialog, oldest first.
    pub async fn call_flow(&self, call_id: &str) -> Result<Vec<SipTraceLog>, CoreError> {
        let mut flow = self
            .store
            .sip_traces()
            .find_where(&|trace| trace.call_id.as_deref() == Some(call_id))
            .await?;
        flow.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(flow)
    }

    // ── Dashboard ────────────────────────────────────────────────────

    pub async fn dashboard(&self) -> Result<Dashboard, CoreError> {
        let mut dashboard = Dashboard {
            extensions: self.store.extensions().count().await?,
            trunks: self.store.trunks().count().await?,
            queues: self.store.queues().count().await?,
            inbound_routes: self.store.inbound_routes().count().await?,
            outbound_routes: self.store.outbound_routes().count().await?,
            calls_today: self.calls_today().await?,
            active_calls: None,
            switch: None,
            switch_error: None,
        };

        if let Some(switch) = &self.switch {
            let live: Result<(SwitchStatus, Vec<ChannelInfo>), CoreError> =
                async { Ok((switch.status().await?, switch.channels().await?)) }.await;
            match live {
                Ok((status, channels)) => {
                    dashboard.switch = Some(status);
                    dashboard.active_calls = Some(channels.len());
                }
                Err(e) => {
                    warn!(error = %e, "switch status unavailable for dashboard");
                    dashboard.switch_error = Some(e.to_string());
                }
            }
        }
        Ok(dashboard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(email_shape("alice@example.com"));
        assert!(!email_shape("alice"));
        assert!(!email_shape("@example.com"));
        assert!(!email_shape("alice@localhost"));
        assert!(!email_shape("a@b@example.com"));
        assert!(!email_shape("alice @example.com"));
    }

    #[test]
    fn pattern_characters() {
        let route = |pattern: &str| OutboundRoute {
            id: RecordId::new(),
            name: "local".into(),
            pattern: pattern.into(),
            trunk: "T1".into(),
            prepend: None,
            prefix: None,
            caller_id_name: None,
            caller_id_number: None,
            priority: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(validate_outbound(&route("_9NXXXXXX")).is_ok());
        assert!(validate_outbound(&route("011.")).is_ok());
        assert!(validate_outbound(&route("_[2-9]XX!")).is_ok());
        assert!(validate_outbound(&route("_")).is_err());
        assert!(validate_outbound(&route("9,Hangup")).is_err());
    }

    #[test]
    fn multiline_values_are_rejected() {
        let ext = CreateExtensionRequest {
            extension: "101".into(),
            name: "Alice\n[evil]".into(),
            secret: "x".into(),
            ..Default::default()
        }
        .into_record(Utc::now());
        let err = validate_extension(&ext).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn trace_query_matching() {
        let trace = NewSipTrace {
            source_ip: "10.0.0.5".into(),
            destination_ip: "10.0.0.1".into(),
            method: "INVITE".into(),
            call_id: Some("abc@host".into()),
            ..Default::default()
        }
        .into_record(Utc::now());

        let by_method = TraceQuery {
            method: Some("inv".into()),
            ..TraceQuery::default()
        };
        assert!(by_method.matches(&trace));

        let wrong_ip = TraceQuery {
            source_ip: Some("10.0.0".into()),
            ..TraceQuery::default()
        };
        assert!(!wrong_ip.matches(&trace));
    }

    #[tokio::test]
    async fn trace_pages_past_the_end_are_empty() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let fs = Arc::new(crate::sync::MemoryFs::new());
        let sync = SyncOrchestrator::new(Arc::clone(&store), fs);
        let pbx = Pbx::from_parts(store, sync, None).with_sip_trace(true);
        pbx.record_trace(NewSipTrace {
            source_ip: "10.0.0.5".into(),
            destination_ip: "10.0.0.1".into(),
            method: "REGISTER".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let query = TraceQuery {
            page: usize::MAX,
            ..TraceQuery::default()
        };
        let page = pbx.list_traces(&query).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, 1);
    }
}
