//! Clap derive structures for the `pbxctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pbxctl -- administer an Asterisk-style telephony switch
#[derive(Debug, Parser)]
#[command(
    name = "pbxctl",
    version,
    about = "Manage a telephony switch from the command line",
    long_about = "Administrative control plane for an Asterisk-style telephony switch.\n\n\
        Extensions, trunks, queues and routes are kept in a record store and\n\
        projected into sip.conf, extensions.conf and queues.conf. Live state\n\
        and commands go through the manager interface (AMI).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Switch profile to use
    #[arg(long, short = 'p', env = "PBXCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Manager interface host (overrides profile)
    #[arg(long, env = "PBXCTL_AMI_HOST", global = true)]
    pub ami_host: Option<String>,

    /// Manager interface port (overrides profile)
    #[arg(long, env = "PBXCTL_AMI_PORT", global = true)]
    pub ami_port: Option<u16>,

    /// Manager username (overrides profile)
    #[arg(long, short = 'u', env = "PBXCTL_AMI_USER", global = true)]
    pub ami_user: Option<String>,

    /// Manager secret
    #[arg(
        long,
        env = "PBXCTL_AMI_PASSWORD",
        global = true,
        hide_env_values = true
    )]
    pub ami_password: Option<String>,

    /// Directory holding the switch config files (overrides profile)
    #[arg(long, env = "PBXCTL_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Record store snapshot file (overrides profile)
    #[arg(long, env = "PBXCTL_DATA_FILE", global = true)]
    pub data_file: Option<PathBuf>,

    /// Write config files without connecting; the switch is not reloaded
    #[arg(long, env = "PBXCTL_OFFLINE", global = true)]
    pub offline: bool,

    /// Output format [default: table, or `defaults.output` from the config file]
    #[arg(long, short = 'o', env = "PBXCTL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Connect + login timeout in seconds (overrides profile)
    #[arg(long, env = "PBXCTL_CONNECT_TIMEOUT", global = true)]
    pub connect_timeout: Option<u64>,
}

impl GlobalOpts {
    /// The selected output format.
    pub fn format(&self) -> OutputFormat {
        self.output.clone().unwrap_or(OutputFormat::Table)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stay connected: record CDRs, log call events, reconnect on loss
    Serve(ServeArgs),

    /// Switch version, uptime and call counts
    Status,

    /// Active channels
    #[command(alias = "ch")]
    Channels,

    /// SIP peers and their reachability
    Peers,

    /// Device state of one extension
    ExtState {
        /// Extension number
        extension: String,

        /// Dialplan context [default: internal]
        #[arg(long)]
        context: Option<String>,
    },

    /// Place a call: ring a channel, then connect it to an extension
    Originate(OriginateArgs),

    /// Hang up a channel
    Hangup {
        /// Channel name (e.g. SIP/101-00000001)
        channel: String,
    },

    /// Run a switch console command and print its output
    Cli {
        /// Command words (e.g. `core show uptime`)
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Reload the switch configuration, or one module
    Reload {
        /// Module name (e.g. chan_sip.so)
        module: Option<String>,
    },

    /// Regenerate every managed config file and reload what changed
    Sync(SyncArgs),

    /// Record counts, today's calls and live switch state
    #[command(alias = "dash")]
    Dashboard,

    /// Manage SIP extensions
    #[command(alias = "ext")]
    Extensions(ExtensionsArgs),

    /// Manage trunks
    Trunks(TrunksArgs),

    /// Manage call queues and their members
    Queues(QueuesArgs),

    /// Manage inbound (DID) routes
    #[command(alias = "in")]
    InboundRoutes(InboundRoutesArgs),

    /// Manage outbound dial-pattern routes
    #[command(alias = "out")]
    OutboundRoutes(OutboundRoutesArgs),

    /// Query call detail records
    Cdr(CdrArgs),

    /// Store and query SIP message traces
    Traces(TracesArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SERVE / SYNC / SWITCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Regenerate all config files once connected
    #[arg(long)]
    pub sync: bool,

    /// Log line format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Print the regenerated file instead of writing anything
    #[arg(long, value_name = "FILE")]
    pub preview: Option<ConfigFileArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFileArg {
    /// sip.conf
    Sip,
    /// extensions.conf
    Dialplan,
    /// queues.conf
    Queues,
}

#[derive(Debug, Args)]
pub struct OriginateArgs {
    /// Extension or full channel to ring first (e.g. 101 or SIP/101)
    pub channel: String,

    /// Extension to connect the answered channel to
    pub extension: String,

    /// Dialplan context [default: internal]
    #[arg(long)]
    pub context: Option<String>,

    /// Dialplan priority
    #[arg(long, default_value = "1")]
    pub priority: u32,

    /// Caller ID presented to the first leg
    #[arg(long)]
    pub caller_id: Option<String>,

    /// Ring timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Channel variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub variables: Vec<String>,
}

// ── Shared record arguments ──────────────────────────────────────────

/// Natural key or record ID.
#[derive(Debug, Args)]
pub struct KeyArg {
    /// Natural key (number / name) or record ID
    pub key: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  EXTENSIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ExtensionsArgs {
    #[command(subcommand)]
    pub command: ExtensionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ExtensionsCommand {
    /// List extensions
    #[command(alias = "ls")]
    List,

    /// Show one extension
    Get(KeyArg),

    /// Create an extension
    Create(ExtensionCreateArgs),

    /// Update an extension (empty string clears optional fields)
    Update {
        /// Extension number or record ID
        key: String,

        /// Renumber the extension
        #[arg(long)]
        number: Option<String>,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// SIP secret
        #[arg(long)]
        secret: Option<String>,

        #[command(flatten)]
        fields: ExtensionFields,
    },

    /// Delete an extension
    #[command(alias = "rm")]
    Delete(KeyArg),
}

#[derive(Debug, Args)]
pub struct ExtensionCreateArgs {
    /// Extension number
    pub extension: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// SIP secret
    #[arg(long)]
    pub secret: String,

    #[command(flatten)]
    pub fields: ExtensionFields,
}

#[derive(Debug, Args)]
pub struct ExtensionFields {
    /// Dialplan context
    #[arg(long)]
    pub context: Option<String>,

    /// Registration host (`dynamic` or an address)
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub call_group: Option<String>,

    #[arg(long)]
    pub pickup_group: Option<String>,

    /// Voicemail box
    #[arg(long)]
    pub mailbox: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// rfc2833, info, inband or auto
    #[arg(long)]
    pub dtmf_mode: Option<String>,

    /// udp, tcp, tls, ws or wss
    #[arg(long)]
    pub transport: Option<String>,

    /// yes, no, force_rport or comedia
    #[arg(long)]
    pub nat: Option<String>,

    /// Concurrent call limit
    #[arg(long)]
    pub call_limit: Option<u32>,

    /// Disallowed codecs
    #[arg(long)]
    pub disallow: Option<String>,

    /// Allowed codecs, comma-separated
    #[arg(long)]
    pub allow: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TRUNKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TrunksArgs {
    #[command(subcommand)]
    pub command: TrunksCommand,
}

#[derive(Debug, Subcommand)]
pub enum TrunksCommand {
    /// List trunks
    #[command(alias = "ls")]
    List,

    /// Show one trunk
    Get(KeyArg),

    /// Create a trunk
    Create {
        /// Trunk name
        name: String,

        /// Provider host
        #[arg(long)]
        host: String,

        #[command(flatten)]
        fields: TrunkFields,
    },

    /// Update a trunk (empty string clears optional fields)
    Update {
        /// Trunk name or record ID
        key: String,

        /// Rename the trunk
        #[arg(long)]
        rename: Option<String>,

        /// Provider host
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        fields: TrunkFields,
    },

    /// Delete a trunk
    #[command(alias = "rm")]
    Delete(KeyArg),
}

#[derive(Debug, Args)]
pub struct TrunkFields {
    /// sip, pjsip or iax
    #[arg(long)]
    pub kind: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub secret: Option<String>,

    /// Context for calls arriving on this trunk
    #[arg(long)]
    pub context: Option<String>,

    /// rfc2833, info, inband or auto
    #[arg(long)]
    pub dtmf_mode: Option<String>,

    /// udp, tcp, tls, ws or wss
    #[arg(long)]
    pub transport: Option<String>,

    #[arg(long)]
    pub insecure: Option<String>,

    /// yes, no, force_rport or comedia
    #[arg(long)]
    pub nat: Option<String>,

    /// Qualify interval in seconds
    #[arg(long)]
    pub qualify_freq: Option<u32>,

    #[arg(long)]
    pub disallow: Option<String>,

    #[arg(long)]
    pub allow: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  QUEUES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct QueuesArgs {
    #[command(subcommand)]
    pub command: QueuesCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueuesCommand {
    /// List queues
    #[command(alias = "ls")]
    List,

    /// Show one queue
    Get(KeyArg),

    /// Create a queue
    Create {
        /// Queue name
        name: String,

        #[command(flatten)]
        fields: QueueFields,
    },

    /// Update a queue (--member replaces the whole member list)
    Update {
        /// Queue name or record ID
        key: String,

        /// Rename the queue
        #[arg(long)]
        rename: Option<String>,

        #[command(flatten)]
        fields: QueueFields,
    },

    /// Delete a queue
    #[command(alias = "rm")]
    Delete(KeyArg),

    /// Add a static member to the stored queue
    AddMember(QueueMemberArgs),

    /// Remove a static member from the stored queue
    RemoveMember(QueueMemberArgs),

    /// Live queue status from the switch
    Status {
        /// Queue name; all queues when omitted
        queue: Option<String>,
    },

    /// Pause a member on the running switch
    Pause {
        #[command(flatten)]
        member: QueueMemberArgs,

        /// Pause reason
        #[arg(long)]
        reason: Option<String>,
    },

    /// Unpause a member on the running switch
    Unpause(QueueMemberArgs),

    /// Add a dynamic member on the running switch (not stored)
    AddDynamic {
        #[command(flatten)]
        member: QueueMemberArgs,

        /// Member penalty
        #[arg(long)]
        penalty: Option<u32>,
    },

    /// Remove a dynamic member from the running switch
    RemoveDynamic(QueueMemberArgs),

    /// Reset the queue's live statistics
    ResetStats {
        /// Queue name
        queue: String,
    },
}

#[derive(Debug, Args)]
pub struct QueueMemberArgs {
    /// Queue name or record ID
    pub queue: String,

    /// Member extension
    pub member: String,
}

#[derive(Debug, Args)]
pub struct QueueFields {
    /// ringall, leastrecent, fewestcalls, random, rrmemory, linear or wrandom
    #[arg(long)]
    pub strategy: Option<String>,

    /// Member ring timeout in seconds
    #[arg(long)]
    pub ring_timeout: Option<u32>,

    /// Seconds a member rests after a call
    #[arg(long)]
    pub wrapuptime: Option<u32>,

    /// Maximum waiting callers (0 = unlimited)
    #[arg(long)]
    pub maxlen: Option<u32>,

    /// Announcement played to the answering member
    #[arg(long)]
    pub announce: Option<String>,

    /// Member extension (repeatable)
    #[arg(long = "member", value_name = "EXTENSION")]
    pub members: Vec<String>,

    /// Music-on-hold class
    #[arg(long)]
    pub music_class: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ROUTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InboundRoutesArgs {
    #[command(subcommand)]
    pub command: InboundRoutesCommand,
}

#[derive(Debug, Subcommand)]
pub enum InboundRoutesCommand {
    /// List inbound routes in evaluation order
    #[command(alias = "ls")]
    List,

    /// Show one inbound route
    Get(KeyArg),

    /// Create an inbound route
    Create {
        /// Route name
        name: String,

        /// Destination extension, queue or IVR
        #[arg(long)]
        destination: String,

        #[command(flatten)]
        fields: InboundRouteFields,
    },

    /// Update an inbound route (empty --did makes it the catch-all)
    Update {
        /// Route name or record ID
        key: String,

        /// Rename the route
        #[arg(long)]
        rename: Option<String>,

        /// Destination extension, queue or IVR
        #[arg(long)]
        destination: Option<String>,

        #[command(flatten)]
        fields: InboundRouteFields,
    },

    /// Delete an inbound route
    #[command(alias = "rm")]
    Delete(KeyArg),
}

#[derive(Debug, Args)]
pub struct InboundRouteFields {
    /// Dialed number to match; omit for the catch-all route
    #[arg(long)]
    pub did: Option<String>,

    /// extension, queue or ivr
    #[arg(long)]
    pub destination_type: Option<String>,

    /// Caller ID name to set on matched calls
    #[arg(long)]
    pub caller_id_name: Option<String>,

    /// Lower sorts first
    #[arg(long, allow_negative_numbers = true)]
    pub priority: Option<i32>,
}

#[derive(Debug, Args)]
pub struct OutboundRoutesArgs {
    #[command(subcommand)]
    pub command: OutboundRoutesCommand,
}

#[derive(Debug, Subcommand)]
pub enum OutboundRoutesCommand {
    /// List outbound routes in evaluation order
    #[command(alias = "ls")]
    List,

    /// Show one outbound route
    Get(KeyArg),

    /// Create an outbound route
    Create {
        /// Route name
        name: String,

        /// Dial pattern (e.g. 9NXXNXXXXXX)
        #[arg(long)]
        pattern: String,

        /// Trunk name
        #[arg(long)]
        trunk: String,

        #[command(flatten)]
        fields: OutboundRouteFields,
    },

    /// Update an outbound route (empty string clears optional fields)
    Update {
        /// Route name or record ID
        key: String,

        /// Rename the route
        #[arg(long)]
        rename: Option<String>,

        /// Dial pattern
        #[arg(long)]
        pattern: Option<String>,

        /// Trunk name
        #[arg(long)]
        trunk: Option<String>,

        #[command(flatten)]
        fields: OutboundRouteFields,
    },

    /// Delete an outbound route
    #[command(alias = "rm")]
    Delete(KeyArg),
}

#[derive(Debug, Args)]
pub struct OutboundRouteFields {
    /// Digits added in front of the dialed number
    #[arg(long)]
    pub prepend: Option<String>,

    /// Digits stripped from the start of the dialed number
    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(long)]
    pub caller_id_name: Option<String>,

    #[arg(long)]
    pub caller_id_number: Option<String>,

    /// Lower sorts first
    #[arg(long, allow_negative_numbers = true)]
    pub priority: Option<i32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CDR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CdrArgs {
    #[command(subcommand)]
    pub command: CdrCommand,
}

/// Time window shared by CDR and trace queries.
#[derive(Debug, Args)]
pub struct TimeRange {
    /// Start (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// End (RFC 3339 or YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<String>,
}

/// 1-based paging.
#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page number
    #[arg(long, default_value = "1")]
    pub page: usize,

    /// Records per page
    #[arg(long, short = 'l', default_value = "50")]
    pub limit: usize,
}

#[derive(Debug, Subcommand)]
pub enum CdrCommand {
    /// List call records, newest first
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        range: TimeRange,

        /// Calling number contains
        #[arg(long)]
        src: Option<String>,

        /// Dialed number contains
        #[arg(long)]
        dst: Option<String>,

        /// answered, "no answer", busy, failed or unknown
        #[arg(long)]
        disposition: Option<String>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Show one call record by unique ID or record ID
    Get(KeyArg),

    /// Most recent calls
    Recent {
        #[arg(long, short = 'l', default_value = "10")]
        limit: usize,
    },

    /// Today's call counts by outcome
    Today,

    /// Aggregated call statistics
    Stats {
        #[command(flatten)]
        range: TimeRange,

        /// Grouping key
        #[arg(long, default_value = "day")]
        group: StatsGroupArg,
    },

    /// Most frequent callers or destinations
    Top {
        /// Which side of the call to rank
        #[arg(default_value = "destinations")]
        by: TopArg,

        #[arg(long, short = 'l', default_value = "10")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatsGroupArg {
    Day,
    Hour,
    Source,
    Destination,
    Disposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopArg {
    Destinations,
    Callers,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TRACES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TracesArgs {
    #[command(subcommand)]
    pub command: TracesCommand,
}

#[derive(Debug, Subcommand)]
pub enum TracesCommand {
    /// List traces, newest first
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        range: TimeRange,

        /// Method contains (case-insensitive)
        #[arg(long)]
        method: Option<String>,

        /// Exact source address
        #[arg(long)]
        source_ip: Option<String>,

        /// Exact Call-ID
        #[arg(long)]
        call_id: Option<String>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Show one trace by record ID
    Get(KeyArg),

    /// Every message of one call, oldest first
    Flow {
        /// SIP Call-ID
        call_id: String,
    },

    /// Store traces from a JSON array file
    Import {
        /// JSON file with an array of trace objects
        file: PathBuf,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store the AMI password in the system keyring (for --profile)
    SetPassword,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
