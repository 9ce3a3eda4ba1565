//! Command dispatch: bridges CLI args -> `Pbx` operations -> output formatting.

pub mod cdr;
pub mod config_cmd;
pub mod dashboard;
pub mod extensions;
pub mod queues;
pub mod routes;
pub mod serve;
pub mod switch;
pub mod sync_cmd;
pub mod traces;
pub mod trunks;
pub mod util;

use std::future::Future;

use pbxctl_core::{CoreError, Pbx, PbxConfig};

use crate::cli::{Command, GlobalOpts, QueuesCommand, SyncArgs};
use crate::error::CliError;

/// Whether `cmd` must log in to the switch (and so needs a password).
pub fn needs_switch(cmd: &Command, offline: bool) -> bool {
    match cmd {
        Command::Serve(_)
        | Command::Status
        | Command::Channels
        | Command::Peers
        | Command::ExtState { .. }
        | Command::Originate(_)
        | Command::Hangup { .. }
        | Command::Cli { .. }
        | Command::Reload { .. } => true,

        Command::Sync(SyncArgs { preview }) => preview.is_none() && !offline,

        Command::Extensions(args) => extensions::mutates(&args.command) && !offline,
        Command::Trunks(args) => trunks::mutates(&args.command) && !offline,
        Command::InboundRoutes(args) => routes::inbound_mutates(&args.command) && !offline,
        Command::OutboundRoutes(args) => routes::outbound_mutates(&args.command) && !offline,
        Command::Queues(args) => match args.command {
            QueuesCommand::Status { .. }
            | QueuesCommand::Pause { .. }
            | QueuesCommand::Unpause(_)
            | QueuesCommand::AddDynamic { .. }
            | QueuesCommand::RemoveDynamic(_)
            | QueuesCommand::ResetStats { .. } => true,
            ref other => queues::mutates(other) && !offline,
        },

        // Best effort: falls back to store-only counts
        Command::Dashboard => false,

        Command::Cdr(_) | Command::Traces(_) | Command::Config(_) | Command::Completions(_) => {
            false
        }
    }
}

/// Run `f` against a `Pbx`: logged in (one-shot, no reconnect) when `live`,
/// otherwise against the store and config directory only.
pub async fn with_pbx<F, Fut, T>(config: &PbxConfig, live: bool, f: F) -> Result<T, CliError>
where
    F: FnOnce(Pbx) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    if live {
        Ok(Pbx::oneshot(config.clone(), f).await?)
    } else {
        let pbx = Pbx::open(config).await?;
        Ok(f(pbx).await?)
    }
}

/// Dispatch a profile-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Serve(args) => serve::handle(args, config, global).await,
        Command::Sync(args) => sync_cmd::handle(args, &config, global).await,
        Command::Dashboard => dashboard::handle(&config, global).await,
        Command::Extensions(args) => extensions::handle(args, &config, global).await,
        Command::Trunks(args) => trunks::handle(args, &config, global).await,
        Command::Queues(args) => queues::handle(args, &config, global).await,
        Command::InboundRoutes(args) => routes::handle_inbound(args, &config, global).await,
        Command::OutboundRoutes(args) => routes::handle_outbound(args, &config, global).await,
        Command::Cdr(args) => cdr::handle(args, &config, global).await,
        Command::Traces(args) => traces::handle(args, &config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
        live => switch::handle(live, &config, global).await,
    }
}
