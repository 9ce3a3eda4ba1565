mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::cli::{Cli, Command, LogFormat, ServeArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity; serve may log to a file or as JSON
    let serve = match &cli.command {
        Command::Serve(args) => Some(args),
        _ => None,
    };
    let _guard = init_tracing(cli.global.verbose, serve);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, serve: Option<&ServeArgs>) -> Option<WorkerGuard> {
    let level = match (verbosity, serve.is_some()) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = serve.and_then(|s| s.log_file.as_deref());
    let json = serve.is_some_and(|s| s.log_format == LogFormat::Json);

    let (writer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("pbxctl.log"));
            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    guard
}

async fn run(mut cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a switch connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "pbxctl", &mut std::io::stdout());
            Ok(())
        }

        // Everything else resolves a profile first
        cmd => {
            let cfg = config::load_config()?;
            cli.global.output = Some(config::output_format(&cli.global, &cfg)?);

            let credentials = if commands::needs_switch(&cmd, cli.global.offline) {
                config::Credentials::Required
            } else {
                config::Credentials::Optional
            };
            let pbx_config = config::resolve_pbx_config(&cli.global, &cfg, credentials)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, pbx_config, &cli.global).await
        }
    }
}
