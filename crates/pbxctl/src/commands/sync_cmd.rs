//! `pbxctl sync`: regenerate every managed file, or preview one.

use tabled::Tabled;

use pbxctl_core::{ConfigFile, FileOutcome, FileStatus, PbxConfig, ReloadStatus, SyncReport};

use crate::cli::{ConfigFileArg, GlobalOpts, OutputFormat, SyncArgs};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

#[derive(Tabled)]
struct SyncRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Reload")]
    reload: String,
}

fn rows(report: &SyncReport) -> Vec<SyncRow> {
    report
        .files
        .iter()
        .map(|f: &FileOutcome| {
            let module = f.file.reload_module();
            let reload = report
                .reloads
                .iter()
                .find(|r| r.module == module)
                .map_or_else(
                    || "-".to_owned(),
                    |r| match &r.status {
                        ReloadStatus::Reloaded => "reloaded".into(),
                        ReloadStatus::NotNeeded => "not needed".into(),
                        ReloadStatus::Skipped { .. } => "skipped".into(),
                        ReloadStatus::Pending { .. } => "pending".into(),
                        ReloadStatus::Failed { .. } => "failed".into(),
                    },
                );
            SyncRow {
                file: f.location.clone(),
                result: match &f.status {
                    FileStatus::Written => "written".into(),
                    FileStatus::Unchanged => "unchanged".into(),
                    FileStatus::Failed { .. } => "failed".into(),
                },
                reload,
            }
        })
        .collect()
}

impl From<ConfigFileArg> for ConfigFile {
    fn from(arg: ConfigFileArg) -> Self {
        match arg {
            ConfigFileArg::Sip => Self::Sip,
            ConfigFileArg::Dialplan => Self::Dialplan,
            ConfigFileArg::Queues => Self::Queues,
        }
    }
}

pub async fn handle(
    args: SyncArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(file) = args.preview {
        let file = ConfigFile::from(file);
        let text = with_pbx(config, false, |pbx| async move { pbx.preview(file).await }).await?;
        // Preview is the file itself; structured formats would only quote it
        output::print_output(text.trim_end(), global.quiet);
        return Ok(());
    }

    let live = !global.offline;
    let report = with_pbx(config, live, |pbx| async move { Ok(pbx.sync_all().await) }).await?;

    let out = match global.format() {
        OutputFormat::Table => tabled::Table::new(rows(&report))
            .with(tabled::settings::Style::rounded())
            .to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::JsonCompact => serde_json::to_string(&report)?,
        OutputFormat::Yaml => serde_yaml::to_string(&report)?,
        OutputFormat::Plain => report
            .written()
            .map(|f| f.location.clone())
            .collect::<Vec<_>>()
            .join("\n"),
    };
    output::print_output(&out, global.quiet);

    util::report_sync(&report, global);
    if report.files_synced() {
        let written = report.written().count();
        output::success(
            &format!("{written} of {} files rewritten", report.files.len()),
            &global.color,
            global.quiet,
        );
        Ok(())
    } else {
        Err(CliError::Store {
            message: "one or more config files could not be written".into(),
        })
    }
}
