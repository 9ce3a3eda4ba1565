//! SIP trace commands.

use tabled::Tabled;

use pbxctl_core::{NewSipTrace, PbxConfig, SipTraceLog, TracePage, TraceQuery};

use crate::cli::{GlobalOpts, KeyArg, OutputFormat, TracesArgs, TracesCommand};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

#[derive(Tabled)]
struct TraceRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Dir")]
    direction: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Call-ID")]
    call_id: String,
}

/// `INVITE`, or `200 OK (INVITE)` for responses.
fn summary(t: &SipTraceLog) -> String {
    match t.status_code {
        Some(code) => format!(
            "{code} {} ({})",
            t.reason_phrase.as_deref().unwrap_or_default(),
            t.method
        ),
        None => t.method.clone(),
    }
}

impl From<&SipTraceLog> for TraceRow {
    fn from(t: &SipTraceLog) -> Self {
        Self {
            timestamp: t.timestamp.format("%H:%M:%S%.3f").to_string(),
            direction: t.direction.to_string(),
            source: t.source_ip.clone(),
            destination: t.destination_ip.clone(),
            message: summary(t),
            call_id: output::or_dash(t.call_id.as_deref()),
        }
    }
}

fn detail(t: &SipTraceLog) -> String {
    let mut out = output::detail(&[
        ("ID", t.id.to_string()),
        ("Time", t.timestamp.to_rfc3339()),
        ("Direction", t.direction.to_string()),
        ("Source", t.source_ip.clone()),
        ("Destination", t.destination_ip.clone()),
        ("Message", summary(t)),
        ("Call-ID", output::or_dash(t.call_id.as_deref())),
        ("From", output::or_dash(t.from_user.as_deref())),
        ("To", output::or_dash(t.to_user.as_deref())),
    ]);
    if !t.headers.is_empty() {
        out.push_str("\n\n");
        let headers: Vec<String> = t.headers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        out.push_str(&headers.join("\n"));
    }
    if let Some(body) = t.body.as_deref().filter(|b| !b.is_empty()) {
        out.push_str("\n\n");
        out.push_str(body.trim_end());
    }
    out
}

fn id(t: &SipTraceLog) -> String {
    t.id.to_string()
}

pub async fn handle(
    args: TracesArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        TracesCommand::List {
            range,
            method,
            source_ip,
            call_id,
            paging,
        } => {
            let (from, to) = util::parse_range(&range)?;
            let query = TraceQuery {
                from,
                to,
                method,
                source_ip,
                call_id,
                page: paging.page,
                limit: paging.limit,
            };
            let page = with_pbx(
                config,
                false,
                |pbx| async move { pbx.list_traces(&query).await },
            )
            .await?;
            print_page(&page, global)
        }

        TracesCommand::Get(KeyArg { key }) => {
            let trace = with_pbx(config, false, |pbx| async move { pbx.trace(&key).await }).await?;
            let out = output::render_single(&global.format(), &trace, detail, id)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TracesCommand::Flow { call_id } => {
            let flow = with_pbx(
                config,
                false,
                |pbx| async move { pbx.call_flow(&call_id).await },
            )
            .await?;
            let out = output::render_list(&global.format(), &flow, |r| TraceRow::from(r), id)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TracesCommand::Import { file } => {
            let traces: Vec<NewSipTrace> = util::read_json_file(&file)?;
            let submitted = traces.len();
            let stored = with_pbx(config, false, |pbx| async move {
                pbx.import_traces(traces).await
            })
            .await?;
            output::success(
                &format!("Imported {stored} of {submitted} traces"),
                &global.color,
                global.quiet,
            );
            Ok(())
        }
    }
}

fn print_page(page: &TracePage, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.format();
    let out = match format {
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(&format, &page.records, |r| TraceRow::from(r), id)?
        }
        OutputFormat::Json => serde_json::to_string_pretty(page)?,
        OutputFormat::JsonCompact => serde_json::to_string(page)?,
        OutputFormat::Yaml => serde_yaml::to_string(page)?,
    };
    output::print_output(&out, global.quiet);
    if format == OutputFormat::Table && !global.quiet {
        eprintln!(
            "page {} of {} ({} traces)",
            page.page,
            page.pages.max(1),
            page.total
        );
    }
    Ok(())
}
