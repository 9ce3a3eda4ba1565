//! Call detail record queries. Store-only: no switch connection needed.

use tabled::Tabled;

use pbxctl_core::{
    CallDetailRecord, CallDisposition, CallStats, CallSummary, CdrPage, CdrQuery, NumberCount,
    PbxConfig, StatsGroup,
};

use crate::cli::{CdrArgs, CdrCommand, GlobalOpts, KeyArg, OutputFormat, StatsGroupArg, TopArg};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct CallRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "From")]
    src: String,
    #[tabled(rename = "To")]
    dst: String,
    #[tabled(rename = "Result")]
    disposition: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Billed")]
    billsec: String,
}

impl From<&CallDetailRecord> for CallRow {
    fn from(c: &CallDetailRecord) -> Self {
        Self {
            start: c.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            src: c.src.clone(),
            dst: c.dst.clone(),
            disposition: c.disposition.to_string(),
            duration: format!("{}s", c.duration),
            billsec: format!("{}s", c.billsec),
        }
    }
}

fn call_detail(c: &CallDetailRecord) -> String {
    let time =
        |t: Option<chrono::DateTime<chrono::Utc>>| t.map_or_else(|| "-".into(), |t| t.to_rfc3339());
    output::detail(&[
        ("ID", c.id.to_string()),
        ("Unique ID", c.unique_id.clone()),
        ("From", c.src.clone()),
        ("To", format!("{}@{}", c.dst, c.dcontext)),
        ("Caller ID", output::or_dash(Some(&c.clid))),
        ("Channel", output::or_dash(Some(&c.channel))),
        ("Dest channel", output::or_dash(Some(&c.dstchannel))),
        ("Last app", format!("{}({})", c.lastapp, c.lastdata)),
        ("Start", c.start.to_rfc3339()),
        ("Answer", time(c.answer)),
        ("End", time(c.end)),
        ("Duration", format!("{}s", c.duration)),
        ("Billed", format!("{}s", c.billsec)),
        ("Result", c.disposition.to_string()),
        ("Account", output::or_dash(c.accountcode.as_deref())),
        ("Recording", output::or_dash(c.recordingfile.as_deref())),
    ])
}

fn unique_id(c: &CallDetailRecord) -> String {
    c.unique_id.clone()
}

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Group")]
    key: String,
    #[tabled(rename = "Calls")]
    count: usize,
    #[tabled(rename = "Answered")]
    answered: usize,
    #[tabled(rename = "No answer")]
    no_answer: usize,
    #[tabled(rename = "Busy")]
    busy: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Talk time")]
    billsec: String,
}

impl From<&CallStats> for StatsRow {
    fn from(s: &CallStats) -> Self {
        Self {
            key: s.key.clone(),
            count: s.count,
            answered: s.answered,
            no_answer: s.no_answer,
            busy: s.busy,
            failed: s.failed,
            billsec: format!("{}s", s.total_billsec),
        }
    }
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "Calls")]
    count: usize,
}

impl From<&NumberCount> for CountRow {
    fn from(c: &NumberCount) -> Self {
        Self {
            number: c.number.clone(),
            count: c.count,
        }
    }
}

fn summary_detail(s: &CallSummary) -> String {
    output::detail(&[
        ("Total", s.total.to_string()),
        ("Answered", s.answered.to_string()),
        ("No answer", s.no_answer.to_string()),
        ("Busy", s.busy.to_string()),
        ("Failed", s.failed.to_string()),
        ("Avg duration", format!("{:.1}s", s.average_duration)),
    ])
}

impl From<StatsGroupArg> for StatsGroup {
    fn from(arg: StatsGroupArg) -> Self {
        match arg {
            StatsGroupArg::Day => Self::Day,
            StatsGroupArg::Hour => Self::Hour,
            StatsGroupArg::Source => Self::Source,
            StatsGroupArg::Destination => Self::Destination,
            StatsGroupArg::Disposition => Self::Disposition,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: CdrArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CdrCommand::List {
            range,
            src,
            dst,
            disposition,
            paging,
        } => {
            let (from, to) = util::parse_range(&range)?;
            let query = CdrQuery {
                from,
                to,
                src,
                dst,
                disposition: util::parse_enum::<CallDisposition>("disposition", disposition)?,
                page: paging.page,
                limit: paging.limit,
            };
            let page =
                with_pbx(config, false, |pbx| async move { pbx.calls(&query).await }).await?;
            print_page(&page, global)
        }

        CdrCommand::Get(KeyArg { key }) => {
            let call = with_pbx(config, false, |pbx| async move { pbx.call(&key).await }).await?;
            let out = output::render_single(&global.format(), &call, call_detail, unique_id)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CdrCommand::Recent { limit } => {
            let calls = with_pbx(
                config,
                false,
                |pbx| async move { pbx.recent_calls(limit).await },
            )
            .await?;
            let out =
                output::render_list(&global.format(), &calls, |r| CallRow::from(r), unique_id)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CdrCommand::Today => {
            let summary =
                with_pbx(config, false, |pbx| async move { pbx.calls_today().await }).await?;
            let out = output::render_single(&global.format(), &summary, summary_detail, |s| {
                s.total.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CdrCommand::Stats { range, group } => {
            let (from, to) = util::parse_range(&range)?;
            let group = StatsGroup::from(group);
            let stats = with_pbx(config, false, |pbx| async move {
                pbx.call_stats(from, to, group).await
            })
            .await?;
            let out = output::render_list(
                &global.format(),
                &stats,
                |r| StatsRow::from(r),
                |s| s.key.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CdrCommand::Top { by, limit } => {
            let counts = with_pbx(config, false, |pbx| async move {
                match by {
                    TopArg::Destinations => pbx.top_destinations(limit).await,
                    TopArg::Callers => pbx.top_callers(limit).await,
                }
            })
            .await?;
            print_counts(&counts, global)
        }
    }
}

/// Table output gets a paging footer; structured formats carry the counts.
fn print_page(page: &CdrPage, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.format();
    let out = match format {
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(&format, &page.records, |r| CallRow::from(r), unique_id)?
        }
        OutputFormat::Json => serde_json::to_string_pretty(page)?,
        OutputFormat::JsonCompact => serde_json::to_string(page)?,
        OutputFormat::Yaml => serde_yaml::to_string(page)?,
    };
    output::print_output(&out, global.quiet);
    if format == OutputFormat::Table && !global.quiet {
        eprintln!(
            "page {} of {} ({} calls)",
            page.page,
            page.pages.max(1),
            page.total
        );
    }
    Ok(())
}

fn print_counts(counts: &[NumberCount], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        &global.format(),
        counts,
        |r| CountRow::from(r),
        |c| c.number.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
