//! Shared helpers for command handlers.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use strum::VariantNames;

use pbxctl_core::{MutationOutcome, SyncReport};

use crate::cli::{GlobalOpts, OutputFormat, TimeRange};
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read and parse a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: path.display().to_string(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Parse a strum-backed enum flag, listing the accepted values on failure.
pub fn parse_enum<T>(field: &str, value: Option<String>) -> Result<Option<T>, CliError>
where
    T: FromStr + VariantNames,
{
    value
        .map(|v| {
            T::from_str(&v).map_err(|_| CliError::Validation {
                field: field.into(),
                reason: format!("'{v}' is not one of {}", T::VARIANTS.join(", ")),
            })
        })
        .transpose()
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date. Dates mean the
/// start of the day, or its last second when `end_of_day` is set.
pub fn parse_time(
    field: &str,
    value: Option<&str>,
    end_of_day: bool,
) -> Result<Option<DateTime<Utc>>, CliError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("'{value}' is neither RFC 3339 nor YYYY-MM-DD"),
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| t.and_utc()))
}

/// `--from` / `--to` as UTC bounds.
pub fn parse_range(
    range: &TimeRange,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), CliError> {
    Ok((
        parse_time("from", range.from.as_deref(), false)?,
        parse_time("to", range.to.as_deref(), true)?,
    ))
}

/// Print sync and reload problems as warnings. They never fail the command.
pub fn report_sync(report: &SyncReport, global: &GlobalOpts) {
    for warning in report.warnings() {
        output::warning(&warning, &global.color);
    }
}

/// Console output from the switch: raw lines, or a JSON/YAML string array.
pub fn print_lines(lines: &[String], global: &GlobalOpts) -> Result<(), CliError> {
    let out = match global.format() {
        OutputFormat::Json => serde_json::to_string_pretty(lines)?,
        OutputFormat::JsonCompact => serde_json::to_string(lines)?,
        OutputFormat::Yaml => serde_yaml::to_string(lines)?,
        OutputFormat::Table | OutputFormat::Plain => lines.join("\n"),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Print a mutated record, its confirmation line, and any sync warnings.
pub fn report_mutation<T: serde::Serialize>(
    outcome: &MutationOutcome<T>,
    message: &str,
    global: &GlobalOpts,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<(), CliError> {
    let out = output::render_single(&global.format(), &outcome.record, detail_fn, id_fn)?;
    output::print_output(&out, global.quiet);
    output::success(message, &global.color, global.quiet);
    report_sync(&outcome.sync, global);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pbxctl_core::DtmfMode;

    #[test]
    fn dates_expand_to_day_bounds() {
        let from = parse_time("from", Some("2026-10-18"), false)
            .unwrap()
            .unwrap();
        let to = parse_time("to", Some("2026-10-18"), true).unwrap().unwrap();
        assert_eq!(from.to_rfc3339(), "2026-10-18T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-10-18T23:59:59+00:00");
    }

    #[test]
    fn rfc3339_is_converted_to_utc() {
        let ts = parse_time("from", Some("2026-10-18T10:00:00+02:00"), false)
            .unwrap()
            .unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-10-18T08:00:00+00:00");
    }

    #[test]
    fn bad_time_is_a_validation_error() {
        let err = parse_time("to", Some("yesterday"), true).unwrap_err();
        assert!(matches!(err, CliError::Validation { field, .. } if field == "to"));
    }

    #[test]
    fn enum_errors_list_choices() {
        let parsed: Option<DtmfMode> = parse_enum("dtmf-mode", Some("info".into())).unwrap();
        assert_eq!(parsed, Some(DtmfMode::Info));

        let err = parse_enum::<DtmfMode>("dtmf-mode", Some("pulse".into())).unwrap_err();
        match err {
            CliError::Validation { reason, .. } => assert!(reason.contains("rfc2833")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
