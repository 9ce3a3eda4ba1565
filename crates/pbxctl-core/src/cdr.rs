// ── Call detail records ──
//
// `CdrRecorder` persists one record per `Cdr` event, keyed by the
// switch's `UniqueID`; a repeated event for the same call is skipped.
// The query helpers below back the `cdr` commands and the dashboard.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use pbxctl_ami::{EventListener, ListenerError, ManagerEvent};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{CallDetailRecord, CallDisposition, RecordId};
use crate::store::RecordStore;

/// Timestamp layout of `StartTime`/`AnswerTime`/`EndTime`.
const CDR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Event parsing ────────────────────────────────────────────────────

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, CDR_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn optional(event: &ManagerEvent, key: &str) -> Option<String> {
    event
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Build a record from a `Cdr` event. Times without a zone are UTC.
pub fn parse_cdr_event(
    event: &ManagerEvent,
    now: DateTime<Utc>,
) -> Result<CallDetailRecord, CoreError> {
    let field = |key: &str| event.get(key).unwrap_or_default().trim().to_owned();
    let seconds = |key: &str| {
        event
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    };

    let unique_id = field("UniqueID");
    if unique_id.is_empty() {
        return Err(CoreError::validation("Cdr event without UniqueID"));
    }

    Ok(CallDetailRecord {
        id: RecordId::new(),
        unique_id,
        src: field("Source"),
        dst: field("Destination"),
        dcontext: field("DestinationContext"),
        clid: field("CallerID"),
        channel: field("Channel"),
        dstchannel: field("DestinationChannel"),
        lastapp: field("LastApplication"),
        lastdata: field("LastData"),
        start: parse_time(event.get("StartTime")).unwrap_or(now),
        answer: parse_time(event.get("AnswerTime")),
        end: parse_time(event.get("EndTime")),
        duration: seconds("Duration"),
        billsec: seconds("BillableSeconds"),
        disposition: event
            .get("Disposition")
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or_default(),
        amaflags: optional(event, "AMAFlags"),
        accountcode: optional(event, "AccountCode"),
        userfield: optional(event, "UserField"),
        recordingfile: optional(event, "RecordingFile"),
        created_at: now,
    })
}

// ── Recorder ─────────────────────────────────────────────────────────

/// Outcome of handling one `Cdr` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Created(Box<CallDetailRecord>),
    Duplicate,
}

/// Event listener that stores call detail records.
pub struct CdrRecorder {
    store: Arc<dyn RecordStore>,
}

impl CdrRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist the record carried by `event`, unless already stored.
    pub async fn record(&self, event: &ManagerEvent) -> Result<Recorded, CoreError> {
        let record = parse_cdr_event(event, Utc::now())?;
        let repo = self.store.call_records();

        if repo.find_by_key(&record.unique_id).await?.is_some() {
            debug!(unique_id = %record.unique_id, "duplicate Cdr event skipped");
            return Ok(Recorded::Duplicate);
        }
        match repo.create(record).await {
            Ok(stored) => {
                info!(
                    unique_id = %stored.unique_id,
                    src = %stored.src,
                    dst = %stored.dst,
                    disposition = %stored.disposition,
                    "call recorded"
                );
                Ok(Recorded::Created(Box::new(stored)))
            }
            // Lost a race with another delivery of the same call.
            Err(CoreError::Conflict { .. }) => Ok(Recorded::Duplicate),
            Err(e) => Err(e),
        }
    }
}

impl EventListener for CdrRecorder {
    fn name(&self) -> &str {
        "cdr-recorder"
    }

    async fn on_event(&mut self, event: Arc<ManagerEvent>) -> Result<(), ListenerError> {
        if event.event_name() != Some("Cdr") {
            return Ok(());
        }
        self.record(&event).await?;
        Ok(())
    }
}

// ── Queries ──────────────────────────────────────────────────────────

/// Filter and page over stored call records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdrQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Substring of the calling number.
    pub src: Option<String>,
    /// Substring of the dialed number.
    pub dst: Option<String>,
    pub disposition: Option<CallDisposition>,
    /// 1-based.
    pub page: usize,
    pub limit: usize,
}

impl Default for CdrQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            src: None,
            dst: None,
            disposition: None,
            page: 1,
            limit: 50,
        }
    }
}

impl CdrQuery {
    fn matches(&self, cdr: &CallDetailRecord) -> bool {
        self.from.is_none_or(|from| cdr.start >= from)
            && self.to.is_none_or(|to| cdr.start <= to)
            && self
                .src
                .as_ref()
                .is_none_or(|s| cdr.src.contains(s.as_str()))
            && self
                .dst
                .as_ref()
                .is_none_or(|d| cdr.dst.contains(d.as_str()))
            && self.disposition.is_none_or(|d| cdr.disposition == d)
    }
}

/// One page of call records, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdrPage {
    pub records: Vec<CallDetailRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

pub async fn query_calls(store: &dyn RecordStore, query: &CdrQuery) -> Result<CdrPage, CoreError> {
    let mut matched = store
        .call_records()
        .find_where(&|cdr| query.matches(cdr))
        .await?;
    matched.sort_by(|a, b| {
        b.start
            .cmp(&a.start)
            .then_with(|| a.unique_id.cmp(&b.unique_id))
    });

    let limit = query.limit.max(1);
    let page = query.page.max(1);
    let total = matched.len();
    let records = matched
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Ok(CdrPage {
        records,
        total,
        page,
        limit,
        pages: total.div_ceil(limit),
    })
}

/// The most recent `limit` calls.
pub async fn recent_calls(
    store: &dyn RecordStore,
    limit: usize,
) -> Result<Vec<CallDetailRecord>, CoreError> {
    let query = CdrQuery {
        limit,
        ..CdrQuery::default()
    };
    Ok(query_calls(store, &query).await?.records)
}

/// Disposition counts for a set of calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallSummary {
    pub total: usize,
    pub answered: usize,
    pub no_answer: usize,
    pub busy: usize,
    pub failed: usize,
    /// Mean `duration` of answered calls, in seconds.
    pub average_duration: f64,
}

impl CallSummary {
    fn from_calls<'a>(calls: impl IntoIterator<Item = &'a CallDetailRecord>) -> Self {
        let mut summary = Self::default();
        let mut answered_seconds: u64 = 0;
        for call in calls {
            summary.total += 1;
            match call.disposition {
                CallDisposition::Answered => {
                    summary.answered += 1;
                    answered_seconds += u64::from(call.duration);
                }
                CallDisposition::NoAnswer => summary.no_answer += 1,
                CallDisposition::Busy => summary.busy += 1,
                CallDisposition::Failed => summary.failed += 1,
                CallDisposition::Unknown => {}
            }
        }
        if summary.answered > 0 {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            let average = answered_seconds as f64 / summary.answered as f64;
            summary.average_duration = average;
        }
        summary
    }
}

/// Bounds of the UTC day containing `now`.
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN));
    (start, start + Duration::days(1))
}

/// Calls that started on the UTC day containing `now`.
pub async fn today_summary(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
) -> Result<CallSummary, CoreError> {
    let (start, end) = day_bounds(now);
    let calls = store
        .call_records()
        .find_where(&|cdr| cdr.start >= start && cdr.start < end)
        .await?;
    Ok(CallSummary::from_calls(&calls))
}

/// How `stats` buckets calls.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatsGroup {
    #[default]
    Day,
    Hour,
    Source,
    Destination,
    Disposition,
}

/// Aggregates for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStats {
    pub key: String,
    pub count: usize,
    pub total_duration: u64,
    pub total_billsec: u64,
    pub answered: usize,
    pub no_answer: usize,
    pub busy: usize,
    pub failed: usize,
}

/// Grouped call statistics over an optional date range. Time buckets come
/// back in chronological order, the others by descending count.
pub async fn stats(
    store: &dyn RecordStore,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    group: StatsGroup,
) -> Result<Vec<CallStats>, CoreError> {
    let calls = store
        .call_records()
        .find_where(&|cdr| from.is_none_or(|f| cdr.start >= f) && to.is_none_or(|t| cdr.start <= t))
        .await?;

    let mut buckets: BTreeMap<String, Vec<&CallDetailRecord>> = BTreeMap::new();
    for call in &calls {
        let key = match group {
            StatsGroup::Day => call.start.format("%Y-%m-%d").to_string(),
            StatsGroup::Hour => call.start.format("%Y-%m-%d %H:00").to_string(),
            StatsGroup::Source => call.src.clone(),
            StatsGroup::Destination => call.dst.clone(),
            StatsGroup::Disposition => call.disposition.to_string(),
        };
        buckets.entry(key).or_default().push(call);
    }

    let mut rows: Vec<CallStats> = buckets
        .into_iter()
        .map(|(key, calls)| {
            let summary = CallSummary::from_calls(calls.iter().copied());
            CallStats {
                key,
                count: calls.len(),
                total_duration: calls.iter().map(|c| u64::from(c.duration)).sum(),
                total_billsec: calls.iter().map(|c| u64::from(c.billsec)).sum(),
                answered: summary.answered,
                no_answer: summary.no_answer,
                busy: summary.busy,
                failed: summary.failed,
            }
        })
        .collect();

    if !matches!(group, StatsGroup::Day | StatsGroup::Hour) {
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    }
    Ok(rows)
}

/// A number and how many calls it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberCount {
    pub number: String,
    pub count: usize,
}

async fn top_by(
    store: &dyn RecordStore,
    limit: usize,
    pick: fn(&CallDetailRecord) -> &str,
) -> Result<Vec<NumberCount>, CoreError> {
    let calls = store.call_records().find_all().await?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for call in &calls {
        *counts.entry(pick(call)).or_default() += 1;
    }
    let mut rows: Vec<NumberCount> = counts
        .into_iter()
        .map(|(number, count)| NumberCount {
            number: number.to_owned(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.number.cmp(&b.number)));
    rows.truncate(limit);
    Ok(rows)
}

/// Most dialed destinations.
pub async fn top_destinations(
    store: &dyn RecordStore,
    limit: usize,
) -> Result<Vec<NumberCount>, CoreError> {
    top_by(store, limit, |c| c.dst.as_str()).await
}

/// Most active callers.
pub async fn top_callers(
    store: &dyn RecordStore,
    limit: usize,
) -> Result<Vec<NumberCount>, CoreError> {
    top_by(store, limit, |c| c.src.as_str()).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pbxctl_ami::ManagerMessage;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::MemoryStore;

    fn cdr_event(unique_id: &str, src: &str, dst: &str, disposition: &str) -> ManagerEvent {
        ManagerMessage::new()
            .with("Event", "Cdr")
            .with("AccountCode", "")
            .with("Source", src)
            .with("Destination", dst)
            .with("DestinationContext", "internal")
            .with("CallerID", format!("\"Alice\" <{src}>"))
            .with("Channel", format!("SIP/{src}-00000001"))
            .with("DestinationChannel", format!("SIP/{dst}-00000002"))
            .with("LastApplication", "Dial")
            .with("LastData", format!("SIP/{dst},20"))
            .with("StartTime", "2026-10-18 09:15:00")
            .with("AnswerTime", "2026-10-18 09:15:04")
            .with("EndTime", "2026-10-18 09:16:04")
            .with("Duration", "64")
            .with("BillableSeconds", "60")
            .with("Disposition", disposition)
            .with("AMAFlags", "DOCUMENTATION")
            .with("UniqueID", unique_id)
            .with("UserField", "")
    }

    #[test]
    fn parses_event_fields() {
        let now = Utc::now();
        let cdr = parse_cdr_event(&cdr_event("1700.1", "101", "102", "ANSWERED"), now).unwrap();
        assert_eq!(cdr.unique_id, "1700.1");
        assert_eq!(cdr.disposition, CallDisposition::Answered);
        assert_eq!(cdr.duration, 64);
        assert_eq!(cdr.billsec, 60);
        assert_eq!(
            cdr.start,
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 0).unwrap()
        );
        assert_eq!(cdr.accountcode, None);
        assert_eq!(cdr.amaflags.as_deref(), Some("DOCUMENTATION"));
        assert_eq!(cdr.created_at, now);
    }

    #[test]
    fn missing_unique_id_is_rejected() {
        let event = ManagerMessage::new().with("Event", "Cdr");
        assert!(matches!(
            parse_cdr_event(&event, Utc::now()),
            Err(CoreError::ValidationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_events_create_one_record() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let recorder = CdrRecorder::new(Arc::clone(&store));
        let event = cdr_event("1700.7", "101", "102", "ANSWERED");

        assert!(matches!(
            recorder.record(&event).await.unwrap(),
            Recorded::Created(_)
        ));
        assert_eq!(recorder.record(&event).await.unwrap(), Recorded::Duplicate);
        assert_eq!(store.call_records().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn listener_ignores_other_events() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let mut recorder = CdrRecorder::new(Arc::clone(&store));
        let hangup = ManagerMessage::new()
            .with("Event", "Hangup")
            .with("UniqueID", "1");
        recorder.on_event(Arc::new(hangup)).await.unwrap();
        assert_eq!(store.call_records().count().await.unwrap(), 0);
    }

    async fn seeded() -> Arc<dyn RecordStore> {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let recorder = CdrRecorder::new(Arc::clone(&store));
        let calls = [
            ("1", "101", "102", "ANSWERED"),
            ("2", "101", "103", "NO ANSWER"),
            ("3", "102", "103", "BUSY"),
            ("4", "101", "103", "ANSWERED"),
        ];
        for (id, src, dst, disp) in calls {
            recorder
                .record(&cdr_event(id, src, dst, disp))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let store = seeded().await;
        let query = CdrQuery {
            src: Some("101".into()),
            limit: 2,
            ..CdrQuery::default()
        };
        let page = query_calls(store.as_ref(), &query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
        assert_eq!(page.records.len(), 2);

        let answered = CdrQuery {
            disposition: Some(CallDisposition::Answered),
            ..CdrQuery::default()
        };
        assert_eq!(
            query_calls(store.as_ref(), &answered).await.unwrap().total,
            2
        );
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let store = seeded().await;
        for page in [3, usize::MAX] {
            let query = CdrQuery {
                page,
                limit: 2,
                ..CdrQuery::default()
            };
            let result = query_calls(store.as_ref(), &query).await.unwrap();
            assert!(result.records.is_empty());
            assert_eq!(result.total, 4);
            assert_eq!(result.page, page);
        }
    }

    #[tokio::test]
    async fn today_summary_averages_answered_calls() {
        let store = seeded().await;
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap();
        let summary = today_summary(store.as_ref(), now).await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.no_answer, 1);
        assert_eq!(summary.busy, 1);
        assert!((summary.average_duration - 64.0).abs() < f64::EPSILON);

        let tomorrow = now + Duration::days(1);
        assert_eq!(
            today_summary(store.as_ref(), tomorrow).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn stats_and_top_numbers() {
        let store = seeded().await;
        let by_dst = stats(store.as_ref(), None, None, StatsGroup::Destination)
            .await
            .unwrap();
        assert_eq!(by_dst[0].key, "103");
        assert_eq!(by_dst[0].count, 3);
        assert_eq!(by_dst[0].answered, 1);

        let by_day = stats(store.as_ref(), None, None, StatsGroup::Day)
            .await
            .unwrap();
        assert_eq!(by_day.len(), 1);
        assert_eq!(by_day[0].key, "2026-10-18");
        assert_eq!(by_day[0].total_billsec, 240);

        let callers = top_callers(store.as_ref(), 1).await.unwrap();
        assert_eq!(
            callers,
            vec![NumberCount {
                number: "101".into(),
                count: 3
            }]
        );
        let destinations = top_destinations(store.as_ref(), 5).await.unwrap();
        assert_eq!(destinations.len(), 2);
    }
}
