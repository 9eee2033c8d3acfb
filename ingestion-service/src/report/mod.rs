//! CSV reports over stored polls.
//!
//! Two files are written per resource: the flattened estimated actuals as
//! `(timestamp, value)` rows, and the forecasts as one grid-aligned row per
//! stored poll, `(anchor, v1, v2, ...)`. Forecasts are read in bounded chunks
//! of the requested range.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use irradiance_client::{
    db::{registered_resource_id, select_actuals, select_polls_in_chunk, ActualRow},
    domain::{PollRecord, Quantity, SitesResponse},
    extract_series, AlignmentError, ResourceIdError, ResourceKey, TimeChunks,
};
use sqlx::PgPool;
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Duration, OffsetDateTime,
};

use crate::config::{MisalignedPolicy, ReportConfig};

/// `%Y-%m-%dT%H:%M:%S%z`
const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

const DEFAULT_SPAN: Duration = Duration::hours(24);

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
    #[error("invalid resource list {path}: {source}")]
    ResourceList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    ResourceId(#[from] ResourceIdError),
    #[error("query failed: {0}")]
    Query(String),
    #[error("forecast poll at {time} cannot be aligned: {source}")]
    Misaligned {
        time: OffsetDateTime,
        #[source]
        source: AlignmentError,
    },
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String, time::error::Format> {
    ts.format(TIMESTAMP_FORMAT)
}

/// Parse a `--fr`/`--to` bound: `%Y-%m-%dT%H:%M:%S%z`, or RFC 3339.
pub fn parse_bound(input: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(input, TIMESTAMP_FORMAT).or_else(|_| OffsetDateTime::parse(input, &Rfc3339))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl ReportRange {
    /// A missing bound is placed 24 hours from the other one; with neither
    /// given the range is the 24 hours up to `now`.
    pub fn resolve(from: Option<OffsetDateTime>, to: Option<OffsetDateTime>, now: OffsetDateTime) -> Self {
        match (from, to) {
            (Some(from), Some(to)) => Self { from, to },
            (Some(from), None) => Self {
                from,
                to: from + DEFAULT_SPAN,
            },
            (None, Some(to)) => Self {
                from: to - DEFAULT_SPAN,
                to,
            },
            (None, None) => Self {
                from: now - DEFAULT_SPAN,
                to: now,
            },
        }
    }
}

/// Resource ids to report on. `arg` is either a file in the sites search
/// response shape, or a single resource id.
pub fn load_resource_ids(arg: &str) -> Result<Vec<String>, ReportError> {
    let path = Path::new(arg);
    if !path.is_file() {
        return Ok(vec![arg.to_string()]);
    }

    let contents = fs::read_to_string(path)?;
    let parsed: SitesResponse = serde_json::from_str(&contents).map_err(|source| ReportError::ResourceList {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parsed.sites.into_iter().map(|s| s.resource_id).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    EstimatedActuals,
    Forecasts,
}

impl ReportKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::EstimatedActuals => "est_actuals",
            Self::Forecasts => "forecasts",
        }
    }
}

pub fn report_file_name(kind: ReportKind, resource_id: &str, range: &ReportRange) -> Result<String, ReportError> {
    Ok(format!(
        "{}_{}_{}_{}.csv",
        kind.prefix(),
        resource_id,
        format_timestamp(range.from)?,
        format_timestamp(range.to)?
    ))
}

fn csv_writer<W: io::Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(inner)
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write `(timestamp, value)` rows; returns the number of rows written.
pub fn write_actuals<W: io::Write>(inner: W, rows: &[ActualRow]) -> Result<usize, ReportError> {
    let mut wtr = csv_writer(inner);
    for row in rows {
        wtr.write_record([format_timestamp(row.time)?, format_value(row.value)])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Forecast CSV fed chunk by chunk.
pub struct ForecastCsv<W: io::Write> {
    wtr: csv::Writer<W>,
    field: String,
    policy: MisalignedPolicy,
    written: usize,
    skipped: usize,
}

impl<W: io::Write> ForecastCsv<W> {
    pub fn new(inner: W, field: &str, policy: MisalignedPolicy) -> Self {
        Self {
            wtr: csv_writer(inner),
            field: field.to_string(),
            policy,
            written: 0,
            skipped: 0,
        }
    }

    pub fn append(&mut self, polls: &[PollRecord]) -> Result<(), ReportError> {
        for poll in polls {
            let series = match extract_series(poll, &self.field) {
                Ok(series) => series,
                Err(source) => match self.policy {
                    MisalignedPolicy::Abort => {
                        return Err(ReportError::Misaligned {
                            time: poll.time,
                            source,
                        })
                    }
                    MisalignedPolicy::Skip => {
                        tracing::warn!(time = %poll.time, error = %source, "forecast poll skipped");
                        self.skipped += 1;
                        continue;
                    }
                },
            };

            let mut record = Vec::with_capacity(series.values.len() + 1);
            record.push(format_timestamp(series.anchor)?);
            record.extend(series.values.into_iter().map(format_value));
            self.wtr.write_record(&record)?;
            self.written += 1;
        }
        Ok(())
    }

    /// Flush and return `(rows written, polls skipped)`.
    pub fn finish(mut self) -> Result<(usize, usize), ReportError> {
        self.wtr.flush()?;
        Ok((self.written, self.skipped))
    }
}

#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub actuals_path: PathBuf,
    pub forecasts_path: PathBuf,
    pub actual_rows: usize,
    pub forecast_rows: usize,
    pub skipped_polls: usize,
}

fn query_error(e: anyhow::Error) -> ReportError {
    ReportError::Query(format!("{e}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MappingCheck {
    Matches,
    Unregistered,
    Mismatch,
    Unavailable,
}

/// Compare the identifier stored for a key with the one being reported on.
/// The `resources` table is optional, so a failed lookup only warns.
fn check_mapping(resource_id: &str, lookup: anyhow::Result<Option<String>>) -> MappingCheck {
    match lookup {
        Ok(Some(existing)) if existing.eq_ignore_ascii_case(resource_id) => MappingCheck::Matches,
        Ok(Some(existing)) => {
            tracing::warn!(
                resource_id,
                existing = %existing,
                "resource key was stored for a different identifier"
            );
            MappingCheck::Mismatch
        }
        Ok(None) => MappingCheck::Unregistered,
        Err(e) => {
            tracing::warn!(resource_id, error = %e, "resource mapping unavailable");
            MappingCheck::Unavailable
        }
    }
}

/// Write both reports for one resource into `cfg.output_dir`.
pub async fn generate(
    pool: &PgPool,
    resource_id: &str,
    range: &ReportRange,
    cfg: &ReportConfig,
) -> Result<ReportSummary, ReportError> {
    let key = ResourceKey::from_resource_id(resource_id)?;

    check_mapping(resource_id, registered_resource_id(pool, key).await);

    fs::create_dir_all(&cfg.output_dir)?;

    let actuals = select_actuals(
        pool,
        Quantity::EstimatedActuals,
        key,
        &cfg.field,
        range.from,
        range.to,
    )
    .await
    .map_err(query_error)?;
    tracing::info!(resource_id, rows = actuals.len(), "actuals fetched");

    let actuals_path = cfg
        .output_dir
        .join(report_file_name(ReportKind::EstimatedActuals, resource_id, range)?);
    let actual_rows = write_actuals(File::create(&actuals_path)?, &actuals)?;

    let forecasts_path = cfg
        .output_dir
        .join(report_file_name(ReportKind::Forecasts, resource_id, range)?);
    let mut forecasts = ForecastCsv::new(File::create(&forecasts_path)?, &cfg.field, cfg.on_misaligned);

    let chunk_size = Duration::days(i64::from(cfg.chunk_days));
    for chunk in TimeChunks::new(range.from, range.to, chunk_size) {
        let polls = select_polls_in_chunk(pool, Quantity::Forecasts, key, &chunk)
            .await
            .map_err(query_error)?;
        tracing::info!(resource_id, chunk_start = %chunk.start, rows = polls.len(), "forecast chunk fetched");
        forecasts.append(&polls)?;
    }
    let (forecast_rows, skipped_polls) = forecasts.finish()?;

    Ok(ReportSummary {
        actuals_path,
        forecasts_path,
        actual_rows,
        forecast_rows,
        skipped_polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use irradiance_client::{alignment::expected_period_end, alignment::GRID_STEP, format_period_end};
    use serde_json::{json, Value};
    use std::io::Write;
    use time::macros::datetime;

    fn poll(time: OffsetDateTime, n: usize) -> PollRecord {
        let steps = (0..n)
            .map(|i| {
                json!({
                    "period_end": format_period_end(expected_period_end(time, i, GRID_STEP)),
                    "ghi": i as f64 * 1.5,
                })
            })
            .collect();
        PollRecord {
            time,
            resource: 1,
            data: Value::Array(steps),
        }
    }

    #[test]
    fn timestamps_use_compact_offset() {
        assert_eq!(
            format_timestamp(datetime!(2023-01-01 00:00:00 UTC)).unwrap(),
            "2023-01-01T00:00:00+0000"
        );
    }

    #[test]
    fn bounds_accept_both_formats() {
        let expected = datetime!(2023-01-01 10:00:00 +10);
        assert_eq!(parse_bound("2023-01-01T10:00:00+1000").unwrap(), expected);
        assert_eq!(parse_bound("2023-01-01T10:00:00+10:00").unwrap(), expected);
        assert_eq!(
            parse_bound("2023-01-01T00:00:00Z").unwrap(),
            datetime!(2023-01-01 00:00:00 UTC)
        );
        assert!(parse_bound("yesterday").is_err());
    }

    #[test]
    fn range_defaults_to_a_day() {
        let now = datetime!(2023-01-02 12:00:00 UTC);
        let day = datetime!(2023-01-01 00:00:00 UTC);

        assert_eq!(
            ReportRange::resolve(None, None, now),
            ReportRange {
                from: datetime!(2023-01-01 12:00:00 UTC),
                to: now
            }
        );
        assert_eq!(ReportRange::resolve(Some(day), None, now).to, datetime!(2023-01-02 00:00:00 UTC));
        assert_eq!(ReportRange::resolve(None, Some(day), now).from, datetime!(2022-12-31 00:00:00 UTC));
        assert_eq!(ReportRange::resolve(Some(day), Some(now), now), ReportRange { from: day, to: now });
    }

    #[test]
    fn file_names_follow_kind_resource_and_range() {
        let range = ReportRange {
            from: datetime!(2023-01-01 00:00:00 UTC),
            to: datetime!(2023-01-02 00:00:00 UTC),
        };
        assert_eq!(
            report_file_name(ReportKind::EstimatedActuals, "ab12", &range).unwrap(),
            "est_actuals_ab12_2023-01-01T00:00:00+0000_2023-01-02T00:00:00+0000.csv"
        );
        assert_eq!(
            report_file_name(ReportKind::Forecasts, "ab12", &range).unwrap(),
            "forecasts_ab12_2023-01-01T00:00:00+0000_2023-01-02T00:00:00+0000.csv"
        );
    }

    #[test]
    fn actuals_are_written_one_per_line() {
        let rows = vec![
            ActualRow {
                time: datetime!(2023-01-01 00:05:00 UTC),
                value: Some(12.5),
            },
            ActualRow {
                time: datetime!(2023-01-01 00:10:00 UTC),
                value: None,
            },
        ];
        let mut out = Vec::new();
        assert_eq!(write_actuals(&mut out, &rows).unwrap(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2023-01-01T00:05:00+0000,12.5\n2023-01-01T00:10:00+0000,\n"
        );
    }

    #[test]
    fn forecasts_are_written_as_anchor_plus_values() {
        let mut out = Vec::new();
        {
            let mut csv = ForecastCsv::new(&mut out, "ghi", MisalignedPolicy::Abort);
            csv.append(&[poll(datetime!(2023-01-01 00:03:00 UTC), 3)]).unwrap();
            csv.append(&[poll(datetime!(2023-01-01 00:08:00 UTC), 2)]).unwrap();
            assert_eq!(csv.finish().unwrap(), (2, 0));
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2023-01-01T00:00:00+0000,0,1.5,3\n2023-01-01T00:05:00+0000,0,1.5\n"
        );
    }

    #[test]
    fn misaligned_poll_aborts_or_is_skipped() {
        let good = poll(datetime!(2023-01-01 00:00:00 UTC), 2);
        let mut bad = poll(datetime!(2023-01-01 00:05:00 UTC), 2);
        bad.data[1]["period_end"] = json!("2023-01-01T00:15:01.0000000Z");

        let mut csv = ForecastCsv::new(Vec::new(), "ghi", MisalignedPolicy::Abort);
        let err = csv.append(&[good.clone(), bad.clone()]).unwrap_err();
        match err {
            ReportError::Misaligned { time, source } => {
                assert_eq!(time, datetime!(2023-01-01 00:05:00 UTC));
                assert_eq!(source.index(), Some(1));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut csv = ForecastCsv::new(Vec::new(), "ghi", MisalignedPolicy::Skip);
        csv.append(&[good, bad]).unwrap();
        assert_eq!(csv.finish().unwrap(), (1, 1));
    }

    #[test]
    fn resource_ids_come_from_file_or_argument() {
        assert_eq!(load_resource_ids("ab12-cd34").unwrap(), vec!["ab12-cd34".to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{"sites": [{{"resource_id": "ab12"}}, {{"resource_id": "cd34", "name": "South"}}]}}"#
        )
        .unwrap();

        let ids = load_resource_ids(path.to_str().unwrap()).unwrap();
        assert_eq!(ids, vec!["ab12".to_string(), "cd34".to_string()]);

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "not json").unwrap();
        assert!(matches!(
            load_resource_ids(broken.to_str().unwrap()),
            Err(ReportError::ResourceList { .. })
        ));
    }

    #[test]
    fn missing_resources_table_only_warns() {
        let id = "ab12ab12-ab12-ab12-ab12-ab12ab12ab12";
        assert_eq!(check_mapping(id, Ok(Some(id.to_uppercase()))), MappingCheck::Matches);
        assert_eq!(check_mapping(id, Ok(None)), MappingCheck::Unregistered);
        assert_eq!(check_mapping(id, Ok(Some("other".to_string()))), MappingCheck::Mismatch);
        assert_eq!(
            check_mapping(id, Err(anyhow::anyhow!("relation \"resources\" does not exist"))),
            MappingCheck::Unavailable
        );
    }

    #[derive(thiserror::Error, Debug)]
    #[error("relation \"forecasts\" does not exist")]
    struct DbMessage;

    #[derive(thiserror::Error, Debug)]
    #[error("error returned from database: {0}")]
    struct Wrapped(#[source] DbMessage);

    #[test]
    fn query_errors_print_the_message_once() {
        let err = query_error(anyhow::Error::new(Wrapped(DbMessage)));
        assert_eq!(
            err.to_string(),
            "query failed: error returned from database: relation \"forecasts\" does not exist"
        );
    }
}
