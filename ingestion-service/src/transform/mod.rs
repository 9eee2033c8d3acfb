use irradiance_client::{
    alignment::{align_steps, GRID_STEP},
    domain::PollRecord,
    parse_period_end, AlignmentError, ResourceKey,
};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// How a poll is laid out in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// One row per poll, keyed by the run start, holding the whole step array.
    Unflattened,
    /// One row per step, keyed by the step's own `period_end`.
    Flattened,
}

impl IngestMode {
    pub fn from_flatten_flag(flatten: bool) -> Self {
        if flatten {
            Self::Flattened
        } else {
            Self::Unflattened
        }
    }

    /// Flattened rows from overlapping polls share keys; the first write wins.
    pub fn skips_existing(self) -> bool {
        matches!(self, Self::Flattened)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedStep {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BuiltRows {
    pub rows: Vec<PollRecord>,
    pub rejected: Vec<RejectedStep>,
    pub misalignment: Option<AlignmentError>,
}

/// The anchor stored for an unflattened poll: the run start to whole seconds,
/// matching the `TIMESTAMP(0)` column.
pub fn run_anchor(now: OffsetDateTime) -> OffsetDateTime {
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

pub fn build_rows(mode: IngestMode, anchor: OffsetDateTime, key: ResourceKey, steps: Vec<Value>) -> BuiltRows {
    match mode {
        IngestMode::Unflattened => unflattened(anchor, key, steps),
        IngestMode::Flattened => flattened(key, steps),
    }
}

fn unflattened(anchor: OffsetDateTime, key: ResourceKey, steps: Vec<Value>) -> BuiltRows {
    // The anchor is wall-clock time, not taken from the data; check now that
    // the report will be able to put these steps back on the grid.
    let misalignment = align_steps(anchor, &steps, "ghi", GRID_STEP).err();

    BuiltRows {
        rows: vec![PollRecord {
            time: anchor,
            resource: key.get(),
            data: Value::Array(steps),
        }],
        rejected: Vec::new(),
        misalignment,
    }
}

fn flattened(key: ResourceKey, steps: Vec<Value>) -> BuiltRows {
    let mut built = BuiltRows::default();

    for (index, step) in steps.into_iter().enumerate() {
        let Some(period_end) = step.get("period_end").and_then(Value::as_str) else {
            built.rejected.push(RejectedStep {
                index,
                reason: "missing period_end".to_string(),
            });
            continue;
        };

        match parse_period_end(period_end) {
            Ok(time) => built.rows.push(PollRecord {
                time,
                resource: key.get(),
                data: step,
            }),
            Err(e) => built.rejected.push(RejectedStep {
                index,
                reason: e.to_string(),
            }),
        }
    }

    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn key() -> ResourceKey {
        ResourceKey::from_resource_id("ab12ab12-ab12-ab12-ab12-ab12ab12ab12").unwrap()
    }

    #[test]
    fn run_anchor_drops_sub_seconds() {
        assert_eq!(
            run_anchor(datetime!(2023-01-01 00:03:07.654321 UTC)),
            datetime!(2023-01-01 00:03:07 UTC)
        );
    }

    #[test]
    fn unflattened_keeps_the_whole_array_under_the_anchor() {
        let steps = vec![
            json!({"period_end": "2023-01-01T00:05:00.0000000Z", "ghi": 1.0}),
            json!({"period_end": "2023-01-01T00:10:00.0000000Z", "ghi": 2.0}),
        ];
        let anchor = datetime!(2023-01-01 00:03:00 UTC);

        let built = build_rows(IngestMode::Unflattened, anchor, key(), steps.clone());

        assert_eq!(built.rows.len(), 1);
        assert_eq!(built.rows[0].time, anchor);
        assert_eq!(built.rows[0].resource, 3_103_731_189_879_581_458);
        assert_eq!(built.rows[0].data, Value::Array(steps));
        assert!(built.misalignment.is_none());
    }

    #[test]
    fn flattened_keys_each_step_by_its_period_end() {
        let steps = vec![
            json!({"period_end": "2023-01-01T00:05:00.0000000Z", "ghi": 1.0}),
            json!({"period_end": "2023-01-01T00:10:00.0000000+10", "ghi": 2.0}),
            json!({"ghi": 3.0}),
            json!({"period_end": "2023-01-01T00:20:00.0000000Z", "ghi": 4.0}),
        ];

        let built = build_rows(IngestMode::Flattened, datetime!(2023-01-01 00:03:00 UTC), key(), steps);

        let times: Vec<_> = built.rows.iter().map(|r| r.time).collect();
        assert_eq!(
            times,
            vec![datetime!(2023-01-01 00:05:00 UTC), datetime!(2023-01-01 00:20:00 UTC)]
        );
        assert_eq!(built.rows[1].data["ghi"], json!(4.0));
        assert_eq!(
            built.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(built.misalignment.is_none());
    }

    #[test]
    fn only_flattened_mode_skips_existing_rows() {
        assert!(IngestMode::from_flatten_flag(true).skips_existing());
        assert!(!IngestMode::from_flatten_flag(false).skips_existing());
    }
}
