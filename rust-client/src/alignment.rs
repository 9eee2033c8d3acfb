use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::{
    domain::PollRecord,
    period_end::{parse_period_end, FormatError},
};

/// Nominal cadence of the stored forecast steps.
pub const GRID_STEP: Duration = Duration::minutes(5);

/// ISO 8601 form of [`GRID_STEP`], as requested from the API.
pub const GRID_PERIOD: &str = "PT5M";

#[derive(thiserror::Error, Debug)]
pub enum AlignmentError {
    #[error("poll data is not an array of steps")]
    NotAnArray,
    #[error("step {index} has no period_end")]
    MissingPeriodEnd { index: usize },
    #[error("step {index} has an unreadable period_end: {source}")]
    BadPeriodEnd {
        index: usize,
        #[source]
        source: FormatError,
    },
    #[error("step {index} is misaligned: expected {expected}, got {actual}")]
    Misaligned {
        index: usize,
        expected: OffsetDateTime,
        actual: OffsetDateTime,
    },
}

impl AlignmentError {
    /// Index of the offending step, when the error concerns a single step.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::NotAnArray => None,
            Self::MissingPeriodEnd { index }
            | Self::BadPeriodEnd { index, .. }
            | Self::Misaligned { index, .. } => Some(*index),
        }
    }
}

/// A stored poll mapped back onto the fixed grid: the anchor slot followed by
/// one value per step. Step `i` belongs to `anchor + (i + 1) * step`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSeries {
    pub anchor: OffsetDateTime,
    pub values: Vec<Option<f64>>,
}

/// Round `ts` down to the previous multiple of `step` (seconds and
/// sub-seconds dropped).
pub fn floor_to_grid(ts: OffsetDateTime, step: Duration) -> OffsetDateTime {
    let step_secs = step.whole_seconds().max(1);
    let into_step = ts.unix_timestamp().rem_euclid(step_secs);
    ts - Duration::seconds(into_step) - Duration::nanoseconds(i64::from(ts.nanosecond()))
}

/// Grid slot step `index` of a poll anchored at `anchor` is expected to end at.
pub fn expected_period_end(anchor: OffsetDateTime, index: usize, step: Duration) -> OffsetDateTime {
    let slots = i32::try_from(index + 1).unwrap_or(i32::MAX);
    floor_to_grid(anchor, step) + step * slots
}

/// Check every step of `steps` against the grid derived from `time` and pull
/// `field` out of each of them.
pub fn align_steps(
    time: OffsetDateTime,
    steps: &[Value],
    field: &str,
    step: Duration,
) -> Result<GridSeries, AlignmentError> {
    let anchor = floor_to_grid(time, step);

    let mut values = Vec::with_capacity(steps.len());
    for (index, data) in steps.iter().enumerate() {
        let declared = data
            .get("period_end")
            .and_then(Value::as_str)
            .ok_or(AlignmentError::MissingPeriodEnd { index })?;
        let actual =
            parse_period_end(declared).map_err(|source| AlignmentError::BadPeriodEnd { index, source })?;

        let expected = expected_period_end(anchor, index, step);
        if actual != expected {
            return Err(AlignmentError::Misaligned {
                index,
                expected,
                actual,
            });
        }

        values.push(data.get(field).and_then(Value::as_f64));
    }

    Ok(GridSeries { anchor, values })
}

/// Grid-align an unflattened poll on the default 5 minute cadence.
pub fn extract_series(record: &PollRecord, field: &str) -> Result<GridSeries, AlignmentError> {
    let steps = record.data.as_array().ok_or(AlignmentError::NotAnArray)?;
    align_steps(record.time, steps, field, GRID_STEP)
}
