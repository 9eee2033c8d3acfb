use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const SECONDS_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("timestamp has no fractional part: {0}")]
    MissingFraction(String),
    #[error("timestamp not in UTC: {0}")]
    NotUtc(String),
    #[error("invalid timestamp '{input}': {source}")]
    DateTime {
        input: String,
        #[source]
        source: time::error::Parse,
    },
}

/// Parse a `period_end` value as returned by the irradiance API.
///
/// The API writes `YYYY-MM-DDTHH:MM:SS.fffffffZ` with seven fractional digits,
/// which is not valid RFC 3339. Only the part before the last `.` is parsed;
/// the fraction is dropped and only its trailing `Z` is checked.
pub fn parse_period_end(input: &str) -> Result<OffsetDateTime, FormatError> {
    let (seconds, fraction) = input
        .rsplit_once('.')
        .ok_or_else(|| FormatError::MissingFraction(input.to_string()))?;

    if !fraction.ends_with('Z') {
        return Err(FormatError::NotUtc(input.to_string()));
    }

    let naive = PrimitiveDateTime::parse(seconds, SECONDS_FORMAT).map_err(|source| FormatError::DateTime {
        input: input.to_string(),
        source,
    })?;

    Ok(naive.assume_utc())
}

/// Write an instant in the API's `period_end` shape, with a zero fraction.
pub fn format_period_end(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.0000000Z",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}
