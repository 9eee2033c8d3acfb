use time::OffsetDateTime;

/// One stored row of a quantity table.
///
/// `data` is either the whole array of forecast steps from one poll, or a
/// single step object when the poll was flattened on ingestion.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PollRecord {
    pub time: OffsetDateTime,
    pub resource: i64,
    pub data: serde_json::Value,
}
