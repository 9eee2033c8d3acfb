use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
    chunks::TimeChunk,
    domain::{PollRecord, Quantity},
    resource::ResourceKey,
};

/// A single measurement pulled out of a flattened row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ActualRow {
    pub time: OffsetDateTime,
    pub value: Option<f64>,
}

/// Fetch `field` of every flattened row for one resource, both bounds inclusive.
pub async fn select_actuals(
    pool: &PgPool,
    quantity: Quantity,
    resource: ResourceKey,
    field: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<ActualRow>> {
    // Table names come from `Quantity` only, never from user input.
    let sql = format!(
        r#"
        SELECT
            time,
            (data->>$2)::float8 AS value
        FROM {table} AS t
        WHERE t.resource = $1
          AND time BETWEEN $3 AND $4
        ORDER BY time ASC
        "#,
        table = quantity.table_name()
    );

    let rows = sqlx::query_as::<_, ActualRow>(&sql)
        .bind(resource.get())
        .bind(field)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetch the stored polls of one resource that fall inside `chunk`, ascending.
pub async fn select_polls_in_chunk(
    pool: &PgPool,
    quantity: Quantity,
    resource: ResourceKey,
    chunk: &TimeChunk,
) -> Result<Vec<PollRecord>> {
    let sql = format!(
        r#"
        SELECT
            time,
            resource,
            data
        FROM {table} AS t
        WHERE t.resource = $1
          AND time >= $2
          AND (time < $3 OR ($4 AND time = $3))
        ORDER BY time ASC
        "#,
        table = quantity.table_name()
    );

    let rows = sqlx::query_as::<_, PollRecord>(&sql)
        .bind(resource.get())
        .bind(chunk.start)
        .bind(chunk.end)
        .bind(chunk.includes_end)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Original identifier recorded for `resource` at ingestion time, if any.
pub async fn registered_resource_id(pool: &PgPool, resource: ResourceKey) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT resource_id FROM resources WHERE resource = $1")
        .bind(resource.get())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id,)| id))
}
