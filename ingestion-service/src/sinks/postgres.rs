use irradiance_client::{
    domain::{PollRecord, Quantity},
    ResourceKey,
};
use sqlx::{postgres::PgPool, types::Json, Postgres, QueryBuilder};

use crate::pipeline::{PipelineError, PollSink, Registration};

fn create_table_sql(quantity: Quantity) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         time TIMESTAMP(0) WITH TIME ZONE NOT NULL, \
         resource BIGINT NOT NULL, \
         data JSONB, \
         PRIMARY KEY (time, resource))",
        quantity.table_name()
    )
}

const CREATE_RESOURCES_SQL: &str = "CREATE TABLE IF NOT EXISTS resources (\
     resource BIGINT PRIMARY KEY, \
     resource_id TEXT NOT NULL)";

/// Create the table for `quantity` and the resource id side table.
pub async fn create_tables(pool: &PgPool, quantity: Quantity) -> Result<(), sqlx::Error> {
    sqlx::query(&create_table_sql(quantity)).execute(pool).await?;
    sqlx::query(CREATE_RESOURCES_SQL).execute(pool).await?;
    tracing::info!(table = quantity.table_name(), "tables ready");
    Ok(())
}

fn insert_builder<'a>(quantity: Quantity, batch: &'a [PollRecord], skip_existing: bool) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {} (time, resource, data) ",
        quantity.table_name()
    ));

    builder.push_values(batch, |mut b, row| {
        b.push_bind(row.time)
            .push_bind(row.resource)
            .push_bind(Json(&row.data));
    });

    if skip_existing {
        builder.push(" ON CONFLICT (time, resource) DO NOTHING");
    }

    builder
}

pub struct PgPollSink {
    pool: PgPool,
    batch_size: usize,
}

impl PgPollSink {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    async fn insert_batch(
        &self,
        quantity: Quantity,
        batch: &[PollRecord],
        skip_existing: bool,
    ) -> Result<u64, sqlx::Error> {
        let mut builder = insert_builder(quantity, batch, skip_existing);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl PollSink for PgPollSink {
    async fn write(
        &self,
        quantity: Quantity,
        rows: &[PollRecord],
        skip_existing: bool,
    ) -> Result<u64, PipelineError> {
        let mut inserted = 0;
        for batch in rows.chunks(self.batch_size) {
            inserted += self
                .insert_batch(quantity, batch, skip_existing)
                .await
                .map_err(|e| PipelineError::Sink(e.to_string()))?;
        }
        Ok(inserted)
    }

    async fn register_resource(
        &self,
        key: ResourceKey,
        resource_id: &str,
    ) -> Result<Registration, PipelineError> {
        let inserted = sqlx::query(
            "INSERT INTO resources (resource, resource_id) VALUES ($1, $2) ON CONFLICT (resource) DO NOTHING",
        )
        .bind(key.get())
        .bind(resource_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Sink(e.to_string()))?
        .rows_affected();

        if inserted > 0 {
            return Ok(Registration::New);
        }

        let existing = irradiance_client::db::registered_resource_id(&self.pool, key)
            .await
            .map_err(|e| PipelineError::Sink(format!("{e:#}")))?
            .unwrap_or_default();

        if existing == resource_id {
            Ok(Registration::Known)
        } else {
            Ok(Registration::Collision { existing })
        }
    }
}
