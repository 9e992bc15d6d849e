use std::str::FromStr as _;

use tracing::{debug, error};

use super::{Error, Table, quote_identifier};
use crate::record::Row;

pub struct PostgresSource {
    pool: sqlx::PgPool,
}

impl PostgresSource {
    pub async fn open(url: &str) -> Result<Self, Error> {
        let options = sqlx::postgres::PgConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, "Failed to parse postgres url"))
            .map_err(Error::Postgres)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, "Failed to connect to postgres"))
            .map_err(Error::Postgres)?;
        Ok(Self { pool })
    }

    pub async fn fetch_table(&self, table: &str) -> Result<Table, Error> {
        let columns = sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
        "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Postgres)?;
        if columns.is_empty() {
            return Err(Error::MissingTable(table.to_owned()));
        }
        // json (not jsonb) keeps the column order of the row
        let rows = sqlx::query_scalar::<_, String>(&format!(
            "SELECT row_to_json(t)::text FROM {} AS t",
            quote_identifier(table)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Postgres)?
        .iter()
        .map(|row| serde_json::from_str::<Row>(row))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| Error::Decode {
            table: table.to_owned(),
            error,
        })?;
        debug!(table, rows = rows.len(), columns = columns.len(), "fetched postgres table");
        Ok(Table { columns, rows })
    }
}
