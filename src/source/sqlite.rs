use std::str::FromStr as _;

use serde_json::Value;
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _, sqlite::SqliteRow};
use tracing::{debug, error};

use super::{Error, Table, quote_identifier};
use crate::record::Row;

pub struct SqliteSource {
    pool: sqlx::SqlitePool,
}

impl SqliteSource {
    pub async fn open(url: &str) -> Result<Self, Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to parse sqlite url"))
            .map_err(Error::Sqlite)?;
        // in-memory databases live and die with their connection
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open sqlite db"))
            .map_err(Error::Sqlite)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub async fn fetch_table(&self, table: &str) -> Result<Table, Error> {
        let columns =
            sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Sqlite)?;
        if columns.is_empty() {
            return Err(Error::MissingTable(table.to_owned()));
        }
        let rows = sqlx::query(&format!("SELECT * FROM {}", quote_identifier(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Sqlite)?
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::Sqlite)?;
        debug!(table, rows = rows.len(), columns = columns.len(), "fetched sqlite table");
        Ok(Table { columns, rows })
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let storage = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_owned())
            }
        };
        let value = match storage.as_deref() {
            None => Value::Null,
            Some("INTEGER") => Value::from(row.try_get::<i64, _>(index)?),
            Some("REAL") => serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Some("BLOB") => Value::String(
                String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(index)?).into_owned(),
            ),
            Some(_) => Value::String(row.try_get_unchecked::<String, _>(index)?),
        };
        out.insert(column.name().to_owned(), value);
    }
    Ok(out)
}
