//! Query layer over the relational store holding the source tables.

use crate::record::Row;

pub mod postgres;
pub mod sqlite;

/// Rows of one table with the columns the database declares for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

pub trait Client {
    type Error;

    /// Fetch every row and column of `table`.
    ///
    /// A table without rows is not an error.
    fn fetch_table(&self, table: &str) -> impl Future<Output = Result<Table, Self::Error>>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(sqlx::Error),
    #[error("postgres error: {0}")]
    Postgres(sqlx::Error),
    #[error("decode row of {table}: {error}")]
    Decode {
        table: String,
        error: serde_json::Error,
    },
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

/// Database picked from the scheme of a connection URL.
pub enum Database {
    Sqlite(sqlite::SqliteSource),
    Postgres(postgres::PostgresSource),
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        if url.starts_with("sqlite:") {
            Ok(Self::Sqlite(sqlite::SqliteSource::open(url).await?))
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres(postgres::PostgresSource::open(url).await?))
        } else {
            Err(Error::UnsupportedUrl(url.to_owned()))
        }
    }
}

impl Client for Database {
    type Error = Error;

    async fn fetch_table(&self, table: &str) -> Result<Table, Self::Error> {
        match self {
            Self::Sqlite(source) => source.fetch_table(table).await,
            Self::Postgres(source) => source.fetch_table(table).await,
        }
    }
}

/// Double-quoted SQL identifier.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
