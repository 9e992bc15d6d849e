use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    artifact,
    schema::{ColumnKind, Dataset},
};

static IDENTIFIER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database url is not configured (set DATABASE_URL or database_url)")]
    MissingDatabaseUrl,
    #[error("unsupported database url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid table name for {dataset}: {name}")]
    InvalidTableName { dataset: Dataset, name: String },
    #[error("read config {}: {error}", path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("parse config {}: {error}", path.display())]
    Parse {
        path: PathBuf,
        error: serde_yaml::Error,
    },
}

/// Source tables of the fetched datasets.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SourceTables {
    pub provider_alerts: String,
    pub legislative_updates: String,
    pub service_categories: String,
    pub master_data: String,
}

impl Default for SourceTables {
    fn default() -> Self {
        let table = |dataset: Dataset| dataset.default_table().unwrap_or_default().to_owned();
        Self {
            provider_alerts: table(Dataset::ProviderAlerts),
            legislative_updates: table(Dataset::LegislativeUpdates),
            service_categories: table(Dataset::ServiceCategories),
            master_data: table(Dataset::MasterData),
        }
    }
}

impl SourceTables {
    pub fn get(&self, dataset: Dataset) -> Option<&str> {
        match dataset {
            Dataset::ProviderAlerts => Some(&self.provider_alerts),
            Dataset::LegislativeUpdates => Some(&self.legislative_updates),
            Dataset::ServiceCategories => Some(&self.service_categories),
            Dataset::MasterData => Some(&self.master_data),
            Dataset::RecentRateChanges => None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        Dataset::ALL
            .into_iter()
            .filter_map(|dataset| self.get(dataset))
            .map(str::to_owned)
            .collect()
    }
}

/// Per-dataset column kind overrides.
pub type ColumnOverrides = IndexMap<Dataset, IndexMap<String, ColumnKind>>;

/// Contents of the optional YAML config file.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub database_url: Option<String>,
    pub output: Option<PathBuf>,
    pub tables: SourceTables,
    pub columns: ColumnOverrides,
}

impl ConfigFile {
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| Error::Read {
                path: path.to_owned(),
                error,
            })?;
        serde_yaml::from_str(&text).map_err(|error| Error::Parse {
            path: path.to_owned(),
            error,
        })
    }
}

/// Validated pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub output: PathBuf,
    pub tables: SourceTables,
    pub columns: ColumnOverrides,
}

impl Config {
    /// Merge command line values over the file and validate the result.
    pub fn resolve(
        file: ConfigFile,
        database_url: Option<String>,
        output: Option<PathBuf>,
    ) -> Result<Self, Error> {
        let database_url = database_url
            .or(file.database_url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(Error::MissingDatabaseUrl)?;
        if !["sqlite:", "postgres://", "postgresql://"]
            .iter()
            .any(|scheme| database_url.starts_with(scheme))
        {
            let scheme = database_url
                .split_once(':')
                .map(|(scheme, _)| scheme)
                .unwrap_or(database_url.as_str());
            return Err(Error::UnsupportedScheme(scheme.to_owned()));
        }
        for dataset in Dataset::ALL {
            if let Some(name) = file.tables.get(dataset) {
                if !IDENTIFIER.is_match(name) {
                    return Err(Error::InvalidTableName {
                        dataset,
                        name: name.to_owned(),
                    });
                }
            }
        }
        Ok(Self {
            database_url,
            output: output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(artifact::DEFAULT_OUTPUT)),
            tables: file.tables,
            columns: file.columns,
        })
    }

    pub fn overrides(&self, dataset: Dataset) -> IndexMap<String, ColumnKind> {
        self.columns.get(&dataset).cloned().unwrap_or_default()
    }
}
