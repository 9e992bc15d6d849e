use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::diff::RATE_CHANGE_COLUMNS;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{dataset}: override names unknown column {column}")]
    UnknownColumn { dataset: Dataset, column: String },
    #[error("{dataset}: column {column} is declared twice")]
    DuplicateColumn { dataset: Dataset, column: String },
}

/// The logical datasets carried by the artifact.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    ProviderAlerts,
    LegislativeUpdates,
    ServiceCategories,
    MasterData,
    RecentRateChanges,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::ProviderAlerts,
        Dataset::LegislativeUpdates,
        Dataset::ServiceCategories,
        Dataset::MasterData,
        Dataset::RecentRateChanges,
    ];

    /// Key of the dataset block in the artifact.
    pub fn key(self) -> &'static str {
        match self {
            Self::ProviderAlerts => "provider_alerts",
            Self::LegislativeUpdates => "legislative_updates",
            Self::ServiceCategories => "service_categories",
            Self::MasterData => "master_data",
            Self::RecentRateChanges => "recent_rate_changes",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dataset| dataset.key() == key)
    }

    /// Source table read by default, `None` for derived datasets.
    pub fn default_table(self) -> Option<&'static str> {
        match self {
            Self::ProviderAlerts => Some("provider_alerts"),
            Self::LegislativeUpdates => Some("bill_track_50"),
            Self::ServiceCategories => Some("service_category_list"),
            Self::MasterData => Some("master_data_sept_2"),
            Self::RecentRateChanges => None,
        }
    }

    fn kind_of(self, column: &str) -> ColumnKind {
        match self {
            Self::MasterData if is_modifier_code_column(column) => ColumnKind::MultiValue,
            Self::RecentRateChanges if column == "modifiers" => ColumnKind::MultiValue,
            _ => ColumnKind::Scalar,
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

const MODIFIER_DETAIL_COLUMNS: [&str; 4] = [
    "modifier_1_details",
    "modifier_2_details",
    "modifier_3_details",
    "modifier_4_details",
];

fn is_modifier_code_column(column: &str) -> bool {
    column.starts_with("modifier_") && !MODIFIER_DETAIL_COLUMNS.contains(&column)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// One value per cell.
    Scalar,
    /// A cell may hold one value or an array of values.
    MultiValue,
}

/// Column order and kinds for one dataset, fixed before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub(crate) dataset: Dataset,
    pub(crate) columns: IndexMap<String, ColumnKind>,
}

impl DatasetSchema {
    /// Resolve kinds for the declared columns of a dataset.
    ///
    /// Naming rules apply first, then `overrides`. An override for a column that is not
    /// declared is an error.
    pub fn resolve(
        dataset: Dataset,
        columns: &[String],
        overrides: &IndexMap<String, ColumnKind>,
    ) -> Result<Self, Error> {
        let mut resolved = IndexMap::with_capacity(columns.len());
        for column in columns {
            if resolved
                .insert(column.clone(), dataset.kind_of(column))
                .is_some()
            {
                return Err(Error::DuplicateColumn {
                    dataset,
                    column: column.clone(),
                });
            }
        }
        for (column, kind) in overrides {
            let Some(slot) = resolved.get_mut(column) else {
                return Err(Error::UnknownColumn {
                    dataset,
                    column: column.clone(),
                });
            };
            *slot = *kind;
        }
        Ok(Self {
            dataset,
            columns: resolved,
        })
    }

    /// Schema of the derived rate change dataset, in rate change field order.
    pub fn rate_changes(overrides: &IndexMap<String, ColumnKind>) -> Result<Self, Error> {
        let columns = RATE_CHANGE_COLUMNS.map(str::to_owned);
        Self::resolve(Dataset::RecentRateChanges, &columns, overrides)
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn kind(&self, column: &str) -> Option<ColumnKind> {
        self.columns.get(column).copied()
    }
}
