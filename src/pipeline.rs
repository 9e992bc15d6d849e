//! Pipeline orchestration
//!
//! Fetches the source tables, derives rate changes, encodes every dataset and writes the
//! compressed artifact. All algorithmic work lives in [`crate::diff`] and [`crate::encode`].

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use futures::try_join;
use tracing::{error, info};

use crate::{
    artifact::{self, DATA_VERSION, EnhancedMetrics, Metadata, Summary},
    config::Config,
    diff::{self, RateChange},
    encode::{self, DatasetBlock},
    progress::{PipelinePhase, ProgressReporter},
    record::{self, Row},
    schema::{self, Dataset, DatasetSchema},
    source::{self, Table},
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E> {
    #[error("fetch {table}: {error}")]
    Fetch { table: String, error: E },
    #[error("schema: {0}")]
    Schema(schema::Error),
    #[error("{0}")]
    Artifact(artifact::Error),
}

/// Source tables of one run.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub provider_alerts: Table,
    pub legislative_updates: Table,
    pub service_categories: Table,
    pub master_data: Table,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct Report {
    pub path: PathBuf,
    pub json_bytes: usize,
    pub compressed_bytes: usize,
    pub compression_ratio: String,
    pub summary: Summary,
}

pub struct Pipeline<C> {
    pub client: C,
    pub config: Config,
    pub reporter: Arc<dyn ProgressReporter>,
}

fn count_flagged(rows: &[Row]) -> usize {
    rows.iter()
        .filter(|row| record::is_flagged(row.get("is_new")))
        .count()
}

impl<C: source::Client> Pipeline<C>
where
    C::Error: std::error::Error,
{
    async fn fetch(&self, dataset: Dataset) -> Result<Table, PipelineError<C::Error>> {
        let table = self
            .config
            .tables
            .get(dataset)
            .or(dataset.default_table())
            .unwrap_or(dataset.key());
        let fetched = self
            .client
            .fetch_table(table)
            .await
            .inspect_err(|error| error!(%error, table, "failed to fetch source table"))
            .map_err(|error| PipelineError::Fetch {
                table: table.to_owned(),
                error,
            })?;
        info!(table, rows = fetched.rows.len(), "fetched source table");
        Ok(fetched)
    }

    /// Fetch all source tables. The first failure aborts the others.
    pub async fn fetch_all(&self) -> Result<Sources, PipelineError<C::Error>> {
        let (provider_alerts, legislative_updates, service_categories, master_data) = try_join!(
            self.fetch(Dataset::ProviderAlerts),
            self.fetch(Dataset::LegislativeUpdates),
            self.fetch(Dataset::ServiceCategories),
            self.fetch(Dataset::MasterData),
        )?;
        Ok(Sources {
            provider_alerts,
            legislative_updates,
            service_categories,
            master_data,
        })
    }

    fn encode(&self, dataset: Dataset, table: &Table) -> Result<DatasetBlock, schema::Error> {
        let schema = DatasetSchema::resolve(dataset, &table.columns, &self.config.overrides(dataset))?;
        let block = encode::encode_dataset(&table.rows, &schema);
        self.reporter.dataset_encoded(dataset.key(), block.total_records);
        Ok(block)
    }

    /// Assemble the artifact from fetched sources and derived rate changes.
    pub fn build(
        &self,
        sources: &Sources,
        changes: &[RateChange],
        generated_at: DateTime<Utc>,
    ) -> Result<EnhancedMetrics, schema::Error> {
        let change_rows = changes.iter().map(Row::from).collect::<Vec<_>>();
        let change_schema =
            DatasetSchema::rate_changes(&self.config.overrides(Dataset::RecentRateChanges))?;
        let recent_rate_changes = encode::encode_dataset(&change_rows, &change_schema);
        self.reporter
            .dataset_encoded(Dataset::RecentRateChanges.key(), change_rows.len());

        let timestamp = artifact::timestamp(generated_at);
        let summary = Summary {
            total_provider_alerts: sources.provider_alerts.rows.len(),
            total_legislative_updates: sources.legislative_updates.rows.len(),
            total_service_categories: sources.service_categories.rows.len(),
            total_master_data_records: sources.master_data.rows.len(),
            total_recent_rate_changes: changes.len(),
            new_provider_alerts: count_flagged(&sources.provider_alerts.rows),
            new_legislative_updates: count_flagged(&sources.legislative_updates.rows),
            last_updated: timestamp,
            data_version: DATA_VERSION.to_owned(),
        };
        Ok(EnhancedMetrics {
            provider_alerts: self.encode(Dataset::ProviderAlerts, &sources.provider_alerts)?,
            legislative_updates: self
                .encode(Dataset::LegislativeUpdates, &sources.legislative_updates)?,
            service_categories: self
                .encode(Dataset::ServiceCategories, &sources.service_categories)?,
            master_data: self.encode(Dataset::MasterData, &sources.master_data)?,
            recent_rate_changes,
            summary,
            metadata: Metadata::new(generated_at, self.config.tables.names()),
        })
    }

    async fn execute(&self) -> Result<Report, PipelineError<C::Error>> {
        self.reporter.set_phase(PipelinePhase::Fetching);
        let sources = self.fetch_all().await?;

        self.reporter.set_phase(PipelinePhase::ExtractingChanges);
        let changes = diff::extract_rate_changes(&sources.master_data.rows);
        info!(count = changes.len(), "extracted rate changes");

        self.reporter.set_phase(PipelinePhase::Encoding);
        let metrics = self
            .build(&sources, &changes, Utc::now())
            .map_err(PipelineError::Schema)?;
        drop(sources);

        self.reporter.set_phase(PipelinePhase::Compressing);
        let json = artifact::to_json(&metrics).map_err(PipelineError::Artifact)?;
        let json_bytes = json.len();
        let compressed = blocking::unblock(move || artifact::gzip(&json))
            .await
            .map_err(PipelineError::Artifact)?;

        self.reporter.set_phase(PipelinePhase::Writing);
        artifact::write(&self.config.output, &compressed)
            .await
            .map_err(PipelineError::Artifact)?;

        let compression_ratio = artifact::compression_ratio(json_bytes, compressed.len());
        info!(
            path = %self.config.output.display(),
            json_bytes,
            compressed_bytes = compressed.len(),
            compression_ratio = %compression_ratio,
            "wrote enhanced metrics"
        );
        self.reporter.log_info(&format!(
            "{}: {json_bytes} bytes -> {} bytes ({compression_ratio} smaller)",
            self.config.output.display(),
            compressed.len()
        ));
        Ok(Report {
            path: self.config.output.clone(),
            json_bytes,
            compressed_bytes: compressed.len(),
            compression_ratio,
            summary: metrics.summary,
        })
    }

    /// Run the whole pipeline. Nothing is written unless every step before the write succeeds.
    pub async fn run(&self) -> Result<Report, PipelineError<C::Error>> {
        let result = self.execute().await;
        match &result {
            Ok(_) => self.reporter.set_phase(PipelinePhase::Completed),
            Err(error) => self
                .reporter
                .set_phase(PipelinePhase::Failed(error.to_string())),
        }
        self.reporter.finish();
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::{config::ConfigFile, progress::NullReporter};

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryFailed;

    struct MemoryClient {
        tables: HashMap<String, Table>,
    }

    impl source::Client for MemoryClient {
        type Error = QueryFailed;

        async fn fetch_table(&self, table: &str) -> Result<Table, Self::Error> {
            self.tables.get(table).cloned().ok_or(QueryFailed)
        }
    }

    fn table(columns: &[&str], rows: Vec<serde_json::Value>) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.as_object().cloned().unwrap())
                .collect(),
        }
    }

    fn pipeline(tables: HashMap<String, Table>, output: PathBuf) -> Pipeline<MemoryClient> {
        Pipeline {
            client: MemoryClient { tables },
            config: Config::resolve(
                ConfigFile::default(),
                Some("sqlite::memory:".into()),
                Some(output),
            )
            .unwrap(),
            reporter: Arc::new(NullReporter),
        }
    }

    fn scenario() -> HashMap<String, Table> {
        HashMap::from([
            (
                "provider_alerts".to_string(),
                table(
                    &["subject", "is_new"],
                    vec![
                        json!({"subject": "Ohio update", "is_new": "yes"}),
                        json!({"subject": "Texas update", "is_new": "no"}),
                    ],
                ),
            ),
            (
                "bill_track_50".to_string(),
                table(&["title", "is_new"], vec![json!({"title": "HB 1", "is_new": "yes"})]),
            ),
            ("service_category_list".to_string(), table(&["categories"], vec![])),
            (
                "master_data_sept_2".to_string(),
                table(
                    &["service_code", "state_name", "rate", "rate_effective_date", "modifier_1"],
                    vec![
                        json!({"service_code": "T1019", "state_name": "OH", "rate": "$10.00", "rate_effective_date": "2023-01-01", "modifier_1": "U1"}),
                        json!({"service_code": "T1019", "state_name": "OH", "rate": "$10.00", "rate_effective_date": "2023-06-01", "modifier_1": "U1"}),
                        json!({"service_code": "T1019", "state_name": "OH", "rate": "$12.50", "rate_effective_date": "2024-01-01", "modifier_1": null}),
                    ],
                ),
            ),
        ])
    }

    #[tokio::test]
    async fn build_assembles_every_dataset() {
        let pipeline = pipeline(scenario(), PathBuf::from("unused.json.gz"));
        let sources = pipeline.fetch_all().await.unwrap();
        let changes = diff::extract_rate_changes(&sources.master_data.rows);
        let metrics = pipeline.build(&sources, &changes, Utc::now()).unwrap();

        assert_eq!(metrics.summary.total_provider_alerts, 2);
        assert_eq!(metrics.summary.new_provider_alerts, 1);
        assert_eq!(metrics.summary.new_legislative_updates, 1);
        assert_eq!(metrics.summary.total_master_data_records, 3);
        assert_eq!(metrics.summary.total_recent_rate_changes, 1);
        assert_eq!(metrics.summary.data_version, "2.0");
        assert_eq!(metrics.metadata.compression_ratio, "N/A");
        assert_eq!(
            metrics.metadata.tables,
            [
                "provider_alerts",
                "bill_track_50",
                "service_category_list",
                "master_data_sept_2"
            ]
        );
        assert_eq!(metrics.service_categories.total_records, 0);
        for (_, block) in metrics.blocks() {
            encode::decode::validate(block).unwrap();
        }
        let changes = encode::decode::decode_rows(&metrics.recent_rate_changes).unwrap();
        assert_eq!(changes[0]["old_rate"], json!("$10.00"));
        assert_eq!(changes[0]["new_rate"], json!("$12.50"));
        assert_eq!(changes[0]["percentage_change"], json!("25.00"));
        assert_eq!(changes[0]["modifiers"], json!(["U1"]));
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let output = std::env::temp_dir().join(format!(
            "rate-metrics-failed-{}.json.gz",
            std::process::id()
        ));
        let mut tables = scenario();
        tables.remove("bill_track_50");
        let err = pipeline(tables, output.clone()).run().await.unwrap_err();
        assert!(matches!(&err, PipelineError::Fetch { table, .. } if table == "bill_track_50"));
        assert!(!output.exists());
    }
}
