use std::{path::PathBuf, sync::Arc};

use serde_json::json;
use sqlx::prelude::FromRow;

use crate::{
    artifact,
    config::{Config, ConfigFile},
    decode,
    pipeline::Pipeline,
    progress::NullReporter,
    source::{Database, sqlite::SqliteSource},
};

mod empty;
mod failure;

const SCHEMA: &str = r#"
    CREATE TABLE provider_alerts(
        id INTEGER PRIMARY KEY,
        subject TEXT,
        state TEXT,
        is_new TEXT
    );

    CREATE TABLE bill_track_50(
        id INTEGER PRIMARY KEY,
        title TEXT,
        state TEXT,
        is_new TEXT
    );

    CREATE TABLE service_category_list(
        id INTEGER PRIMARY KEY,
        categories TEXT
    );

    CREATE TABLE master_data_sept_2(
        id INTEGER PRIMARY KEY,
        service_code TEXT,
        service_description TEXT,
        state_name TEXT,
        service_category TEXT,
        rate TEXT,
        rate_effective_date TEXT,
        modifier_1 TEXT,
        modifier_1_details TEXT,
        modifier_2 TEXT,
        program TEXT,
        duration_unit TEXT
    );
"#;

pub(crate) async fn seeded(seed: &str) -> SqliteSource {
    let source = SqliteSource::open("sqlite::memory:").await.unwrap();
    sqlx::query(SCHEMA).execute(source.pool()).await.unwrap();
    if !seed.is_empty() {
        sqlx::query(seed).execute(source.pool()).await.unwrap();
    }
    source
}

pub(crate) fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rate-metrics-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("data").join("enhanced_metrics_detailed.json.gz")
}

pub(crate) fn pipeline(source: SqliteSource, output: PathBuf) -> Pipeline<Database> {
    Pipeline {
        client: Database::Sqlite(source),
        config: Config::resolve(
            ConfigFile::default(),
            Some("sqlite::memory:".into()),
            Some(output),
        )
        .unwrap(),
        reporter: Arc::new(NullReporter),
    }
}

const SEED: &str = r#"
    INSERT INTO provider_alerts(subject, state, is_new) VALUES
        ('Ohio personal care update', 'OH', 'yes'),
        ('Texas waiver notice', 'TX', 'no'),
        ('Ohio dental notice', 'OH', 'YES');

    INSERT INTO bill_track_50(title, state, is_new) VALUES
        ('HB 33 budget', 'OH', 'no');

    INSERT INTO service_category_list(categories) VALUES
        ('HCBS'), ('Dental'), ('HCBS');

    INSERT INTO master_data_sept_2(
        service_code, service_description, state_name, service_category, rate,
        rate_effective_date, modifier_1, modifier_1_details, modifier_2, program, duration_unit
    ) VALUES
        ('T1019', 'Personal care', 'OH', 'HCBS', '$12.50', '2024-01-01', NULL, NULL, NULL, 'PASSPORT', '15 minutes'),
        ('T1019', 'Personal care', 'OH', 'HCBS', '$10.00', '2023-01-01', 'U1', 'Agency', NULL, 'PASSPORT', '15 minutes'),
        ('S5125', 'Attendant care', 'TX', 'HCBS', '$4.00', '2023-03-01', 'U2', NULL, 'GT', 'STAR+PLUS', '15 minutes'),
        ('T1019', 'Personal care', 'OH', 'HCBS', '$10.00', '2023-06-01', 'U1', 'Agency', 'GT', 'PASSPORT', '15 minutes'),
        ('S5125', 'Attendant care', 'TX', 'HCBS', '$5.00', '2024-03-01', 'U2', NULL, NULL, 'STAR+PLUS', '15 minutes');
"#;

#[derive(FromRow, Debug, PartialEq, Eq)]
struct MasterRow {
    service_code: String,
    rate: String,
    modifier_1: Option<String>,
}

#[tokio::test]
async fn test() {
    let source = seeded(SEED).await;
    let master_rows =
        sqlx::query_as::<_, MasterRow>("SELECT service_code, rate, modifier_1 FROM master_data_sept_2 ORDER BY id")
            .fetch_all(source.pool())
            .await
            .unwrap();
    let output = scratch_path("scenario");
    let report = pipeline(source, output.clone()).run().await.unwrap();

    assert_eq!(report.path, output);
    assert!(report.compressed_bytes > 0);
    assert!(report.compression_ratio.ends_with('%'));

    let metrics = artifact::read(&output).await.unwrap();
    assert_eq!(metrics.summary, report.summary);
    assert_eq!(metrics.summary.total_provider_alerts, 3);
    assert_eq!(metrics.summary.new_provider_alerts, 2);
    assert_eq!(metrics.summary.total_legislative_updates, 1);
    assert_eq!(metrics.summary.new_legislative_updates, 0);
    assert_eq!(metrics.summary.total_service_categories, 3);
    assert_eq!(metrics.summary.total_master_data_records, 5);
    assert_eq!(metrics.summary.total_recent_rate_changes, 2);
    assert_eq!(metrics.metadata.compression_ratio, artifact::COMPRESSION_RATIO_UNKNOWN);
    assert_eq!(metrics.metadata.version, "2.0");

    for (name, block) in metrics.blocks() {
        decode::validate(block).unwrap_or_else(|e| panic!("{name}: {e}"));
    }

    // per-dataset dictionaries
    let categories = &metrics.service_categories;
    assert_eq!(
        categories.dictionaries["categories"].iter().collect::<Vec<_>>(),
        [("HCBS", 0), ("Dental", 1)]
    );
    assert_eq!(
        serde_json::to_value(&categories.columns["categories"]).unwrap(),
        json!([0, 1, 0])
    );

    let master = decode::decode_rows(&metrics.master_data).unwrap();
    assert_eq!(
        metrics.master_data.column_order.first().map(String::as_str),
        Some("id")
    );
    let decoded = master
        .iter()
        .map(|row| MasterRow {
            service_code: row["service_code"].as_str().unwrap().to_owned(),
            rate: row["rate"].as_str().unwrap().to_owned(),
            modifier_1: row["modifier_1"].as_str().map(str::to_owned),
        })
        .collect::<Vec<_>>();
    assert_eq!(decoded, master_rows);
    assert_eq!(master[0]["id"], json!("1"));

    let changes = decode::decode_rows(&metrics.recent_rate_changes).unwrap();
    assert_eq!(
        serde_json::to_value(&changes).unwrap(),
        json!([
            {
                "service_code": "T1019",
                "service_description": "Personal care",
                "state_name": "OH",
                "service_category": "HCBS",
                "old_rate": "$10.00",
                "new_rate": "$12.50",
                "percentage_change": "25.00",
                "effective_date": "2024-01-01",
                "modifiers": ["U1", "GT"],
                "provider_type": null,
                "program": "PASSPORT",
                "location_region": null,
                "duration_unit": "15 minutes"
            },
            {
                "service_code": "S5125",
                "service_description": "Attendant care",
                "state_name": "TX",
                "service_category": "HCBS",
                "old_rate": "$4.00",
                "new_rate": "$5.00",
                "percentage_change": "25.00",
                "effective_date": "2024-03-01",
                "modifiers": ["U2", "GT"],
                "provider_type": null,
                "program": "STAR+PLUS",
                "location_region": null,
                "duration_unit": "15 minutes"
            }
        ])
    );
}

#[tokio::test]
async fn rerun_overwrites_artifact() {
    let output = scratch_path("rerun");
    pipeline(seeded(SEED).await, output.clone())
        .run()
        .await
        .unwrap();
    let first = artifact::read(&output).await.unwrap();

    let source = seeded(SEED).await;
    sqlx::query("DELETE FROM provider_alerts")
        .execute(source.pool())
        .await
        .unwrap();
    pipeline(source, output.clone()).run().await.unwrap();
    let second = artifact::read(&output).await.unwrap();

    assert_eq!(first.summary.total_provider_alerts, 3);
    assert_eq!(second.summary.total_provider_alerts, 0);
    assert_eq!(second.provider_alerts.total_records, 0);
    assert_eq!(second.master_data, first.master_data);
}
