use serde_json::json;

use crate::{artifact, decode, tests};

#[tokio::test]
async fn empty_tables_produce_empty_blocks() {
    let output = tests::scratch_path("empty");
    let report = tests::pipeline(tests::seeded("").await, output.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(report.summary.total_master_data_records, 0);
    assert_eq!(report.summary.total_recent_rate_changes, 0);

    let metrics = artifact::read(&output).await.unwrap();
    for (name, block) in metrics.blocks() {
        assert_eq!(block.total_records, 0, "{name}");
        assert!(block.dictionaries.values().all(|d| d.is_empty()), "{name}");
        assert!(block.columns.values().all(|c| c.is_empty()), "{name}");
        assert!(decode::decode_rows(block).unwrap().is_empty(), "{name}");
    }
    assert_eq!(
        serde_json::to_value(&metrics.service_categories).unwrap(),
        json!({
            "m": {"id": {}, "categories": {}},
            "v": {"id": [], "categories": []},
            "c": ["id", "categories"],
            "total_records": 0
        })
    );
    assert_eq!(metrics.recent_rate_changes.column_order.len(), 13);
}
