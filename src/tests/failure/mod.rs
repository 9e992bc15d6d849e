use crate::{pipeline::PipelineError, source, tests};

#[tokio::test]
async fn missing_table_aborts_without_touching_artifact() {
    let output = tests::scratch_path("failure");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    std::fs::write(&output, b"previous artifact").unwrap();

    let db = tests::seeded("").await;
    sqlx::query("DROP TABLE service_category_list")
        .execute(db.pool())
        .await
        .unwrap();
    let err = tests::pipeline(db, output.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        PipelineError::Fetch {
            table,
            error: source::Error::MissingTable(_),
        } if table == "service_category_list"
    ));
    assert_eq!(std::fs::read(&output).unwrap(), b"previous artifact");
}
