#![cfg(feature = "integration-tests")]

use chrono::Utc;
use common::domain::{
    Batch, BatchOutcome, BatchRepository, BatchStatus, DomainError, FinancialRecord,
    FinancialRecordRepository, RecordFilter, RecordKey,
};
use common::postgres::{
    PostgresBatchRepository, PostgresClient, PostgresFinancialRecordRepository, PostgresMigrator,
};
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (
    ContainerAsync<Postgres>,
    PostgresFinancialRecordRepository,
    PostgresBatchRepository,
) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let migrations_dir = format!(
        "{}/../../crates/finrisk_all_in_one/migrations/postgres",
        env!("CARGO_MANIFEST_DIR")
    );
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    PostgresMigrator::new(goose_path.to_string_lossy().to_string(), migrations_dir, dsn)
        .migrate()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(
        &host.to_string(),
        port,
        "postgres",
        "postgres",
        "postgres",
        5,
    )
    .expect("Failed to create client");

    (
        postgres,
        PostgresFinancialRecordRepository::new(client.clone()),
        PostgresBatchRepository::new(client),
    )
}

fn record(company: &str, period: &str, sector: &str) -> FinancialRecord {
    FinancialRecord::new(company, period)
        .with_field("industry_sector", json!(sector))
        .with_field("revenue", json!(1000))
        .stamped(format!("rec-{}-{}", company, period), Utc::now())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_conditional_insert_never_overwrites() {
    let (_container, records, _) = setup_test_db().await;

    let original = record("ACME", "2024-Q1", "Tech");
    records.insert_record(&original).await.unwrap();

    let mut replacement = record("ACME", "2024-Q1", "Energy");
    replacement.fields.insert("revenue".to_string(), json!(1));

    let err = records.insert_record(&replacement).await.unwrap_err();
    assert!(matches!(err, DomainError::RecordAlreadyExists { .. }));

    let stored = records
        .get_record(&RecordKey::new("ACME", "2024-Q1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.fields.get("revenue"), Some(&json!(1000)));
    assert_eq!(stored.industry_sector(), Some("Tech"));
    assert_eq!(stored.record_id.as_deref(), Some("rec-ACME-2024-Q1"));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_atomic_insert_rolls_back_on_conflict() {
    let (_container, records, _) = setup_test_db().await;

    records
        .insert_record(&record("B", "2024-Q1", "Tech"))
        .await
        .unwrap();

    let result = records
        .insert_records_atomically(&[
            record("A", "2024-Q1", "Tech"),
            record("B", "2024-Q1", "Tech"),
            record("C", "2024-Q1", "Tech"),
        ])
        .await;
    assert!(matches!(result, Err(DomainError::RecordAlreadyExists { .. })));

    for company in ["A", "C"] {
        assert!(records
            .get_record(&RecordKey::new(company, "2024-Q1"))
            .await
            .unwrap()
            .is_none());
    }

    records
        .insert_records_atomically(&[record("A", "2024-Q1", "Tech"), record("C", "2024-Q1", "Tech")])
        .await
        .unwrap();
    assert!(records
        .get_record(&RecordKey::new("C", "2024-Q1"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_find_records_routes_by_filter() {
    let (_container, records, _) = setup_test_db().await;

    records
        .insert_records_atomically(&[
            record("ACME", "2024-Q1", "Tech"),
            record("ACME", "2024-Q2", "Tech"),
            record("BOLT", "2024-Q1", "Energy"),
            record("CORE", "2024-Q1", "Tech"),
        ])
        .await
        .unwrap();

    let by_company = records
        .find_records(&RecordFilter {
            company_id: Some("ACME".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_company.len(), 2);

    let by_company_and_period = records
        .find_records(&RecordFilter {
            company_id: Some("ACME".to_string()),
            reporting_period: Some("2024-Q2".to_string()),
            industry_sector: Some("Energy".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(by_company_and_period.len(), 1);

    let by_sector_and_period = records
        .find_records(&RecordFilter {
            reporting_period: Some("2024-Q1".to_string()),
            industry_sector: Some("Tech".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let companies: Vec<_> = by_sector_and_period
        .iter()
        .map(|r| r.company_id.as_str())
        .collect();
    assert_eq!(companies, vec!["ACME", "CORE"]);

    let by_period = records
        .find_records(&RecordFilter {
            reporting_period: Some("2024-Q1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_period.len(), 3);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_batch_lifecycle() {
    let (_container, _, batches) = setup_test_db().await;

    let batch = Batch::processing("batch-1".to_string(), 3, Utc::now());
    batches.create_batch(&batch).await.unwrap();

    assert!(matches!(
        batches.create_batch(&batch).await,
        Err(DomainError::BatchAlreadyExists(_))
    ));

    let stored = batches.get_batch("batch-1").await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Processing);
    assert_eq!(stored.total_records, 3);

    let updated = batches
        .complete_batch("batch-1", BatchOutcome::escalated(3))
        .await
        .unwrap();
    assert!(updated);

    let stored = batches.get_batch("batch-1").await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Completed);
    assert_eq!(stored.successful_records, 0);
    assert_eq!(stored.failed_records, 3);

    // Completed rows are final
    assert!(!batches
        .complete_batch("batch-1", BatchOutcome::committed(3))
        .await
        .unwrap());
    let stored = batches.get_batch("batch-1").await.unwrap().unwrap();
    assert_eq!(stored.failed_records, 3);

    assert!(!batches
        .complete_batch("unknown", BatchOutcome::committed(1))
        .await
        .unwrap());
    assert!(batches.get_batch("unknown").await.unwrap().is_none());
}
