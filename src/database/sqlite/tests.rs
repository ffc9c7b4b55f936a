use super::*;
use tempfile::TempDir;

#[tokio::test]
async fn database_creation_and_migration() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let database = Database::new(&db_path).await.expect("Failed to create database");

    assert_eq!(database.document_count().await.expect("count failed"), 0);
    assert_eq!(database.chunk_count().await.expect("count failed"), 0);
    assert_eq!(database.qa_log_count().await.expect("count failed"), 0);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let database = Database::new(&db_path).await.expect("Failed to create database");
    database
        .run_migrations()
        .await
        .expect("Second migration run should succeed");
}

#[tokio::test]
async fn initialize_from_config_dir_creates_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_dir = temp_dir.path().join("nested").join("config");

    let database = Database::initialize_from_config_dir(&config_dir)
        .await
        .expect("Failed to initialize database");

    assert!(config_dir.join("workmemo.db").exists());
    assert_eq!(database.document_count().await.expect("count failed"), 0);
}
