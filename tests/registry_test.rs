//! Integration tests for registering real SQLite pools by name.

use tempfile::{NamedTempFile, TempPath};
use txnest::{ConnectionConfig, DatabaseType, DbError, PoolOptions, ResourceRegistry};

fn sqlite_config(name: &str) -> (ConnectionConfig, TempPath) {
    let db_path = NamedTempFile::new().unwrap().into_temp_path();
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let config = ConnectionConfig::new(name, url, PoolOptions::default()).unwrap();
    (config, db_path)
}

#[tokio::test]
async fn test_register_database_reports_server() {
    let (config, _db) = sqlite_config("main");
    let registry: ResourceRegistry = ResourceRegistry::new();

    let info = registry.register_database(&config).await.unwrap();
    assert_eq!(info.name, "main");
    assert_eq!(info.database_type, DatabaseType::SQLite);
    assert!(info.server_version.unwrap().starts_with('3'));
    assert_eq!(registry.names().await, vec!["main"]);

    let provider = registry.provider("main").await.unwrap();
    provider.ping().await.unwrap();
    registry.close_all().await;
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let (config, _db) = sqlite_config("dup");
    let (other, _other_db) = sqlite_config("dup");
    let registry: ResourceRegistry = ResourceRegistry::new();

    registry.register_database(&config).await.unwrap();
    let err = registry.register_database(&other).await.unwrap_err();
    assert!(matches!(err, DbError::NameConflict { ref name } if name == "dup"));
    assert_eq!(registry.len().await, 1);
    registry.close_all().await;
}

#[tokio::test]
async fn test_concurrent_registration_has_one_winner() {
    let registry: ResourceRegistry = ResourceRegistry::new();
    let (first, _a) = sqlite_config("race");
    let (second, _b) = sqlite_config("race");

    let (r1, r2) = tokio::join!(
        registry.register_database(&first),
        registry.register_database(&second)
    );
    assert!(r1.is_ok() ^ r2.is_ok());
    let err = r1.err().or(r2.err()).unwrap();
    assert!(matches!(err, DbError::NameConflict { .. }));
    assert_eq!(registry.len().await, 1);
    registry.close_all().await;
}

#[tokio::test]
async fn test_failed_connection_is_not_registered() {
    let config = ConnectionConfig::new(
        "broken",
        "sqlite:/nonexistent-dir/txnest/missing.db",
        PoolOptions::default(),
    )
    .unwrap();
    let registry: ResourceRegistry = ResourceRegistry::new();

    let err = registry.register_database(&config).await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(!registry.contains("broken").await);
}

#[tokio::test]
async fn test_lookup_missing_name() {
    let registry: ResourceRegistry = ResourceRegistry::new();
    assert!(matches!(
        registry.lookup("missing").await,
        Err(DbError::NameNotFound { .. })
    ));
    assert!(matches!(
        registry.provider("missing").await,
        Err(DbError::NameNotFound { .. })
    ));
}

#[tokio::test]
async fn test_unregistered_resource_keeps_working() {
    let (config, _db) = sqlite_config("detached");
    let registry: ResourceRegistry = ResourceRegistry::new();
    registry.register_database(&config).await.unwrap();

    let mut provider = registry.provider("detached").await.unwrap();
    let resource = registry.unregister("detached").await.unwrap();
    assert!(registry.is_empty().await);

    provider.enter_transaction().await.unwrap();
    provider.rollback().await.unwrap();
    resource.pool().close().await;
}

#[tokio::test]
async fn test_close_all_closes_pools() {
    let (a, _a) = sqlite_config("a");
    let (b, _b) = sqlite_config("b");
    let registry: ResourceRegistry = ResourceRegistry::new();
    registry.register_database(&a).await.unwrap();
    registry.register_database(&b).await.unwrap();

    let provider = registry.provider("a").await.unwrap();
    registry.close_all().await;

    assert!(registry.is_empty().await);
    assert!(provider.stats().closed);
    assert!(provider.ping().await.is_err());
}
