//! Integration tests for retroboard-core infrastructure

use retroboard_core::{
    config_error, storage_error, ErrorContext, LogFormat, RetroboardConfig, RetroboardError,
};
use tempfile::tempdir;

#[test]
fn test_error_handling() {
    let error = storage_error!("disk full", "session_store");

    match &error {
        RetroboardError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "disk full");
            assert_eq!(context.component, "session_store");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Should not panic without a subscriber
    error.log();
    assert!(!error.is_recoverable());
    assert_eq!(error.error_id(), error.context().error_id);

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert_eq!(config_error.context().component, "test");
    assert_eq!(config_error.context().recovery_suggestions.len(), 1);
}

#[tokio::test]
async fn test_timeout_is_recoverable() {
    let error = retroboard_core::with_timeout(
        tokio::time::sleep(std::time::Duration::from_millis(200)),
        5,
        "update_all",
    )
    .await
    .unwrap_err();

    assert!(error.is_recoverable());
    assert_eq!(error.context().component, "async_utils");
    assert_eq!(
        error.context().metadata.get("timeout_ms").map(String::as_str),
        Some("5")
    );
    error.log();
}

#[test]
fn test_error_context_builder() {
    let context = ErrorContext::new("sessions")
        .with_operation("update_all")
        .with_metadata("board", "b1")
        .with_suggestion("Retry with fresh state");

    assert_eq!(context.operation.as_deref(), Some("update_all"));
    assert_eq!(context.metadata.get("board").map(String::as_str), Some("b1"));
    assert_eq!(context.recovery_suggestions.len(), 1);
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("retroboard.toml");

    let mut config = RetroboardConfig::default();
    config.server.port = 9191;
    config.storage.database_url = "memory".to_string();
    config.logging.format = LogFormat::Json;
    config.save_to_file(&path).unwrap();

    let loaded = RetroboardConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.port, 9191);
    assert!(loaded.storage.is_memory());
    assert_eq!(loaded.logging.format, LogFormat::Json);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_file_errors_carry_context() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");

    match RetroboardConfig::from_file(&missing) {
        Err(RetroboardError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("read_file"));
        }
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[server\nport = ").unwrap();
    match RetroboardConfig::from_file(&broken) {
        Err(RetroboardError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("parse_toml"));
        }
        other => panic!("Expected parse error, got {:?}", other.map(|_| ())),
    }
}
