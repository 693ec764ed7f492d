//! Integration tests for the database wrapper and the membership repository
//! against real SQLite databases (in-memory and on disk).

use biogate_core::{DeviceSettings, SettingsMap};
use biogate_storage::models::{NewAttendance, NewMember};
use biogate_storage::{Database, DatabaseConfig, MembershipRepository, SqliteMembershipRepository};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_in_memory_database() {
    let db = Database::in_memory().await.unwrap();
    db.health_check().await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();

    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    for table in ["members", "attendance", "settings"] {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                .bind(table)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(result.0, 1, "table {} missing", table);
    }

    db.close().await;
}

/// Every `members` column is read back into `Member`.
#[tokio::test]
async fn test_member_columns_match_model() {
    let db = Database::in_memory().await.unwrap();

    let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('members')")
        .fetch_all(db.pool())
        .await
        .unwrap();
    let columns: Vec<String> = columns.into_iter().map(|(name,)| name).collect();

    assert_eq!(
        columns,
        [
            "id",
            "name",
            "email",
            "phone",
            "plan_name",
            "start_date",
            "expiry_date",
            "status",
            "payment_status",
            "biometric_id",
            "created_at",
        ]
    );
}

#[tokio::test]
async fn test_file_database_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("biogate.db");
    let path = path.to_string_lossy().to_string();

    {
        let db = Database::new(DatabaseConfig::new(path.clone())).await.unwrap();
        let repo = SqliteMembershipRepository::new(db.pool().clone());

        let settings = DeviceSettings::new("10.0.0.9").port(4371).unlock_seconds(5);
        repo.update_settings(&settings.to_settings()).await.unwrap();
        repo.create_member(&NewMember::new("Persisted").biometric_id("12"))
            .await
            .unwrap();
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::new(path)).await.unwrap();
    let repo = SqliteMembershipRepository::new(db.pool().clone());

    let settings = DeviceSettings::from_settings(&repo.get_settings().await.unwrap()).unwrap();
    assert_eq!(settings.address(), "10.0.0.9:4371");
    assert_eq!(settings.unlock_seconds, 5);

    let members = repo.list_members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].matches_device_user("12"));

    db.close().await;
}

#[tokio::test]
async fn test_missing_ip_setting_is_reported() {
    let db = Database::in_memory().await.unwrap();
    let repo = SqliteMembershipRepository::new(db.pool().clone());

    let mut partial = SettingsMap::new();
    partial.insert("biometricPort".to_string(), json!("4370"));
    let stored = repo.update_settings(&partial).await.unwrap();

    assert!(DeviceSettings::from_settings(&stored).is_err());
}

#[tokio::test]
async fn test_concurrent_check_ins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db").to_string_lossy().to_string();
    let db = Database::new(DatabaseConfig::new(path)).await.unwrap();
    let repo = Arc::new(SqliteMembershipRepository::new(db.pool().clone()));

    let member = repo.create_member(&NewMember::new("Busy")).await.unwrap();

    const NUM_CONCURRENT_TASKS: usize = 10;
    let barrier = Arc::new(Barrier::new(NUM_CONCURRENT_TASKS));

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_TASKS {
        let repo = Arc::clone(&repo);
        let barrier = Arc::clone(&barrier);
        let member_id = member.id.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            repo.create_attendance(&NewAttendance::biometric(member_id, Utc::now()))
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    for result in results {
        result.unwrap().unwrap();
    }

    let rows = repo.list_attendance().await.unwrap();
    assert_eq!(rows.len(), NUM_CONCURRENT_TASKS);
    assert!(rows.iter().all(|r| r.marked_via == "biometric"));

    db.close().await;
}
