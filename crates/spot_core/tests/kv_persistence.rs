use rusqlite::Connection;
use spot_core::db::migrations::latest_version;
use spot_core::db::{open_db, open_db_in_memory, DbError};
use spot_core::{
    ConfigError, KvRepository, MemoryKvRepository, NewTask, SpotConfig, SqliteKvRepository,
    StorageError, Survey, TaskStatus, TaskStore,
};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "kv_entries");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spot.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "kv_entries");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        SqliteKvRepository::open(&path),
        Err(StorageError::Db(DbError::UnsupportedSchemaVersion { .. }))
    ));
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteKvRepository::try_new(conn),
        Err(StorageError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));
}

#[test]
fn sqlite_repository_overwrites_and_removes_values() {
    let mut repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();

    assert_eq!(repo.get("k").unwrap(), None);
    repo.set("k", "one").unwrap();
    repo.set("k", "two").unwrap();
    assert_eq!(repo.get("k").unwrap().as_deref(), Some("two"));

    let rows: i64 = repo
        .connection()
        .query_row("SELECT COUNT(*) FROM kv_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);

    assert!(repo.remove("k").unwrap());
    assert!(!repo.remove("k").unwrap());
    assert_eq!(repo.get("k").unwrap(), None);
}

#[test]
fn task_store_survives_reopen_of_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let saved_id = {
        let mut store = TaskStore::new(SqliteKvRepository::open(&path).unwrap());
        store.add_task(NewTask::new("persist me", Survey::Primary));
        let blocked = store.add_task(NewTask::new("blocked", Survey::Secondary));
        store
            .move_to_status_and_reorder(&blocked.id, TaskStatus::Blocked, 0)
            .unwrap();
        assert!(store.last_persist_error().is_none());
        blocked.id
    };

    let reopened = TaskStore::new(SqliteKvRepository::open(&path).unwrap());
    let names: Vec<&str> = reopened.tasks().iter().map(|task| task.name.as_str()).collect();
    assert_eq!(names, vec!["persist me", "blocked"]);
    assert_eq!(
        reopened.get_task(&saved_id).map(|task| task.status),
        Some(TaskStatus::Blocked)
    );
}

#[test]
fn custom_storage_key_isolates_collections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.db");
    let config = SpotConfig {
        storage_key: "work".to_string(),
        ..SpotConfig::default()
    };

    {
        let mut store =
            TaskStore::with_config(SqliteKvRepository::open(&path).unwrap(), &config).unwrap();
        store.add_task(NewTask::new("work item", Survey::Primary));
    }

    let default_store = TaskStore::new(SqliteKvRepository::open(&path).unwrap());
    assert!(default_store.is_empty());
    let work_store =
        TaskStore::with_config(SqliteKvRepository::open(&path).unwrap(), &config).unwrap();
    assert_eq!(work_store.len(), 1);
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let config = SpotConfig {
        storage_key: "  ".to_string(),
        ..SpotConfig::default()
    };
    let opened = TaskStore::with_config(MemoryKvRepository::new(), &config);
    assert!(matches!(opened, Err(ConfigError::EmptyStorageKey)));

    let zero_cap = SpotConfig {
        max_name_chars: 0,
        ..SpotConfig::default()
    };
    assert!(matches!(
        TaskStore::with_config(MemoryKvRepository::new(), &zero_cap),
        Err(ConfigError::ZeroNameCap)
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
