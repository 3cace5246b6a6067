//! Idempotent schema creation for the two relational stores.

use anyhow::Result;
use sqlx::Connection;
use std::path::Path;

use crate::db;

/// SQL to create the `users` table in the authentication store.
const CREATE_USERS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
"#;

/// Demo patient schema the SQL query agent plans against. A deployment
/// pointing at a real consultation database skips this.
const PATIENT_SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        date_of_birth TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS consultations (
        id INTEGER PRIMARY KEY,
        patient_id INTEGER NOT NULL,
        visited_at TEXT NOT NULL,
        notes TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (patient_id) REFERENCES patients(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_consultations_patient_id ON consultations(patient_id)",
];

/// Create the authentication store schema.
pub async fn migrate_auth_store(path: &Path) -> Result<()> {
    let mut conn = db::open_or_create(path).await?;
    sqlx::query(CREATE_USERS_TABLE_SQL)
        .execute(&mut conn)
        .await?;
    conn.close().await?;
    Ok(())
}

/// Create the demo patient store schema.
pub async fn migrate_patient_store(path: &Path) -> Result<()> {
    let mut conn = db::open_or_create(path).await?;
    for stmt in PATIENT_SCHEMA_SQL {
        sqlx::query(stmt).execute(&mut conn).await?;
    }
    conn.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = tmp.path().join("auth.sqlite");
        let patients = tmp.path().join("patients.sqlite");

        migrate_auth_store(&auth).await.unwrap();
        migrate_auth_store(&auth).await.unwrap();
        migrate_patient_store(&patients).await.unwrap();
        migrate_patient_store(&patients).await.unwrap();
    }
}
