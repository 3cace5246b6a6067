//! SQL query agent for the patient database.
//!
//! Opaque text-in/text-out: the router hands it a natural-language question
//! and gets prose back. Internally it is a three-step pipeline. First the
//! generator plans a single SELECT from the live schema, then the statement
//! runs on a scoped connection, then the generator turns the rows into a
//! natural-language answer. Only SELECT statements ever reach the database.

use async_trait::async_trait;
use sqlx::{Column, Connection, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::db;
use crate::generate::Generator;

/// Every internal failure of the agent collapses into this one error; the
/// caller only learns that the agent could not produce an answer.
#[derive(Debug)]
pub struct AgentError {
    pub message: String,
}

impl AgentError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query agent failed: {}", self.message)
    }
}

impl std::error::Error for AgentError {}

/// Answers natural-language questions against a structured store.
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn run(&self, query: &str) -> Result<String, AgentError>;
}

const MAX_RESULT_ROWS: usize = 20;

const PLANNER_SYSTEM_PROMPT: &str = "You translate questions into SQLite SQL. Respond with \
exactly one SELECT statement and nothing else: no prose, no code fences. Use only the tables \
and columns in the provided schema.";

const SUMMARIZER_SYSTEM_PROMPT: &str = "You summarize database query results as a direct \
natural-language answer to the user's question. Do not mention SQL or the database. If the \
result set is empty, say that no matching records were found.";

pub struct SqlQueryAgent {
    database: PathBuf,
    generator: Arc<dyn Generator>,
}

impl SqlQueryAgent {
    pub fn new(database: PathBuf, generator: Arc<dyn Generator>) -> Self {
        Self {
            database,
            generator,
        }
    }

    async fn describe_schema(&self) -> Result<String, AgentError> {
        let mut conn = db::open(&self.database)
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;
        let rows = sqlx::query(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| AgentError::new(e.to_string()))?;
        conn.close()
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;

        let schema: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get::<Option<String>, _>("sql"))
            .collect();
        if schema.is_empty() {
            return Err(AgentError::new("patient database has no tables"));
        }
        Ok(schema.join(";\n"))
    }

    async fn plan_statement(&self, query: &str, schema: &str) -> Result<String, AgentError> {
        let prompt = format!("Schema:\n{}\n\nQuestion: {}", schema, query);
        let raw = self
            .generator
            .complete(PLANNER_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;

        let statement = strip_code_fences(&raw);
        if !statement.to_ascii_lowercase().starts_with("select") {
            return Err(AgentError::new(format!(
                "planner produced a non-SELECT statement: {}",
                statement
            )));
        }
        Ok(statement)
    }

    async fn execute(&self, statement: &str) -> Result<String, AgentError> {
        let mut conn = db::open(&self.database)
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;
        let rows = sqlx::query(statement)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;
        conn.close()
            .await
            .map_err(|e| AgentError::new(e.to_string()))?;

        Ok(render_rows(&rows))
    }
}

#[async_trait]
impl QueryAgent for SqlQueryAgent {
    async fn run(&self, query: &str) -> Result<String, AgentError> {
        let schema = self.describe_schema().await?;
        let statement = self.plan_statement(query, &schema).await?;
        debug!(statement = %statement, "executing planned statement");
        let results = self.execute(&statement).await?;

        let prompt = format!("Question: {}\n\nQuery results:\n{}", query, results);
        self.generator
            .complete(SUMMARIZER_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| AgentError::new(e.to_string()))
    }
}

/// Planners tend to wrap SQL in markdown fences despite instructions.
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().trim_end_matches(';').to_string()
}

/// Render rows as `col=value` lines, capped at [`MAX_RESULT_ROWS`].
fn render_rows(rows: &[sqlx::sqlite::SqliteRow]) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }

    let mut lines = Vec::with_capacity(rows.len().min(MAX_RESULT_ROWS) + 1);
    for row in rows.iter().take(MAX_RESULT_ROWS) {
        let fields: Vec<String> = row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{}={}", col.name(), render_value(row, i)))
            .collect();
        lines.push(fields.join(", "));
    }
    if rows.len() > MAX_RESULT_ROWS {
        lines.push(format!("... and {} more rows", rows.len() - MAX_RESULT_ROWS));
    }
    lines.join("\n")
}

/// SQLite is dynamically typed, so probe the common decodings in order.
fn render_value(row: &sqlx::sqlite::SqliteRow, index: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or_else(|| "NULL".to_string(), |n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or_else(|| "NULL".to_string(), |n| n.to_string());
    }
    "?".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use anyhow::Result;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<&str>) -> Self {
            let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }
    }

    async fn seeded_db() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("patients.sqlite");
        migrate::migrate_patient_store(&path).await.unwrap();

        let mut conn = db::open(&path).await.unwrap();
        sqlx::query("INSERT INTO patients (id, name, date_of_birth) VALUES (1, 'Ada', '1990-01-01')")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
        (tmp, path)
    }

    #[test]
    fn code_fences_and_trailing_semicolons_are_stripped() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT * FROM patients;\n```"),
            "SELECT * FROM patients"
        );
        assert_eq!(strip_code_fences("SELECT 1"), "SELECT 1");
    }

    #[tokio::test]
    async fn agent_plans_executes_and_summarizes() {
        let (_tmp, path) = seeded_db().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "SELECT name FROM patients WHERE id = 1",
            "The patient's name is Ada.",
        ]));
        let agent = SqlQueryAgent::new(path, generator);

        let answer = agent.run("what is patient 1 called").await.unwrap();
        assert_eq!(answer, "The patient's name is Ada.");
    }

    #[tokio::test]
    async fn non_select_plans_are_refused() {
        let (_tmp, path) = seeded_db().await;
        let generator = Arc::new(ScriptedGenerator::new(vec!["DELETE FROM patients"]));
        let agent = SqlQueryAgent::new(path, generator);

        let err = agent.run("remove everyone").await.unwrap_err();
        assert!(err.message.contains("non-SELECT"));
    }

    #[tokio::test]
    async fn broken_sql_surfaces_as_agent_error() {
        let (_tmp, path) = seeded_db().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "SELECT nope FROM missing_table",
        ]));
        let agent = SqlQueryAgent::new(path, generator);

        assert!(agent.run("anything").await.is_err());
    }
}
