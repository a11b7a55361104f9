//! Database connection pool and schema setup

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Split a migration script into statements.
///
/// Semicolons inside `$$ ... $$` bodies (PL/pgSQL) do not end a statement.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_body = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        match c {
            '$' if chars.peek() == Some(&'$') => {
                current.push('$');
                chars.next();
                in_body = !in_body;
            }
            ';' if !in_body => {
                if has_sql_content(&current) {
                    statements.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => {}
        }
    }

    if has_sql_content(&current) {
        statements.push(current.trim().to_string());
    }

    statements
}

/// True when the text holds more than blank lines and `--` comments
fn has_sql_content(s: &str) -> bool {
    s.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("--")
    })
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let statements = split_sql_statements(include_str!("migrations/001_initial.sql"));

    for statement in &statements {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            tracing::error!("Migration statement failed: {}", e);
            e
        })?;
    }

    tracing::info!("Database migrations completed ({} statements)", statements.len());
    Ok(())
}
