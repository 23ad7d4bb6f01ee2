//! Postgres implementation of [`Repository`] on a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::RepositoryError;

use super::models::{Annotation, Component, NewAnnotation, User};
use super::Repository;

/// Tables the service reads from or writes to.
pub const REQUIRED_TABLES: [&str; 3] = ["users", "components", "annotations"];

/// Development schema. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS components (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        pressure DOUBLE PRECISION
    )",
    "CREATE TABLE IF NOT EXISTS annotations (
        id SERIAL PRIMARY KEY,
        x DOUBLE PRECISION NOT NULL,
        y DOUBLE PRECISION NOT NULL,
        z DOUBLE PRECISION NOT NULL,
        note TEXT NOT NULL
    )",
];

/// Presence of one required table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub name: &'static str,
    pub exists: bool,
}

/// Repository backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and verify that the database is reachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        debug!(max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they are missing.
    pub async fn init_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!("Database schema initialized");
        Ok(())
    }

    /// Report which of [`REQUIRED_TABLES`] exist.
    pub async fn table_status(&self) -> Result<Vec<TableStatus>, RepositoryError> {
        let mut status = Vec::with_capacity(REQUIRED_TABLES.len());
        for name in REQUIRED_TABLES {
            let exists: bool = sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
            status.push(TableStatus { name, exists });
        }
        Ok(status)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn component_by_id(&self, id: &str) -> Result<Option<Component>, RepositoryError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT row_to_json(c) FROM components c WHERE c.id::text = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|value| match value {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn search_components(
        &self,
        kind: &str,
        pressure_min: f64,
    ) -> Result<Vec<String>, RepositoryError> {
        let ids = sqlx::query_scalar(
            "SELECT id::text FROM components WHERE type = $1 AND pressure > $2::double precision",
        )
        .bind(kind)
        .bind(pressure_min)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_annotations(&self) -> Result<Vec<Annotation>, RepositoryError> {
        let rows = sqlx::query_as::<_, Annotation>(
            "SELECT id, x, y, z, note FROM annotations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_annotation(
        &self,
        annotation: &NewAnnotation,
    ) -> Result<Annotation, RepositoryError> {
        let row = sqlx::query_as::<_, Annotation>(
            "INSERT INTO annotations (x, y, z, note) VALUES ($1, $2, $3, $4) \
             RETURNING id, x, y, z, note",
        )
        .bind(annotation.x)
        .bind(annotation.y)
        .bind(annotation.z)
        .bind(&annotation.note)
        .fetch_one(&self.pool)
        .await?;
        debug!(id = row.id, "Inserted annotation");
        Ok(row)
    }
}
