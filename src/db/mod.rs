//! Relational storage for users, component metadata and annotations.
//!
//! Handlers only see the [`Repository`] trait; [`PgRepository`] is the
//! Postgres implementation used by the server.

pub mod models;
pub mod postgres;

use async_trait::async_trait;

use crate::error::RepositoryError;

pub use models::{Annotation, Component, NewAnnotation, User};
pub use postgres::{PgRepository, TableStatus, REQUIRED_TABLES};

/// Data access used by the HTTP handlers.
///
/// `users` and `components` are read-only; annotations are append-only.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Look up a user by exact username.
    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<User>, RepositoryError>;

    /// Fetch every column of a component, or `None` if the id is unknown.
    async fn component_by_id(&self, id: &str) -> Result<Option<Component>, RepositoryError>;

    /// Ids of components with `type = kind` and `pressure > pressure_min`.
    async fn search_components(
        &self,
        kind: &str,
        pressure_min: f64,
    ) -> Result<Vec<String>, RepositoryError>;

    /// All annotations, oldest first.
    async fn list_annotations(&self) -> Result<Vec<Annotation>, RepositoryError>;

    /// Insert an annotation and return the stored row.
    async fn insert_annotation(
        &self,
        annotation: &NewAnnotation,
    ) -> Result<Annotation, RepositoryError>;
}
