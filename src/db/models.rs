//! Row types for the `users`, `components` and `annotations` tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// A component row, returned as-is with all of its columns.
pub type Component = serde_json::Map<String, serde_json::Value>;

/// A row from the `annotations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Annotation {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub note: String,
}

/// Body of `POST /api/annotations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub note: String,
}

impl NewAnnotation {
    /// Attach the id assigned by the database.
    pub fn with_id(self, id: i32) -> Annotation {
        Annotation {
            id,
            x: self.x,
            y: self.y,
            z: self.z,
            note: self.note,
        }
    }
}
