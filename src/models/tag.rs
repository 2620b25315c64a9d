//! Tag model

use serde::{Deserialize, Serialize};

/// Tag entity used to label recipes.
///
/// Tags are reference data: the API exposes them read-only and recipes
/// attach them by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// Hex color used by clients, e.g. `#49B64E`
    pub color: String,
    /// URL-friendly slug (unique)
    pub slug: String,
}
