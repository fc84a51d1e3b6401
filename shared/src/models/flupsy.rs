//! FLUPSY unit models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A floating upweller platform holding rows of baskets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flupsy {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub active: bool,
}
