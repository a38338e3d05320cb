//! Hostel model - the tenancy root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Unpublished,
    Published,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Unpublished => "UNPUBLISHED",
            PublishState::Published => "PUBLISHED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UNPUBLISHED" => Some(PublishState::Unpublished),
            "PUBLISHED" => Some(PublishState::Published),
            _ => None,
        }
    }
}

/// A managed residential property owning rooms, residents and calendar years
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hostel {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub is_verified: bool,
    pub publish_state: PublishState,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Hostel {
    pub fn new(name: String, address: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            address,
            is_verified: false,
            publish_state: PublishState::Unpublished,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}
