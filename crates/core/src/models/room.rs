//! Room model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "AVAILABLE",
            RoomStatus::Occupied => "OCCUPIED",
            RoomStatus::Maintenance => "MAINTENANCE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(RoomStatus::Available),
            "OCCUPIED" => Some(RoomStatus::Occupied),
            "MAINTENANCE" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

/// Who a room admits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomGender {
    Male,
    Female,
    Mix,
}

impl RoomGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomGender::Male => "MALE",
            RoomGender::Female => "FEMALE",
            RoomGender::Mix => "MIX",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MALE" => Some(RoomGender::Male),
            "FEMALE" => Some(RoomGender::Female),
            "MIX" => Some(RoomGender::Mix),
            _ => None,
        }
    }

    pub fn admits(&self, gender: Gender) -> bool {
        match self {
            RoomGender::Mix => true,
            RoomGender::Male => gender == Gender::Male,
            RoomGender::Female => gender == Gender::Female,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub number: String,
    pub floor: Option<String>,
    pub block: Option<String>,
    pub max_cap: u32,
    pub current_resident_count: u32,
    pub price: Decimal,
    pub status: RoomStatus,
    pub gender: RoomGender,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new(hostel_id: Uuid, number: String, max_cap: u32, price: Decimal, gender: RoomGender) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostel_id,
            number,
            floor: None,
            block: None,
            max_cap,
            current_resident_count: 0,
            price,
            status: RoomStatus::Available,
            gender,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_location(mut self, floor: String, block: String) -> Self {
        self.floor = Some(floor);
        self.block = Some(block);
        self
    }

    pub fn is_full(&self) -> bool {
        self.current_resident_count >= self.max_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_policy() {
        assert!(RoomGender::Mix.admits(Gender::Female));
        assert!(RoomGender::Mix.admits(Gender::Male));
        assert!(RoomGender::Male.admits(Gender::Male));
        assert!(!RoomGender::Male.admits(Gender::Female));
        assert!(!RoomGender::Female.admits(Gender::Male));
    }

    #[test]
    fn test_status_round_trips_through_column_text() {
        for status in [RoomStatus::Available, RoomStatus::Occupied, RoomStatus::Maintenance] {
            assert_eq!(RoomStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RoomStatus::from_str("occupied"), None);
    }
}
