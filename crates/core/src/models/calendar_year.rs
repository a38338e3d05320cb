//! Calendar year model - one billing and occupancy period

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// At most one calendar year per hostel is active at a time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarYear {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    /// None while the year is active
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CalendarYear {
    /// A freshly opened, active year
    pub fn open(hostel_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostel_id,
            name,
            start_date: Utc::now(),
            end_date: None,
            is_active: true,
        }
    }
}

/// Revenue summary of an archived year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub calendar_year_id: Uuid,
    pub total_revenue: Decimal,
    pub historical_residents: u32,
    pub average_revenue_per_resident: Decimal,
}
