//! Payment records and orphan-sweep resolutions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Invalid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Invalid => "INVALID",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            // provider wording stored by older rows
            "CONFIRMED" | "success" => Some(PaymentStatus::Confirmed),
            "INVALID" => Some(PaymentStatus::Invalid),
            _ => None,
        }
    }
}

/// Whether the payment opened a tenancy or reduced an existing balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Initial,
    TopUp,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Initial => "initial",
            PaymentKind::TopUp => "top_up",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(PaymentKind::Initial),
            "top_up" => Some(PaymentKind::TopUp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub amount: Decimal,
    pub resident_id: Option<Uuid>,
    pub historical_resident_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub calendar_year_id: Option<Uuid>,
    pub status: PaymentStatus,
    pub kind: PaymentKind,
    /// Gateway-issued, unique
    pub reference: String,
    /// Provider channel once verified (card, mobile_money, ...)
    pub method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(
        amount: Decimal,
        resident_id: Uuid,
        room_id: Uuid,
        calendar_year_id: Uuid,
        kind: PaymentKind,
        reference: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            resident_id: Some(resident_id),
            historical_resident_id: None,
            room_id: Some(room_id),
            calendar_year_id: Some(calendar_year_id),
            status: PaymentStatus::Pending,
            kind,
            reference,
            method: None,
            created_at: Utc::now(),
            confirmed_at: None,
            deleted_at: None,
        }
    }

    pub fn is_orphaned(&self) -> bool {
        self.resident_id.is_none() && self.historical_resident_id.is_none()
    }
}

/// Handed back by payment initiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub checkout_url: String,
    pub reference: String,
}

/// Aggregate view of one resident's payments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTotals {
    pub confirmed: Decimal,
    pub pending: Decimal,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    LinkedToResident,
    LinkedToHistoricalResident,
    MarkedInvalidStale,
    SoftDeletedDuplicate,
    MarkedInvalidUnresolvable,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::LinkedToResident => "linked_to_resident",
            ResolutionAction::LinkedToHistoricalResident => "linked_to_historical_resident",
            ResolutionAction::MarkedInvalidStale => "marked_invalid_stale",
            ResolutionAction::SoftDeletedDuplicate => "soft_deleted_duplicate",
            ResolutionAction::MarkedInvalidUnresolvable => "marked_invalid_unresolvable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "linked_to_resident" => Some(ResolutionAction::LinkedToResident),
            "linked_to_historical_resident" => Some(ResolutionAction::LinkedToHistoricalResident),
            "marked_invalid_stale" => Some(ResolutionAction::MarkedInvalidStale),
            "soft_deleted_duplicate" => Some(ResolutionAction::SoftDeletedDuplicate),
            "marked_invalid_unresolvable" => Some(ResolutionAction::MarkedInvalidUnresolvable),
            _ => None,
        }
    }
}

/// Audit entry written for every orphaned payment the sweep touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reference: String,
    pub action: ResolutionAction,
    /// Resident, historical resident or duplicate payment the decision points at
    pub target_id: Option<Uuid>,
    pub rationale: String,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    pub fn new(payment: &Payment, action: ResolutionAction, target_id: Option<Uuid>, rationale: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            reference: payment.reference.clone(),
            action,
            target_id,
            rationale,
            resolved_at: Utc::now(),
        }
    }
}
