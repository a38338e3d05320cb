//! Resident models - current occupants and their archived snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Where a resident stands financially
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingState {
    /// No confirmed payment has assigned a room yet
    Unassigned,
    PartiallyPaid,
    FullyPaid,
}

/// An active occupant for the current calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Option<Uuid>,
    pub calendar_year_id: Option<Uuid>,
    pub name: String,
    pub student_id: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub gender: Gender,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub relationship: String,
    /// Room price at registration; later room price changes do not move it
    pub room_price: Option<Decimal>,
    pub amount_paid: Decimal,
    /// Set only while a partial payment above the reporting threshold is outstanding
    pub balance_owed: Option<Decimal>,
    pub access_code: Option<String>,
    pub room_assigned: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Resident {
    pub fn billing_state(&self) -> BillingState {
        if !self.room_assigned {
            return BillingState::Unassigned;
        }
        match self.room_price {
            Some(price) if self.amount_paid < price => BillingState::PartiallyPaid,
            _ => BillingState::FullyPaid,
        }
    }

    /// Outstanding debt against the snapshotted room price
    pub fn outstanding(&self) -> Option<Decimal> {
        self.room_price.map(|price| price - self.amount_paid)
    }
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResident {
    pub name: String,
    pub student_id: String,
    pub course: String,
    pub phone: String,
    pub email: String,
    pub gender: Gender,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub relationship: String,
    pub room_id: Uuid,
}

impl NewResident {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let required = [
            ("name", &self.name),
            ("studentId", &self.student_id),
            ("course", &self.course),
            ("phone", &self.phone),
            ("emergencyContactName", &self.emergency_contact_name),
            ("emergencyContactPhone", &self.emergency_contact_phone),
            ("relationship", &self.relationship),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{field}: can't be empty"));
            }
        }
        if !is_plausible_email(&self.email) {
            problems.push("email: must be a valid email address".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join(". ")))
        }
    }
}

/// Generic profile edit; financial fields are deliberately absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentUpdate {
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub relationship: Option<String>,
}

impl ResidentUpdate {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("studentId", &self.student_id),
            ("course", &self.course),
            ("phone", &self.phone),
            ("emergencyContactName", &self.emergency_contact_name),
            ("emergencyContactPhone", &self.emergency_contact_phone),
            ("relationship", &self.relationship),
        ];
        let mut problems: Vec<String> = fields
            .into_iter()
            .filter(|(_, v)| v.as_deref().is_some_and(|s| s.trim().is_empty()))
            .map(|(field, _)| format!("{field}: can't be empty"))
            .collect();
        if let Some(email) = &self.email {
            if !is_plausible_email(email) {
                problems.push("email: must be a valid email address".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join(". ")))
        }
    }

    pub fn apply_to(self, resident: &mut Resident) {
        if let Some(v) = self.name {
            resident.name = v.trim().to_string();
        }
        if let Some(v) = self.student_id {
            resident.student_id = v.trim().to_string();
        }
        if let Some(v) = self.course {
            resident.course = v.trim().to_string();
        }
        if let Some(v) = self.phone {
            resident.phone = v;
        }
        if let Some(v) = self.email {
            resident.email = v;
        }
        if let Some(v) = self.emergency_contact_name {
            resident.emergency_contact_name = v.trim().to_string();
        }
        if let Some(v) = self.emergency_contact_phone {
            resident.emergency_contact_phone = v;
        }
        if let Some(v) = self.relationship {
            resident.relationship = v.trim().to_string();
        }
    }
}

/// Immutable record of a resident from a closed calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalResident {
    pub id: Uuid,
    /// Id of the resident row this snapshot replaced
    pub resident_id: Uuid,
    pub hostel_id: Uuid,
    pub room_id: Option<Uuid>,
    pub calendar_year_id: Uuid,
    pub amount_paid: Decimal,
    pub room_price: Decimal,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub archived_at: DateTime<Utc>,
}

impl HistoricalResident {
    pub fn snapshot_of(resident: &Resident, calendar_year_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            resident_id: resident.id,
            hostel_id: resident.hostel_id,
            room_id: resident.room_id,
            calendar_year_id,
            amount_paid: resident.amount_paid,
            room_price: resident.room_price.unwrap_or(Decimal::ZERO),
            name: resident.name.clone(),
            email: resident.email.clone(),
            phone: resident.phone.clone(),
            course: resident.course.clone(),
            archived_at: Utc::now(),
        }
    }
}

/// What payment confirmation hands back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub room_id: Option<Uuid>,
    pub room_price: Option<Decimal>,
    pub amount_paid: Decimal,
    pub balance_owed: Option<Decimal>,
    pub access_code: Option<String>,
    pub room_assigned: bool,
    /// True when the payment settled a resident already rolled into history
    pub archived: bool,
}

impl From<&Resident> for ResidentSnapshot {
    fn from(r: &Resident) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            email: r.email.clone(),
            room_id: r.room_id,
            room_price: r.room_price,
            amount_paid: r.amount_paid,
            balance_owed: r.balance_owed,
            access_code: r.access_code.clone(),
            room_assigned: r.room_assigned,
            archived: false,
        }
    }
}

impl From<&HistoricalResident> for ResidentSnapshot {
    fn from(h: &HistoricalResident) -> Self {
        Self {
            id: h.id,
            name: h.name.clone(),
            email: h.email.clone(),
            room_id: h.room_id,
            room_price: Some(h.room_price),
            amount_paid: h.amount_paid,
            balance_owed: None,
            access_code: None,
            room_assigned: true,
            archived: true,
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
