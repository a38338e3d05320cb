//! Resident billing state machine
//!
//! A resident moves `Unassigned -> PartiallyPaid -> FullyPaid` only through
//! confirmed payments. Registration, room moves and removal live here too
//! because they share the room admission and occupancy rules.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::archive;
use crate::error::{Error, Result};
use crate::invariants::{assert_resident_invariants, assert_room_invariants};
use crate::models::{
    round_money, Gender, HistoricalResident, NewResident, Resident, ResidentUpdate, Room,
};
use crate::storage::{Database, Stores};

/// Length of a generated hostel access code
pub const ACCESS_CODE_LEN: usize = 8;

/// Money rules shared by initiation and confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    /// Share of the room price a first payment must cover, and the
    /// cumulative share above which a balance is reported and access granted
    pub minimum_deposit_ratio: Decimal,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            minimum_deposit_ratio: Decimal::new(70, 2),
        }
    }
}

impl BillingPolicy {
    pub fn new(minimum_deposit_ratio: Decimal) -> Result<Self> {
        if minimum_deposit_ratio <= Decimal::ZERO || minimum_deposit_ratio > Decimal::ONE {
            return Err(Error::Validation(format!(
                "minimum deposit ratio must be in (0, 1], got {minimum_deposit_ratio}"
            )));
        }
        Ok(Self {
            minimum_deposit_ratio,
        })
    }

    pub fn minimum_deposit(&self, room_price: Decimal) -> Decimal {
        room_price * self.minimum_deposit_ratio
    }

    /// Inclusive: paying exactly the ratio meets it
    pub fn meets_threshold(&self, total_paid: Decimal, room_price: Decimal) -> bool {
        total_paid >= self.minimum_deposit(room_price)
    }

    /// Recompute `balance_owed` from what has been paid so far
    pub fn rebalance(&self, resident: &mut Resident) {
        resident.balance_owed = match resident.room_price {
            Some(price) => {
                let debt = price - resident.amount_paid;
                if debt > Decimal::ZERO && self.meets_threshold(resident.amount_paid, price) {
                    Some(round_money(debt))
                } else {
                    None
                }
            }
            None => None,
        };
    }

    /// Apply one confirmed payment to a resident.
    ///
    /// Returns the access code when this payment is the one that issued it.
    pub fn apply_payment(&self, resident: &mut Resident, amount: Decimal) -> Result<Option<String>> {
        let room_price = resident.room_price.ok_or_else(|| {
            Error::Validation(format!("Room price not set for resident {}", resident.id))
        })?;

        let total_paid = resident.amount_paid + amount;
        resident.amount_paid = round_money(total_paid);
        resident.room_assigned = true;
        self.rebalance(resident);

        if resident.access_code.is_none() && self.meets_threshold(total_paid, room_price) {
            let code = generate_access_code();
            resident.access_code = Some(code.clone());
            return Ok(Some(code));
        }
        Ok(None)
    }
}

/// Random uppercase alphanumeric hostel access code
pub fn generate_access_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ACCESS_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// What `remove_resident` did with the row
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    /// The resident had payment history and was snapshotted first
    Archived(HistoricalResident),
    Deleted,
}

/// Register a resident into a room
#[instrument(skip(db, payload), fields(room_id = %payload.room_id))]
pub fn register_resident(db: &mut Database, payload: NewResident) -> Result<Resident> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let resident = db.transaction(|s| {
        if s.residents().email_taken(&email, None)? {
            return Err(Error::DuplicateEmail(email.clone()));
        }
        let room = s.rooms().get(payload.room_id)?;
        check_admission(s, &room, payload.gender)?;

        let calendar_year_id = s.calendar_years().find_active(room.hostel_id)?.map(|y| y.id);
        let resident = new_resident(payload, email.clone(), &room, calendar_year_id);
        s.residents().create(&resident)?;

        let room = s.rooms().refresh_occupancy(room.id)?;
        assert_room_invariants(&room);
        Ok(resident)
    })?;

    info!(resident_id = %resident.id, hostel_id = %resident.hostel_id, "Resident registered");
    Ok(resident)
}

/// Move a resident to another room of the same hostel
#[instrument(skip(db, policy))]
pub fn assign_room(
    db: &mut Database,
    policy: &BillingPolicy,
    resident_id: Uuid,
    room_id: Uuid,
) -> Result<Resident> {
    db.transaction(|s| {
        let mut resident = s.residents().get(resident_id)?;
        if resident.room_id == Some(room_id) {
            return Ok(resident);
        }

        let room = s.rooms().get(room_id)?;
        if room.hostel_id != resident.hostel_id {
            return Err(Error::Validation(format!(
                "Room {} belongs to a different hostel",
                room.id
            )));
        }
        check_admission(s, &room, resident.gender)?;

        let previous = resident.room_id;
        resident.room_id = Some(room.id);
        resident.room_price = Some(room.price);
        policy.rebalance(&mut resident);
        s.residents().update_room(resident.id, room.id, room.price)?;
        s.residents().update_billing(&resident)?;

        assert_room_invariants(&s.rooms().refresh_occupancy(room.id)?);
        if let Some(previous) = previous {
            s.rooms().release(previous)?;
        }
        assert_resident_invariants(&resident);
        Ok(resident)
    })
}

/// Edit profile fields. Money fields are not part of `ResidentUpdate`.
#[instrument(skip(db, update))]
pub fn update_resident(db: &mut Database, id: Uuid, update: ResidentUpdate) -> Result<Resident> {
    update.validate()?;
    let update = ResidentUpdate {
        email: update.email.as_deref().map(normalize_email),
        ..update
    };

    db.transaction(|s| {
        let mut resident = s.residents().get(id)?;
        if let Some(email) = &update.email {
            if s.residents().email_taken(email, Some(id))? {
                return Err(Error::DuplicateEmail(email.clone()));
            }
        }
        update.apply_to(&mut resident);
        s.residents().update_profile(&resident)?;
        Ok(resident)
    })
}

/// Remove a resident, archiving them first if they have paid for a room
#[instrument(skip(db))]
pub fn remove_resident(db: &mut Database, id: Uuid) -> Result<Removal> {
    let removal = db.transaction(|s| {
        let resident = s.residents().get(id)?;
        let has_payments = s.payments().count_for_resident(id)? > 0;

        let removal = if has_payments && resident.room_id.is_some() {
            let calendar_year_id = match resident.calendar_year_id {
                Some(year_id) => year_id,
                None => {
                    s.calendar_years()
                        .find_active(resident.hostel_id)?
                        .ok_or(Error::NoActiveCalendarYear(resident.hostel_id))?
                        .id
                }
            };
            Removal::Archived(archive::archive_resident(s, &resident, calendar_year_id)?)
        } else {
            s.payments().delete_for_resident(id)?;
            s.residents().delete(id)?;
            Removal::Deleted
        };

        if let Some(room_id) = resident.room_id {
            assert_room_invariants(&s.rooms().release(room_id)?);
        }
        Ok(removal)
    })?;

    info!(resident_id = %id, archived = matches!(removal, Removal::Archived(_)), "Resident removed");
    Ok(removal)
}

/// Apply a confirmed payment inside an open transaction and refresh the room
pub(crate) fn settle(
    s: Stores<'_>,
    policy: &BillingPolicy,
    resident: &mut Resident,
    amount: Decimal,
) -> Result<Option<String>> {
    let issued = policy.apply_payment(resident, amount)?;
    s.residents().update_billing(resident)?;
    if let Some(room_id) = resident.room_id {
        assert_room_invariants(&s.rooms().refresh_occupancy(room_id)?);
    }
    assert_resident_invariants(resident);
    Ok(issued)
}

/// Gender policy and capacity, checked against the live count
fn check_admission(s: Stores<'_>, room: &Room, gender: Gender) -> Result<()> {
    if !room.gender.admits(gender) {
        return Err(Error::GenderMismatch {
            room: room.gender,
            resident: gender,
        });
    }
    if s.residents().count_in_room(room.id)? >= room.max_cap {
        return Err(Error::RoomFull {
            room_id: room.id,
            max_cap: room.max_cap,
        });
    }
    Ok(())
}

fn new_resident(
    payload: NewResident,
    email: String,
    room: &Room,
    calendar_year_id: Option<Uuid>,
) -> Resident {
    Resident {
        id: Uuid::new_v4(),
        hostel_id: room.hostel_id,
        room_id: Some(room.id),
        calendar_year_id,
        name: payload.name.trim().to_string(),
        student_id: payload.student_id.trim().to_string(),
        email,
        phone: payload.phone.trim().to_string(),
        course: payload.course.trim().to_string(),
        gender: payload.gender,
        emergency_contact_name: payload.emergency_contact_name.trim().to_string(),
        emergency_contact_phone: payload.emergency_contact_phone.trim().to_string(),
        relationship: payload.relationship.trim().to_string(),
        room_price: Some(room.price),
        amount_paid: Decimal::ZERO,
        balance_owed: None,
        access_code: None,
        room_assigned: false,
        created_at: chrono::Utc::now(),
        deleted_at: None,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
