//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use rust_decimal::Decimal;

use crate::models::{Payment, PaymentStatus, Resident, Room, RoomStatus};

/// Validate a room's occupancy counters
pub fn assert_room_invariants(room: &Room) {
    debug_assert!(
        room.current_resident_count <= room.max_cap,
        "Room {} holds {} residents but max_cap is {}",
        room.id,
        room.current_resident_count,
        room.max_cap
    );

    // OCCUPIED only once the room is full
    debug_assert!(
        room.status != RoomStatus::Occupied || room.current_resident_count >= room.max_cap,
        "Room {} is OCCUPIED with {}/{} residents",
        room.id,
        room.current_resident_count,
        room.max_cap
    );
}

/// Validate a resident's billing fields
pub fn assert_resident_invariants(resident: &Resident) {
    if let Some(balance) = resident.balance_owed {
        debug_assert!(
            balance > Decimal::ZERO,
            "Resident {} has non-positive balance_owed {}",
            resident.id,
            balance
        );
        debug_assert!(
            resident
                .room_price
                .is_some_and(|price| resident.amount_paid < price),
            "Resident {} owes {} but has paid {} of {:?}",
            resident.id,
            balance,
            resident.amount_paid,
            resident.room_price
        );
    }

    debug_assert!(
        resident.amount_paid >= Decimal::ZERO,
        "Resident {} has negative amount_paid",
        resident.id
    );

    debug_assert!(
        resident.access_code.is_none() || resident.room_assigned,
        "Resident {} has an access code without a room",
        resident.id
    );
}

/// Validate a payment's links
pub fn assert_payment_invariants(payment: &Payment) {
    debug_assert!(
        payment.resident_id.is_none() || payment.historical_resident_id.is_none(),
        "Payment {} is linked to both a resident and a historical resident",
        payment.reference
    );

    debug_assert!(
        payment.status != PaymentStatus::Confirmed || payment.confirmed_at.is_some(),
        "Payment {} is CONFIRMED without a confirmation time",
        payment.reference
    );
}
