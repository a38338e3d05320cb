//! Shared fixtures and in-process collaborators for unit tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::billing::register_resident;
use crate::error::{Error, GatewayError, Result};
use crate::gateway::{PaymentGateway, Verification, STATUS_SUCCESS};
use crate::models::{
    CalendarYear, Checkout, Gender, Hostel, NewResident, Payment, PaymentKind, Resident, Room,
    RoomGender,
};
use crate::notify::{Email, Notifier};
use crate::storage::Database;

/// A hostel with an active year and one two-bed MIX room priced 1000
pub(crate) struct Fixture {
    pub db: Database,
    pub hostel: Hostel,
    pub year: CalendarYear,
    pub room: Room,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_db(Database::open_in_memory().unwrap())
    }

    /// Fixture on a database file, for tests that open more connections
    pub fn at(path: &Path) -> Self {
        Self::with_db(Database::open(path).unwrap())
    }

    fn with_db(db: Database) -> Self {
        let hostel = Hostel::new("Legon Annex".into(), "12 University Ave, Accra".into());
        db.hostels().create(&hostel).unwrap();
        let year = CalendarYear::open(hostel.id, "2024/2025".into());
        db.calendar_years().create(&year).unwrap();
        let room = Room::new(hostel.id, "A1".into(), 2, dec!(1000), RoomGender::Mix)
            .with_location("1".into(), "A".into());
        db.rooms().create(&room).unwrap();
        Self {
            db,
            hostel,
            year,
            room,
        }
    }

    /// A room in a separate hostel with no calendar year
    pub fn new_hostel_room(db: &Database, price: Decimal) -> Room {
        let hostel = Hostel::new("Elsewhere".into(), "Kumasi".into());
        db.hostels().create(&hostel).unwrap();
        let room = Room::new(hostel.id, "Z9".into(), 2, price, RoomGender::Mix);
        db.rooms().create(&room).unwrap();
        room
    }

    pub fn add_room(&self, max_cap: u32, price: Decimal, gender: RoomGender) -> Room {
        let number = format!("R{}", &uuid::Uuid::new_v4().simple().to_string()[..6]);
        let room = Room::new(self.hostel.id, number, max_cap, price, gender);
        self.db.rooms().create(&room).unwrap();
        room
    }

    pub fn registration(&self, email: &str) -> NewResident {
        NewResident {
            name: "Kwame Boateng".into(),
            student_id: "UG-2201".into(),
            course: "Economics".into(),
            phone: "0241112222".into(),
            email: email.into(),
            gender: Gender::Male,
            emergency_contact_name: "Esi Boateng".into(),
            emergency_contact_phone: "0203334444".into(),
            relationship: "Mother".into(),
            room_id: self.room.id,
        }
    }

    /// Register through admission checks into the fixture room
    pub fn register(&mut self, email: &str) -> Result<Resident> {
        let payload = self.registration(email);
        register_resident(&mut self.db, payload)
    }

    /// Unsaved resident in the fixture room under the active year
    pub fn resident(&self, email: &str) -> Resident {
        let mut resident = resident_in(&self.room, email, Gender::Male);
        resident.calendar_year_id = Some(self.year.id);
        resident
    }

    /// Resident inserted directly, bypassing admission checks
    pub fn registered(&self, email: &str) -> Resident {
        let resident = self.resident(email);
        self.db.residents().create(&resident).unwrap();
        resident
    }

    pub fn pending_payment(&self, resident: &Resident, amount: Decimal, reference: &str) -> Payment {
        Payment::pending(
            amount,
            resident.id,
            resident.room_id.unwrap_or(self.room.id),
            self.year.id,
            PaymentKind::Initial,
            reference.to_string(),
        )
    }
}

pub(crate) fn resident_in(room: &Room, email: &str, gender: Gender) -> Resident {
    Resident {
        id: uuid::Uuid::new_v4(),
        hostel_id: room.hostel_id,
        room_id: Some(room.id),
        calendar_year_id: None,
        name: "Kwame Boateng".into(),
        student_id: "UG-2201".into(),
        email: email.into(),
        phone: "0241112222".into(),
        course: "Economics".into(),
        gender,
        emergency_contact_name: "Esi Boateng".into(),
        emergency_contact_phone: "0203334444".into(),
        relationship: "Mother".into(),
        room_price: Some(room.price),
        amount_paid: Decimal::ZERO,
        balance_owed: None,
        access_code: None,
        room_assigned: false,
        created_at: chrono::Utc::now(),
        deleted_at: None,
    }
}

/// Scripted provider: every reference verifies as `success` unless told otherwise
#[derive(Default)]
pub(crate) struct FakeGateway {
    issued: AtomicU32,
    fail_initialize: AtomicBool,
    statuses: Mutex<HashMap<String, String>>,
    pub initialized: Mutex<Vec<(String, i64)>>,
    pub verify_calls: AtomicU32,
}

impl FakeGateway {
    pub const GOOD_SIGNATURE: &'static str = "good-signature";

    pub fn set_status(&self, reference: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(reference.to_string(), status.to_string());
    }

    pub fn fail_next_initialize(&self) {
        self.fail_initialize.store(true, Ordering::SeqCst);
    }
}

impl PaymentGateway for FakeGateway {
    fn initialize_transaction(
        &self,
        email: &str,
        amount_minor: i64,
    ) -> std::result::Result<Checkout, GatewayError> {
        if self.fail_initialize.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection reset by peer".into()));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("ref-{n:04}");
        self.initialized
            .lock()
            .unwrap()
            .push((email.to_string(), amount_minor));
        Ok(Checkout {
            checkout_url: format!("https://checkout.test/{reference}"),
            reference,
        })
    }

    fn verify_transaction(&self, reference: &str) -> std::result::Result<Verification, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| STATUS_SUCCESS.to_string());
        Ok(Verification {
            status,
            channel: Some("card".into()),
        })
    }

    fn verify_webhook_signature(&self, _raw_body: &[u8], signature: &str) -> bool {
        signature == Self::GOOD_SIGNATURE
    }
}

/// Keeps every email it is handed; can be switched to fail
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: Mutex<Vec<Email>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, email: &Email) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Notification("mail relay unavailable".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
