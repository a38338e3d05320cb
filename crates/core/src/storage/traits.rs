//! Storage repository traits
//!
//! Read-side interface used by the HTTP surface, so handlers never touch
//! SQL or a particular store type.

use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CalendarYear, HistoricalResident, Hostel, Payment, Resident, Resolution, Room,
};

/// Hostel repository operations
pub trait HostelRepository {
    /// Create a new hostel
    fn create_hostel(&self, hostel: &Hostel) -> Result<()>;

    /// Find a live hostel by ID
    fn find_hostel(&self, id: Uuid) -> Result<Option<Hostel>>;
}

/// Room repository operations
pub trait RoomRepository {
    /// Create a new room
    fn create_room(&self, room: &Room) -> Result<()>;

    /// Find a live room by ID
    fn find_room(&self, id: Uuid) -> Result<Option<Room>>;

    /// List the live rooms of a hostel
    fn list_rooms_for_hostel(&self, hostel_id: Uuid) -> Result<Vec<Room>>;
}

/// Resident repository operations
pub trait ResidentRepository {
    /// Find a live resident by ID
    fn find_resident(&self, id: Uuid) -> Result<Option<Resident>>;

    /// Residents of a hostel with a positive balance owed
    fn list_debtors(&self, hostel_id: Uuid) -> Result<Vec<Resident>>;
}

/// Payment repository operations
pub trait PaymentRepository {
    /// Find a live payment by gateway reference
    fn find_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>>;

    /// List live payments, newest first
    fn list_payments(&self) -> Result<Vec<Payment>>;

    /// List live payments of one resident
    fn list_payments_for_resident(&self, resident_id: Uuid) -> Result<Vec<Payment>>;

    /// Orphan-sweep audit trail
    fn list_resolutions(&self) -> Result<Vec<Resolution>>;
}

/// Calendar year repository operations
pub trait CalendarYearRepository {
    /// Find a calendar year by ID
    fn find_calendar_year(&self, id: Uuid) -> Result<Option<CalendarYear>>;

    /// The hostel's active year
    fn find_active_calendar_year(&self, hostel_id: Uuid) -> Result<Option<CalendarYear>>;

    /// Closed years of a hostel, newest first
    fn list_historical_years(&self, hostel_id: Uuid) -> Result<Vec<CalendarYear>>;

    /// Residents archived under a calendar year
    fn list_historical_residents(&self, calendar_year_id: Uuid) -> Result<Vec<HistoricalResident>>;
}

/// Combined storage trait
pub trait Storage:
    HostelRepository + RoomRepository + ResidentRepository + PaymentRepository + CalendarYearRepository
{
}

// Blanket implementation for any type implementing all repositories
impl<T> Storage for T where
    T: HostelRepository
        + RoomRepository
        + ResidentRepository
        + PaymentRepository
        + CalendarYearRepository
{
}
