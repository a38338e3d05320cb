//! SQLite storage layer for the hostel core

mod calendar_years;
mod historical_residents;
mod hostels;
mod migrations;
mod parse;
mod payments;
mod residents;
mod resolutions;
mod rooms;
mod traits;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CalendarYear, HistoricalResident, Hostel, Payment, Resident, Resolution, Room,
};

pub use calendar_years::CalendarYearStore;
pub use historical_residents::HistoricalResidentStore;
pub use hostels::HostelStore;
pub use payments::PaymentStore;
pub use residents::ResidentStore;
pub use resolutions::ResolutionStore;
pub use rooms::RoomStore;
pub use traits::{
    CalendarYearRepository, HostelRepository, PaymentRepository, ResidentRepository,
    RoomRepository, Storage,
};

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::connect(path)?;
        let mode: String =
            db.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "Journal mode set");
        db.init()?;
        Ok(db)
    }

    /// Open another connection to a database that `open` already migrated
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        migrations::get_current_version(&self.conn).unwrap_or(0)
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// The write lock is taken up front, so concurrent writers on the same
    /// file queue behind each other instead of interleaving reads and writes.
    /// Any error rolls the whole transaction back.
    pub fn transaction<T>(&mut self, f: impl FnOnce(Stores<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(Stores { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }

    /// Store accessors on the plain connection
    pub fn stores(&self) -> Stores<'_> {
        Stores { conn: &self.conn }
    }

    pub fn hostels(&self) -> HostelStore<'_> {
        HostelStore::new(&self.conn)
    }

    pub fn calendar_years(&self) -> CalendarYearStore<'_> {
        CalendarYearStore::new(&self.conn)
    }

    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    pub fn residents(&self) -> ResidentStore<'_> {
        ResidentStore::new(&self.conn)
    }

    pub fn historical_residents(&self) -> HistoricalResidentStore<'_> {
        HistoricalResidentStore::new(&self.conn)
    }

    pub fn payments(&self) -> PaymentStore<'_> {
        PaymentStore::new(&self.conn)
    }

    pub fn resolutions(&self) -> ResolutionStore<'_> {
        ResolutionStore::new(&self.conn)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Store accessors bound to one connection or open transaction
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    conn: &'a Connection,
}

impl<'a> Stores<'a> {
    pub fn hostels(&self) -> HostelStore<'a> {
        HostelStore::new(self.conn)
    }

    pub fn calendar_years(&self) -> CalendarYearStore<'a> {
        CalendarYearStore::new(self.conn)
    }

    pub fn rooms(&self) -> RoomStore<'a> {
        RoomStore::new(self.conn)
    }

    pub fn residents(&self) -> ResidentStore<'a> {
        ResidentStore::new(self.conn)
    }

    pub fn historical_residents(&self) -> HistoricalResidentStore<'a> {
        HistoricalResidentStore::new(self.conn)
    }

    pub fn payments(&self) -> PaymentStore<'a> {
        PaymentStore::new(self.conn)
    }

    pub fn resolutions(&self) -> ResolutionStore<'a> {
        ResolutionStore::new(self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl HostelRepository for Database {
    fn create_hostel(&self, hostel: &Hostel) -> Result<()> {
        self.hostels().create(hostel)
    }

    fn find_hostel(&self, id: Uuid) -> Result<Option<Hostel>> {
        self.hostels().find_by_id(id)
    }
}

impl RoomRepository for Database {
    fn create_room(&self, room: &Room) -> Result<()> {
        self.rooms().create(room)
    }

    fn find_room(&self, id: Uuid) -> Result<Option<Room>> {
        self.rooms().find_by_id(id)
    }

    fn list_rooms_for_hostel(&self, hostel_id: Uuid) -> Result<Vec<Room>> {
        self.rooms().list_for_hostel(hostel_id)
    }
}

impl ResidentRepository for Database {
    fn find_resident(&self, id: Uuid) -> Result<Option<Resident>> {
        self.residents().find_by_id(id)
    }

    fn list_debtors(&self, hostel_id: Uuid) -> Result<Vec<Resident>> {
        self.residents().debtors_for_hostel(hostel_id)
    }
}

impl PaymentRepository for Database {
    fn find_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        self.payments().find_by_reference(reference)
    }

    fn list_payments(&self) -> Result<Vec<Payment>> {
        self.payments().list()
    }

    fn list_payments_for_resident(&self, resident_id: Uuid) -> Result<Vec<Payment>> {
        self.payments().list_for_resident(resident_id)
    }

    fn list_resolutions(&self) -> Result<Vec<Resolution>> {
        self.resolutions().list()
    }
}

impl CalendarYearRepository for Database {
    fn find_calendar_year(&self, id: Uuid) -> Result<Option<CalendarYear>> {
        self.calendar_years().find_by_id(id)
    }

    fn find_active_calendar_year(&self, hostel_id: Uuid) -> Result<Option<CalendarYear>> {
        self.calendar_years().find_active(hostel_id)
    }

    fn list_historical_years(&self, hostel_id: Uuid) -> Result<Vec<CalendarYear>> {
        self.calendar_years().list_inactive(hostel_id)
    }

    fn list_historical_residents(&self, calendar_year_id: Uuid) -> Result<Vec<HistoricalResident>> {
        self.historical_residents().list_for_year(calendar_year_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_file_database_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostel.db");
        let db = Database::open(&path).unwrap();
        assert!(db.schema_version() >= 3);

        // reopening is a no-op
        drop(db);
        let db = Database::open(&path).unwrap();
        assert!(db.schema_version() >= 3);
    }

    #[test]
    fn test_connect_shares_the_migrated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let db = Database::open(&path).unwrap();
        let hostel = Hostel::new("Shared".into(), "Cape Coast".into());
        db.hostels().create(&hostel).unwrap();

        let other = Database::connect(&path).unwrap();
        assert_eq!(other.schema_version(), db.schema_version());
        assert!(other.hostels().find_by_id(hostel.id).unwrap().is_some());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut fx = Fixture::new();
        let resident = fx.resident("rollback@x.com");

        let result: Result<()> = fx.db.transaction(|stores| {
            stores.residents().create(&resident)?;
            Err(Error::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert!(fx.db.residents().find_by_id(resident.id).unwrap().is_none());
    }

    #[test]
    fn test_repository_traits_through_storage() {
        fn active_year_name(storage: &impl Storage, hostel_id: Uuid) -> Option<String> {
            storage
                .find_active_calendar_year(hostel_id)
                .unwrap()
                .map(|y| y.name)
        }

        let fx = Fixture::new();
        assert_eq!(active_year_name(&fx.db, fx.hostel.id).as_deref(), Some("2024/2025"));
        assert_eq!(fx.db.find_room(fx.room.id).unwrap().unwrap().price, dec!(1000));
        assert!(fx.db.list_payments().unwrap().is_empty());
    }
}
