//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS hostels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                is_verified INTEGER NOT NULL DEFAULT 0,
                publish_state TEXT NOT NULL DEFAULT 'UNPUBLISHED',
                created_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE TABLE IF NOT EXISTS calendar_years (
                id TEXT PRIMARY KEY,
                hostel_id TEXT NOT NULL,
                name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                is_active INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (hostel_id) REFERENCES hostels(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                hostel_id TEXT NOT NULL,
                number TEXT NOT NULL,
                floor TEXT,
                block TEXT,
                max_cap INTEGER NOT NULL CHECK (max_cap > 0),
                current_resident_count INTEGER NOT NULL DEFAULT 0
                    CHECK (current_resident_count <= max_cap),
                price TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'AVAILABLE',
                gender TEXT NOT NULL DEFAULT 'MIX',
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY (hostel_id) REFERENCES hostels(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS residents (
                id TEXT PRIMARY KEY,
                hostel_id TEXT NOT NULL,
                room_id TEXT,
                calendar_year_id TEXT,
                name TEXT NOT NULL,
                student_id TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                course TEXT NOT NULL,
                gender TEXT NOT NULL,
                emergency_contact_name TEXT NOT NULL,
                emergency_contact_phone TEXT NOT NULL,
                relationship TEXT NOT NULL,
                room_price TEXT,
                amount_paid TEXT NOT NULL DEFAULT '0',
                balance_owed TEXT,
                access_code TEXT,
                room_assigned INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY (hostel_id) REFERENCES hostels(id) ON DELETE CASCADE,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE SET NULL,
                FOREIGN KEY (calendar_year_id) REFERENCES calendar_years(id) ON DELETE SET NULL
            );

            -- Snapshots are written once by archival and never updated
            CREATE TABLE IF NOT EXISTS historical_residents (
                id TEXT PRIMARY KEY,
                resident_id TEXT NOT NULL,
                hostel_id TEXT NOT NULL,
                room_id TEXT,
                calendar_year_id TEXT NOT NULL,
                amount_paid TEXT NOT NULL,
                room_price TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                course TEXT NOT NULL,
                archived_at TEXT NOT NULL,
                FOREIGN KEY (hostel_id) REFERENCES hostels(id) ON DELETE CASCADE,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE SET NULL,
                FOREIGN KEY (calendar_year_id) REFERENCES calendar_years(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                amount TEXT NOT NULL,
                resident_id TEXT,
                historical_resident_id TEXT,
                room_id TEXT,
                calendar_year_id TEXT,
                status TEXT NOT NULL DEFAULT 'PENDING',
                kind TEXT NOT NULL DEFAULT 'initial',
                reference TEXT NOT NULL UNIQUE,
                method TEXT,
                created_at TEXT NOT NULL,
                confirmed_at TEXT,
                deleted_at TEXT,
                CHECK (resident_id IS NULL OR historical_resident_id IS NULL),
                FOREIGN KEY (resident_id) REFERENCES residents(id) ON DELETE SET NULL,
                FOREIGN KEY (historical_resident_id) REFERENCES historical_residents(id) ON DELETE SET NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE SET NULL,
                FOREIGN KEY (calendar_year_id) REFERENCES calendar_years(id) ON DELETE SET NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes and the single-active-year constraint",
        sql: r#"
            -- One active calendar year per hostel
            CREATE UNIQUE INDEX IF NOT EXISTS idx_calendar_years_one_active
                ON calendar_years(hostel_id) WHERE is_active = 1;

            CREATE INDEX IF NOT EXISTS idx_rooms_hostel ON rooms(hostel_id);
            CREATE INDEX IF NOT EXISTS idx_residents_hostel ON residents(hostel_id);
            CREATE INDEX IF NOT EXISTS idx_residents_room ON residents(room_id);
            CREATE INDEX IF NOT EXISTS idx_historical_residents_year
                ON historical_residents(calendar_year_id);
            CREATE INDEX IF NOT EXISTS idx_payments_resident ON payments(resident_id);
            CREATE INDEX IF NOT EXISTS idx_payments_historical
                ON payments(historical_resident_id);
            CREATE INDEX IF NOT EXISTS idx_payments_room_year
                ON payments(room_id, calendar_year_id);
        "#,
    },
    Migration {
        version: 3,
        description: "Add payment_resolutions audit log for the orphan sweep",
        sql: r#"
            CREATE TABLE IF NOT EXISTS payment_resolutions (
                id TEXT PRIMARY KEY,
                payment_id TEXT NOT NULL,
                reference TEXT NOT NULL,
                action TEXT NOT NULL,
                target_id TEXT,
                rationale TEXT NOT NULL,
                resolved_at TEXT NOT NULL,
                FOREIGN KEY (payment_id) REFERENCES payments(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_payment_resolutions_payment
                ON payment_resolutions(payment_id);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
pub(crate) fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_second_active_year_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO hostels (id, name, address, created_at) VALUES ('h1', 'H', 'A', 'now');
             INSERT INTO calendar_years (id, hostel_id, name, start_date, is_active)
                 VALUES ('y1', 'h1', '2024', 'now', 1);",
        )
        .unwrap();

        let second = conn.execute(
            "INSERT INTO calendar_years (id, hostel_id, name, start_date, is_active)
             VALUES ('y2', 'h1', '2025', 'now', 1)",
            [],
        );
        assert!(second.is_err());
    }
}
