//! Calendar year storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::CalendarYear;

const YEAR_COLUMNS: &str = "id, hostel_id, name, start_date, end_date, is_active";

pub struct CalendarYearStore<'a> {
    conn: &'a Connection,
}

impl<'a> CalendarYearStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a calendar year. Fails on the one-active-per-hostel index
    /// if another active year exists.
    #[instrument(skip(self, year), fields(hostel_id = %year.hostel_id, name = %year.name))]
    pub fn create(&self, year: &CalendarYear) -> Result<()> {
        self.conn.execute(
            "INSERT INTO calendar_years (id, hostel_id, name, start_date, end_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                year.id.to_string(),
                year.hostel_id.to_string(),
                year.name,
                year.start_date.to_rfc3339(),
                year.end_date.map(|t| t.to_rfc3339()),
                year.is_active as i32,
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<CalendarYear>> {
        let year = self
            .conn
            .query_row(
                &format!("SELECT {YEAR_COLUMNS} FROM calendar_years WHERE id = ?1"),
                params![id.to_string()],
                year_from_row,
            )
            .optional()?;
        Ok(year)
    }

    /// The hostel's active year, if any
    #[instrument(skip(self))]
    pub fn find_active(&self, hostel_id: Uuid) -> Result<Option<CalendarYear>> {
        let year = self
            .conn
            .query_row(
                &format!(
                    "SELECT {YEAR_COLUMNS} FROM calendar_years WHERE hostel_id = ?1 AND is_active = 1"
                ),
                params![hostel_id.to_string()],
                year_from_row,
            )
            .optional()?;
        Ok(year)
    }

    /// Closed years, newest first
    #[instrument(skip(self))]
    pub fn list_inactive(&self, hostel_id: Uuid) -> Result<Vec<CalendarYear>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {YEAR_COLUMNS} FROM calendar_years
             WHERE hostel_id = ?1 AND is_active = 0
             ORDER BY start_date DESC"
        ))?;
        let years = stmt
            .query_map(params![hostel_id.to_string()], year_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(years)
    }

    /// Close an active year. Returns false if it was not active.
    #[instrument(skip(self))]
    pub fn deactivate(&self, id: Uuid, end_date: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE calendar_years SET is_active = 0, end_date = ?1 WHERE id = ?2 AND is_active = 1",
            params![end_date.to_rfc3339(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    pub fn rename(&self, id: Uuid, name: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE calendar_years SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM calendar_years WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }
}

fn year_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarYear> {
    Ok(CalendarYear {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        hostel_id: parse_uuid(&row.get::<_, String>(1)?)?,
        name: row.get(2)?,
        start_date: parse_datetime(&row.get::<_, String>(3)?)?,
        end_date: parse_datetime_opt(row.get(4)?)?,
        is_active: row.get::<_, i32>(5)? != 0,
    })
}
