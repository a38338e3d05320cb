//! Historical resident storage operations
//!
//! Rows are insert-only; the only removal path is deleting their calendar year.

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_decimal, parse_uuid, parse_uuid_opt, OptionalExt};
use crate::error::Result;
use crate::models::HistoricalResident;

const HISTORICAL_COLUMNS: &str = "id, resident_id, hostel_id, room_id, calendar_year_id, amount_paid, \
                                  room_price, name, email, phone, course, archived_at";

pub struct HistoricalResidentStore<'a> {
    conn: &'a Connection,
}

impl<'a> HistoricalResidentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, record), fields(resident_id = %record.resident_id, calendar_year_id = %record.calendar_year_id))]
    pub fn create(&self, record: &HistoricalResident) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO historical_residents ({HISTORICAL_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id.to_string(),
                record.resident_id.to_string(),
                record.hostel_id.to_string(),
                record.room_id.map(|id| id.to_string()),
                record.calendar_year_id.to_string(),
                record.amount_paid.to_string(),
                record.room_price.to_string(),
                record.name,
                record.email,
                record.phone,
                record.course,
                record.archived_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<HistoricalResident>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {HISTORICAL_COLUMNS} FROM historical_residents WHERE id = ?1"),
                params![id.to_string()],
                historical_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Earliest snapshot archived from a room under a calendar year
    #[instrument(skip(self))]
    pub fn find_by_room_and_year(
        &self,
        room_id: Uuid,
        calendar_year_id: Uuid,
    ) -> Result<Option<HistoricalResident>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {HISTORICAL_COLUMNS} FROM historical_residents
                     WHERE room_id = ?1 AND calendar_year_id = ?2
                     ORDER BY archived_at, id LIMIT 1"
                ),
                params![room_id.to_string(), calendar_year_id.to_string()],
                historical_from_row,
            )
            .optional()?;
        Ok(record)
    }

    #[instrument(skip(self))]
    pub fn list_for_year(&self, calendar_year_id: Uuid) -> Result<Vec<HistoricalResident>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HISTORICAL_COLUMNS} FROM historical_residents
             WHERE calendar_year_id = ?1 ORDER BY archived_at, id"
        ))?;
        let records = stmt
            .query_map(params![calendar_year_id.to_string()], historical_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    #[instrument(skip(self))]
    pub fn delete_for_year(&self, calendar_year_id: Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM historical_residents WHERE calendar_year_id = ?1",
            params![calendar_year_id.to_string()],
        )?;
        Ok(deleted)
    }
}

fn historical_from_row(row: &Row<'_>) -> rusqlite::Result<HistoricalResident> {
    Ok(HistoricalResident {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        resident_id: parse_uuid(&row.get::<_, String>(1)?)?,
        hostel_id: parse_uuid(&row.get::<_, String>(2)?)?,
        room_id: parse_uuid_opt(row.get(3)?)?,
        calendar_year_id: parse_uuid(&row.get::<_, String>(4)?)?,
        amount_paid: parse_decimal(&row.get::<_, String>(5)?)?,
        room_price: parse_decimal(&row.get::<_, String>(6)?)?,
        name: row.get(7)?,
        email: row.get(8)?,
        phone: row.get(9)?,
        course: row.get(10)?,
        archived_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}
