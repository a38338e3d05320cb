//! Resident storage operations

use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_datetime_opt, parse_decimal, parse_decimal_opt, parse_enum, parse_uuid,
    parse_uuid_opt, OptionalExt,
};
use crate::error::{Error, Result};
use crate::models::{Gender, Resident};

const RESIDENT_COLUMNS: &str = "id, hostel_id, room_id, calendar_year_id, name, student_id, email, \
                                phone, course, gender, emergency_contact_name, emergency_contact_phone, \
                                relationship, room_price, amount_paid, balance_owed, access_code, \
                                room_assigned, created_at, deleted_at";

pub struct ResidentStore<'a> {
    conn: &'a Connection,
}

impl<'a> ResidentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, resident), fields(resident_id = %resident.id, hostel_id = %resident.hostel_id))]
    pub fn create(&self, resident: &Resident) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO residents ({RESIDENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                resident.id.to_string(),
                resident.hostel_id.to_string(),
                resident.room_id.map(|id| id.to_string()),
                resident.calendar_year_id.map(|id| id.to_string()),
                resident.name,
                resident.student_id,
                resident.email,
                resident.phone,
                resident.course,
                resident.gender.as_str(),
                resident.emergency_contact_name,
                resident.emergency_contact_phone,
                resident.relationship,
                resident.room_price.map(|p| p.to_string()),
                resident.amount_paid.to_string(),
                resident.balance_owed.map(|b| b.to_string()),
                resident.access_code,
                resident.room_assigned as i32,
                resident.created_at.to_rfc3339(),
                resident.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Resident>> {
        let resident = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = ?1 AND deleted_at IS NULL"
                ),
                params![id.to_string()],
                resident_from_row,
            )
            .optional()?;
        Ok(resident)
    }

    /// Fetch a resident or fail with `NotFound`
    pub fn get(&self, id: Uuid) -> Result<Resident> {
        self.find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("Resident {id}")))
    }

    /// Email uniqueness spans soft-deleted rows too
    #[instrument(skip(self))]
    pub fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM residents WHERE email = ?1 AND id IS NOT ?2",
            params![email, except.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Write the editable profile fields. Money columns are untouched.
    #[instrument(skip(self, resident), fields(resident_id = %resident.id))]
    pub fn update_profile(&self, resident: &Resident) -> Result<()> {
        self.conn.execute(
            "UPDATE residents SET name = ?1, student_id = ?2, course = ?3, phone = ?4, email = ?5,
                    emergency_contact_name = ?6, emergency_contact_phone = ?7, relationship = ?8
             WHERE id = ?9",
            params![
                resident.name,
                resident.student_id,
                resident.course,
                resident.phone,
                resident.email,
                resident.emergency_contact_name,
                resident.emergency_contact_phone,
                resident.relationship,
                resident.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Point a resident at a room with a freshly snapshotted price
    #[instrument(skip(self))]
    pub fn update_room(&self, id: Uuid, room_id: Uuid, room_price: Decimal) -> Result<()> {
        self.conn.execute(
            "UPDATE residents SET room_id = ?1, room_price = ?2 WHERE id = ?3",
            params![room_id.to_string(), room_price.to_string(), id.to_string()],
        )?;
        Ok(())
    }

    /// Persist the outcome of a confirmed payment
    #[instrument(skip(self, resident), fields(resident_id = %resident.id, amount_paid = %resident.amount_paid))]
    pub fn update_billing(&self, resident: &Resident) -> Result<()> {
        self.conn.execute(
            "UPDATE residents SET amount_paid = ?1, balance_owed = ?2, access_code = ?3, room_assigned = ?4
             WHERE id = ?5",
            params![
                resident.amount_paid.to_string(),
                resident.balance_owed.map(|b| b.to_string()),
                resident.access_code,
                resident.room_assigned as i32,
                resident.id.to_string(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn count_in_room(&self, room_id: Uuid) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM residents WHERE room_id = ?1 AND deleted_at IS NULL",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Earliest-registered resident currently in a room
    #[instrument(skip(self))]
    pub fn first_in_room(&self, room_id: Uuid) -> Result<Option<Resident>> {
        let resident = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RESIDENT_COLUMNS} FROM residents
                     WHERE room_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at, id LIMIT 1"
                ),
                params![room_id.to_string()],
                resident_from_row,
            )
            .optional()?;
        Ok(resident)
    }

    /// Residents holding a room, in registration order
    #[instrument(skip(self))]
    pub fn list_assigned_for_hostel(&self, hostel_id: Uuid) -> Result<Vec<Resident>> {
        self.list_where(
            "hostel_id = ?1 AND room_assigned = 1 AND deleted_at IS NULL",
            hostel_id,
        )
    }

    /// Residents with an outstanding reported balance
    #[instrument(skip(self))]
    pub fn debtors_for_hostel(&self, hostel_id: Uuid) -> Result<Vec<Resident>> {
        let residents = self.list_where(
            "hostel_id = ?1 AND balance_owed IS NOT NULL AND deleted_at IS NULL",
            hostel_id,
        )?;
        Ok(residents
            .into_iter()
            .filter(|r| r.balance_owed.is_some_and(|b| b > Decimal::ZERO))
            .collect())
    }

    /// Move residents that never got a room into another calendar year
    #[instrument(skip(self))]
    pub fn retag_unassigned(&self, hostel_id: Uuid, calendar_year_id: Uuid) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE residents SET calendar_year_id = ?1
             WHERE hostel_id = ?2 AND room_assigned = 0 AND deleted_at IS NULL",
            params![calendar_year_id.to_string(), hostel_id.to_string()],
        )?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM residents WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    fn list_where(&self, predicate: &str, hostel_id: Uuid) -> Result<Vec<Resident>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE {predicate} ORDER BY created_at, id"
        ))?;
        let residents = stmt
            .query_map(params![hostel_id.to_string()], resident_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(residents)
    }
}

fn resident_from_row(row: &Row<'_>) -> rusqlite::Result<Resident> {
    Ok(Resident {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        hostel_id: parse_uuid(&row.get::<_, String>(1)?)?,
        room_id: parse_uuid_opt(row.get(2)?)?,
        calendar_year_id: parse_uuid_opt(row.get(3)?)?,
        name: row.get(4)?,
        student_id: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        course: row.get(8)?,
        gender: parse_enum(&row.get::<_, String>(9)?, Gender::from_str)?,
        emergency_contact_name: row.get(10)?,
        emergency_contact_phone: row.get(11)?,
        relationship: row.get(12)?,
        room_price: parse_decimal_opt(row.get(13)?)?,
        amount_paid: parse_decimal(&row.get::<_, String>(14)?)?,
        balance_owed: parse_decimal_opt(row.get(15)?)?,
        access_code: row.get(16)?,
        room_assigned: row.get::<_, i32>(17)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(18)?)?,
        deleted_at: parse_datetime_opt(row.get(19)?)?,
    })
}
