//! Room storage operations
//!
//! Occupancy counters are always recomputed from the residents table rather
//! than incremented, so a retried write cannot drift the count.

use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_datetime_opt, parse_decimal, parse_enum, parse_uuid, OptionalExt,
};
use crate::error::{Error, Result};
use crate::models::{Room, RoomGender, RoomStatus};

const ROOM_COLUMNS: &str = "id, hostel_id, number, floor, block, max_cap, current_resident_count, \
                            price, status, gender, created_at, deleted_at";

const COUNT_RESIDENTS: &str =
    "(SELECT COUNT(*) FROM residents WHERE residents.room_id = rooms.id AND residents.deleted_at IS NULL)";

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, room), fields(room_id = %room.id, hostel_id = %room.hostel_id))]
    pub fn create(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "INSERT INTO rooms (id, hostel_id, number, floor, block, max_cap, current_resident_count,
                                price, status, gender, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                room.id.to_string(),
                room.hostel_id.to_string(),
                room.number,
                room.floor,
                room.block,
                room.max_cap,
                room.current_resident_count,
                room.price.to_string(),
                room.status.as_str(),
                room.gender.as_str(),
                room.created_at.to_rfc3339(),
                room.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1 AND deleted_at IS NULL"),
                params![id.to_string()],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// Fetch a room or fail with `NotFound`
    pub fn get(&self, id: Uuid) -> Result<Room> {
        self.find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("Room {id}")))
    }

    #[instrument(skip(self))]
    pub fn list_for_hostel(&self, hostel_id: Uuid) -> Result<Vec<Room>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms
             WHERE hostel_id = ?1 AND deleted_at IS NULL
             ORDER BY number"
        ))?;
        let rooms = stmt
            .query_map(params![hostel_id.to_string()], room_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    /// Change the listed price. Residents keep the price they registered at.
    #[instrument(skip(self))]
    pub fn update_price(&self, id: Uuid, price: Decimal) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET price = ?1 WHERE id = ?2",
            params![price.to_string(), id.to_string()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_status(&self, id: Uuid, status: RoomStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    /// Recount residents and mark the room OCCUPIED once it is full.
    /// Never moves a room back to AVAILABLE.
    #[instrument(skip(self))]
    pub fn refresh_occupancy(&self, id: Uuid) -> Result<Room> {
        self.recount(id)?;
        self.conn.execute(
            "UPDATE rooms SET status = 'OCCUPIED'
             WHERE id = ?1 AND current_resident_count >= max_cap",
            params![id.to_string()],
        )?;
        self.get(id)
    }

    /// Vacancy path: recount and reopen a room that is no longer full
    #[instrument(skip(self))]
    pub fn release(&self, id: Uuid) -> Result<Room> {
        self.recount(id)?;
        self.conn.execute(
            "UPDATE rooms SET status = 'AVAILABLE'
             WHERE id = ?1 AND status = 'OCCUPIED' AND current_resident_count < max_cap",
            params![id.to_string()],
        )?;
        self.get(id)
    }

    /// Reset every room of a hostel to AVAILABLE with a fresh count
    #[instrument(skip(self))]
    pub fn reset_for_hostel(&self, hostel_id: Uuid) -> Result<usize> {
        let updated = self.conn.execute(
            &format!(
                "UPDATE rooms SET status = 'AVAILABLE', current_resident_count = {COUNT_RESIDENTS}
                 WHERE hostel_id = ?1 AND deleted_at IS NULL"
            ),
            params![hostel_id.to_string()],
        )?;
        Ok(updated)
    }

    fn recount(&self, id: Uuid) -> Result<()> {
        // CHECK (current_resident_count <= max_cap) rejects an overfull room here
        self.conn.execute(
            &format!("UPDATE rooms SET current_resident_count = {COUNT_RESIDENTS} WHERE id = ?1"),
            params![id.to_string()],
        )?;
        Ok(())
    }
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        hostel_id: parse_uuid(&row.get::<_, String>(1)?)?,
        number: row.get(2)?,
        floor: row.get(3)?,
        block: row.get(4)?,
        max_cap: row.get(5)?,
        current_resident_count: row.get(6)?,
        price: parse_decimal(&row.get::<_, String>(7)?)?,
        status: parse_enum(&row.get::<_, String>(8)?, RoomStatus::from_str)?,
        gender: parse_enum(&row.get::<_, String>(9)?, RoomGender::from_str)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        deleted_at: parse_datetime_opt(row.get(11)?)?,
    })
}
