//! Hostel storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_enum, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Hostel, PublishState};

const HOSTEL_COLUMNS: &str =
    "id, name, address, is_verified, publish_state, created_at, deleted_at";

pub struct HostelStore<'a> {
    conn: &'a Connection,
}

impl<'a> HostelStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new hostel
    #[instrument(skip(self, hostel), fields(hostel_id = %hostel.id))]
    pub fn create(&self, hostel: &Hostel) -> Result<()> {
        self.conn.execute(
            "INSERT INTO hostels (id, name, address, is_verified, publish_state, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hostel.id.to_string(),
                hostel.name,
                hostel.address,
                hostel.is_verified as i32,
                hostel.publish_state.as_str(),
                hostel.created_at.to_rfc3339(),
                hostel.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Find a hostel that has not been soft-deleted
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Hostel>> {
        let hostel = self
            .conn
            .query_row(
                &format!("SELECT {HOSTEL_COLUMNS} FROM hostels WHERE id = ?1 AND deleted_at IS NULL"),
                params![id.to_string()],
                hostel_from_row,
            )
            .optional()?;
        Ok(hostel)
    }
}

fn hostel_from_row(row: &Row<'_>) -> rusqlite::Result<Hostel> {
    Ok(Hostel {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        address: row.get(2)?,
        is_verified: row.get::<_, i32>(3)? != 0,
        publish_state: parse_enum(&row.get::<_, String>(4)?, PublishState::from_str)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        deleted_at: parse_datetime_opt(row.get(6)?)?,
    })
}
