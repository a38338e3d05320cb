//! Orphan-sweep audit log

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime, parse_enum, parse_uuid, parse_uuid_opt};
use crate::error::Result;
use crate::models::{Resolution, ResolutionAction};

pub struct ResolutionStore<'a> {
    conn: &'a Connection,
}

impl<'a> ResolutionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, resolution), fields(reference = %resolution.reference, action = resolution.action.as_str()))]
    pub fn create(&self, resolution: &Resolution) -> Result<()> {
        self.conn.execute(
            "INSERT INTO payment_resolutions (id, payment_id, reference, action, target_id, rationale, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                resolution.id.to_string(),
                resolution.payment_id.to_string(),
                resolution.reference,
                resolution.action.as_str(),
                resolution.target_id.map(|id| id.to_string()),
                resolution.rationale,
                resolution.resolved_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Full audit trail, oldest first
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Resolution>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, payment_id, reference, action, target_id, rationale, resolved_at
             FROM payment_resolutions ORDER BY resolved_at, id",
        )?;
        let resolutions = stmt
            .query_map([], resolution_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(resolutions)
    }
}

fn resolution_from_row(row: &Row<'_>) -> rusqlite::Result<Resolution> {
    Ok(Resolution {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        payment_id: parse_uuid(&row.get::<_, String>(1)?)?,
        reference: row.get(2)?,
        action: parse_enum(&row.get::<_, String>(3)?, ResolutionAction::from_str)?,
        target_id: parse_uuid_opt(row.get(4)?)?,
        rationale: row.get(5)?,
        resolved_at: parse_datetime(&row.get::<_, String>(6)?)?,
    })
}
