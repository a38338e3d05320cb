//! Archival of a resident into a historical snapshot

use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{HistoricalResident, Resident};
use crate::storage::Stores;

/// Snapshot `resident` under `calendar_year_id`, move its payments onto the
/// snapshot and delete the resident row. Must run inside a transaction.
pub fn archive_resident(
    s: Stores<'_>,
    resident: &Resident,
    calendar_year_id: Uuid,
) -> Result<HistoricalResident> {
    let record = HistoricalResident::snapshot_of(resident, calendar_year_id);
    s.historical_residents().create(&record)?;
    let moved = s.payments().reassign_to_historical(resident.id, record.id)?;
    s.residents().delete(resident.id)?;

    info!(
        resident_id = %resident.id,
        historical_resident_id = %record.id,
        payments = moved,
        "Resident archived"
    );
    Ok(record)
}
