//! Payment storage operations
//!
//! Status transitions are guarded in SQL (`WHERE status = 'PENDING'`) so two
//! writers racing on the same row cannot both apply a transition.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_datetime_opt, parse_decimal, parse_enum, parse_uuid, parse_uuid_opt,
    OptionalExt,
};
use crate::error::Result;
use crate::models::{Payment, PaymentKind, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, amount, resident_id, historical_resident_id, room_id, \
                               calendar_year_id, status, kind, reference, method, created_at, \
                               confirmed_at, deleted_at";

pub struct PaymentStore<'a> {
    conn: &'a Connection,
}

impl<'a> PaymentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, payment), fields(reference = %payment.reference, amount = %payment.amount))]
    pub fn create(&self, payment: &Payment) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO payments ({PAYMENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                payment.id.to_string(),
                payment.amount.to_string(),
                payment.resident_id.map(|id| id.to_string()),
                payment.historical_resident_id.map(|id| id.to_string()),
                payment.room_id.map(|id| id.to_string()),
                payment.calendar_year_id.map(|id| id.to_string()),
                payment.status.as_str(),
                payment.kind.as_str(),
                payment.reference,
                payment.method,
                payment.created_at.to_rfc3339(),
                payment.confirmed_at.map(|t| t.to_rfc3339()),
                payment.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        self.find_one("id = ?1", &id.to_string())
    }

    #[instrument(skip(self))]
    pub fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        self.find_one("reference = ?1", reference)
    }

    /// All live payments, newest first
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE deleted_at IS NULL
             ORDER BY created_at DESC, id"
        ))?;
        let payments = stmt
            .query_map([], payment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    #[instrument(skip(self))]
    pub fn list_for_resident(&self, resident_id: Uuid) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE resident_id = ?1 AND deleted_at IS NULL
             ORDER BY created_at, id"
        ))?;
        let payments = stmt
            .query_map(params![resident_id.to_string()], payment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    #[instrument(skip(self))]
    pub fn count_for_resident(&self, resident_id: Uuid) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE resident_id = ?1 AND deleted_at IS NULL",
            params![resident_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// PENDING -> CONFIRMED. Returns false when another writer got there first.
    #[instrument(skip(self))]
    pub fn confirm_if_pending(
        &self,
        id: Uuid,
        method: Option<&str>,
        confirmed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE payments SET status = 'CONFIRMED', method = COALESCE(?1, method), confirmed_at = ?2
             WHERE id = ?3 AND status = 'PENDING'",
            params![method, confirmed_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Record a verified status on a payment already settled into history
    #[instrument(skip(self))]
    pub fn record_verification(
        &self,
        id: Uuid,
        method: Option<&str>,
        confirmed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE payments SET status = 'CONFIRMED', method = COALESCE(?1, method),
                    confirmed_at = COALESCE(confirmed_at, ?2)
             WHERE id = ?3",
            params![method, confirmed_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Move every payment of a resident onto its archived snapshot
    #[instrument(skip(self))]
    pub fn reassign_to_historical(&self, resident_id: Uuid, historical_id: Uuid) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE payments SET resident_id = NULL, historical_resident_id = ?1 WHERE resident_id = ?2",
            params![historical_id.to_string(), resident_id.to_string()],
        )?;
        Ok(updated)
    }

    /// Attach an orphan to a resident. No-op if it is no longer orphaned.
    #[instrument(skip(self))]
    pub fn link_resident(&self, id: Uuid, resident_id: Uuid) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE payments SET resident_id = ?1
             WHERE id = ?2 AND resident_id IS NULL AND historical_resident_id IS NULL",
            params![resident_id.to_string(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Attach an orphan to an archived resident. No-op if it is no longer orphaned.
    #[instrument(skip(self))]
    pub fn link_historical(&self, id: Uuid, historical_id: Uuid) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE payments SET historical_resident_id = ?1
             WHERE id = ?2 AND resident_id IS NULL AND historical_resident_id IS NULL",
            params![historical_id.to_string(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    pub fn mark_invalid(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE payments SET status = 'INVALID' WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE payments SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_for_resident(&self, resident_id: Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM payments WHERE resident_id = ?1",
            params![resident_id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Live payments linked to neither a resident nor an archived resident.
    /// Already-invalidated orphans are settled and not returned. PENDING
    /// rows come before CONFIRMED ones, newest first within each.
    #[instrument(skip(self))]
    pub fn orphans(&self) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE resident_id IS NULL AND historical_resident_id IS NULL
               AND deleted_at IS NULL AND status != 'INVALID'
             ORDER BY status = 'CONFIRMED', created_at DESC, id DESC"
        ))?;
        let payments = stmt
            .query_map([], payment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    /// Other live, non-INVALID payments with the same amount, room and
    /// calendar year created within `window` of this one, oldest first
    #[instrument(skip(self, payment), fields(reference = %payment.reference))]
    pub fn find_duplicates(&self, payment: &Payment, window: Duration) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE id != ?1 AND room_id IS ?2 AND calendar_year_id IS ?3
               AND deleted_at IS NULL AND status != 'INVALID'
             ORDER BY created_at, id"
        ))?;
        let candidates = stmt
            .query_map(
                params![
                    payment.id.to_string(),
                    payment.room_id.map(|id| id.to_string()),
                    payment.calendar_year_id.map(|id| id.to_string()),
                ],
                payment_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let window = window.num_seconds();
        Ok(candidates
            .into_iter()
            .filter(|c| {
                c.amount == payment.amount
                    && (c.created_at - payment.created_at).num_seconds().abs() <= window
            })
            .collect())
    }

    fn find_one(&self, predicate: &str, value: &str) -> Result<Option<Payment>> {
        let payment = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {predicate} AND deleted_at IS NULL"
                ),
                params![value],
                payment_from_row,
            )
            .optional()?;
        Ok(payment)
    }
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        amount: parse_decimal(&row.get::<_, String>(1)?)?,
        resident_id: parse_uuid_opt(row.get(2)?)?,
        historical_resident_id: parse_uuid_opt(row.get(3)?)?,
        room_id: parse_uuid_opt(row.get(4)?)?,
        calendar_year_id: parse_uuid_opt(row.get(5)?)?,
        status: parse_enum(&row.get::<_, String>(6)?, PaymentStatus::from_str)?,
        kind: parse_enum(&row.get::<_, String>(7)?, PaymentKind::from_str)?,
        reference: row.get(8)?,
        method: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        confirmed_at: parse_datetime_opt(row.get(11)?)?,
        deleted_at: parse_datetime_opt(row.get(12)?)?,
    })
}
