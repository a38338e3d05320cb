//! Calendar-year rollover engine
//!
//! Closing a year archives every resident holding a room, re-points their
//! payments at the archived snapshots and frees the hostel's rooms. It runs
//! in a single transaction: either the whole hostel rolls over or nothing
//! changes.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::archive;
use crate::error::{Error, Result};
use crate::models::{round_money, CalendarYear, FinancialReport};
use crate::storage::Database;

/// What a rollover did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloverSummary {
    pub hostel_id: Uuid,
    pub closed_year_id: Option<Uuid>,
    pub new_year: CalendarYear,
    pub archived_residents: usize,
    /// Registered residents without a paid room, moved into the new year
    pub carried_over: usize,
    pub rooms_reset: usize,
}

/// Close the active year of a hostel and open `name` in its place
#[instrument(skip(db))]
pub fn start_new_calendar_year(
    db: &mut Database,
    hostel_id: Uuid,
    name: &str,
) -> Result<RolloverSummary> {
    let name = validate_name(name)?;

    let summary = db.transaction(|s| {
        s.hostels()
            .find_by_id(hostel_id)?
            .ok_or_else(|| Error::NotFound(format!("Hostel {hostel_id}")))?;

        let closed = s.calendar_years().find_active(hostel_id)?;
        if let Some(year) = &closed {
            s.calendar_years().deactivate(year.id, Utc::now())?;
        }

        let new_year = CalendarYear::open(hostel_id, name);
        s.calendar_years().create(&new_year)?;

        let residents = s.residents().list_assigned_for_hostel(hostel_id)?;
        for resident in &residents {
            archive::archive_resident(s, resident, new_year.id)?;
        }
        let carried_over = s.residents().retag_unassigned(hostel_id, new_year.id)?;
        let rooms_reset = s.rooms().reset_for_hostel(hostel_id)?;

        Ok(RolloverSummary {
            hostel_id,
            closed_year_id: closed.map(|y| y.id),
            new_year,
            archived_residents: residents.len(),
            carried_over,
            rooms_reset,
        })
    })?;

    info!(
        new_year_id = %summary.new_year.id,
        archived = summary.archived_residents,
        rooms_reset = summary.rooms_reset,
        "Calendar year rolled over"
    );
    Ok(summary)
}

/// The hostel's active year
pub fn current_calendar_year(db: &Database, hostel_id: Uuid) -> Result<CalendarYear> {
    db.calendar_years()
        .find_active(hostel_id)?
        .ok_or_else(|| Error::NotFound(format!("Active calendar year for hostel {hostel_id}")))
}

/// Closed years, newest first
pub fn historical_calendar_years(db: &Database, hostel_id: Uuid) -> Result<Vec<CalendarYear>> {
    db.calendar_years().list_inactive(hostel_id)
}

#[instrument(skip(db))]
pub fn rename_calendar_year(db: &mut Database, id: Uuid, name: &str) -> Result<CalendarYear> {
    let name = validate_name(name)?;
    db.transaction(|s| {
        if !s.calendar_years().rename(id, &name)? {
            return Err(Error::NotFound(format!("Calendar year {id}")));
        }
        s.calendar_years()
            .find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("Calendar year {id}")))
    })
}

/// Revenue recorded against the residents archived under a year
#[instrument(skip(db))]
pub fn financial_report(db: &Database, id: Uuid) -> Result<FinancialReport> {
    db.calendar_years()
        .find_by_id(id)?
        .ok_or_else(|| Error::NotFound(format!("Calendar year {id}")))?;

    let records = db.historical_residents().list_for_year(id)?;
    let total_revenue: Decimal = records.iter().map(|r| r.amount_paid).sum();
    let count = records.len() as u32;
    let average = if count == 0 {
        Decimal::ZERO
    } else {
        round_money(total_revenue / Decimal::from(count))
    };

    Ok(FinancialReport {
        calendar_year_id: id,
        total_revenue,
        historical_residents: count,
        average_revenue_per_resident: average,
    })
}

/// Delete a closed year with its archived residents. The active year
/// cannot be deleted.
#[instrument(skip(db))]
pub fn delete_calendar_year(db: &mut Database, id: Uuid) -> Result<()> {
    let removed = db.transaction(|s| {
        let year = s
            .calendar_years()
            .find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("Calendar year {id}")))?;
        if year.is_active {
            return Err(Error::ActiveCalendarYear);
        }

        let removed = s.historical_residents().delete_for_year(id)?;
        s.calendar_years().delete(id)?;
        s.rooms().reset_for_hostel(year.hostel_id)?;
        Ok(removed)
    })?;

    info!(calendar_year_id = %id, historical_residents = removed, "Calendar year deleted");
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Calendar year name can't be empty".into()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::BillingPolicy;
    use crate::error::ErrorKind;
    use crate::ledger::{Ledger, PaymentRequest};
    use crate::models::{Amount, RoomStatus};
    use crate::storage::CalendarYearRepository;
    use crate::test_support::{FakeGateway, Fixture, RecordingNotifier};
    use rust_decimal_macros::dec;

    /// Register a resident and confirm one payment for them
    fn paid_resident(
        fx: &mut Fixture,
        ledger: &Ledger<'_>,
        email: &str,
        amount: Decimal,
    ) -> crate::models::Resident {
        let resident = fx.register(email).unwrap();
        let req = PaymentRequest {
            room_id: fx.room.id,
            resident_id: resident.id,
            amount: Amount::new(amount).unwrap(),
        };
        let checkout = ledger.initiate_payment(&mut fx.db, &req).unwrap();
        ledger.confirm_payment(&mut fx.db, &checkout.reference).unwrap();
        fx.db.residents().get(resident.id).unwrap()
    }

    #[test]
    fn test_rollover_archives_everyone_with_a_room() {
        let mut fx = Fixture::new();
        let (gw, mail) = (FakeGateway::default(), RecordingNotifier::default());
        let ledger = Ledger::new(&gw, &mail, BillingPolicy::default());
        let a = paid_resident(&mut fx, &ledger, "a@x.com", dec!(1000));
        let b = paid_resident(&mut fx, &ledger, "b@x.com", dec!(700));
        assert_eq!(fx.db.rooms().get(fx.room.id).unwrap().status, RoomStatus::Occupied);

        let summary = start_new_calendar_year(&mut fx.db, fx.hostel.id, "2025/2026").unwrap();
        assert_eq!(summary.closed_year_id, Some(fx.year.id));
        assert_eq!(summary.archived_residents, 2);

        for resident in [&a, &b] {
            assert!(fx.db.residents().find_by_id(resident.id).unwrap().is_none());
        }
        let archived = fx.db.historical_residents().list_for_year(summary.new_year.id).unwrap();
        assert_eq!(archived.len(), 2);
        for record in &archived {
            let payments: Vec<_> = fx
                .db
                .payments()
                .list()
                .unwrap()
                .into_iter()
                .filter(|p| p.historical_resident_id == Some(record.id))
                .collect();
            assert_eq!(payments.len(), 1);
            assert!(payments[0].resident_id.is_none());
        }
        let b_record = archived.iter().find(|r| r.resident_id == b.id).unwrap();
        assert_eq!(b_record.amount_paid, dec!(700));
        assert_eq!(b_record.room_price, dec!(1000));

        let room = fx.db.rooms().get(fx.room.id).unwrap();
        assert_eq!(room.status, RoomStatus::Available);
        assert_eq!(room.current_resident_count, 0);

        let closed = fx.db.find_calendar_year(fx.year.id).unwrap().unwrap();
        assert!(!closed.is_active);
        assert!(closed.end_date.is_some());
    }

    #[test]
    fn test_unpaid_residents_carry_over() {
        let mut fx = Fixture::new();
        let waiting = fx.register("wait@x.com").unwrap();

        let summary = start_new_calendar_year(&mut fx.db, fx.hostel.id, "2025/2026").unwrap();
        assert_eq!(summary.archived_residents, 0);
        assert_eq!(summary.carried_over, 1);

        let waiting = fx.db.residents().get(waiting.id).unwrap();
        assert_eq!(waiting.calendar_year_id, Some(summary.new_year.id));
        assert_eq!(fx.db.rooms().get(fx.room.id).unwrap().current_resident_count, 1);
    }

    #[test]
    fn test_only_one_active_year_after_repeated_rollovers() {
        let mut fx = Fixture::new();
        for name in ["Y2", "Y3", "Y4"] {
            start_new_calendar_year(&mut fx.db, fx.hostel.id, name).unwrap();
        }
        let active: u32 = fx
            .db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM calendar_years WHERE hostel_id = ?1 AND is_active = 1",
                [fx.hostel.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(active, 1);
        assert_eq!(current_calendar_year(&fx.db, fx.hostel.id).unwrap().name, "Y4");

        let history = historical_calendar_years(&fx.db, fx.hostel.id).unwrap();
        let names: Vec<_> = history.iter().map(|y| y.name.as_str()).collect();
        assert_eq!(names, ["Y3", "Y2", "2024/2025"]);
    }

    #[test]
    fn test_rollover_failure_changes_nothing() {
        let mut fx = Fixture::new();
        let (gw, mail) = (FakeGateway::default(), RecordingNotifier::default());
        let ledger = Ledger::new(&gw, &mail, BillingPolicy::default());
        let keep = paid_resident(&mut fx, &ledger, "keep@x.com", dec!(1000));
        let boom = paid_resident(&mut fx, &ledger, "boom@x.com", dec!(1000));
        fx.db
            .conn()
            .execute_batch(
                "CREATE TRIGGER fail_archive BEFORE INSERT ON historical_residents
                 WHEN NEW.email = 'boom@x.com'
                 BEGIN SELECT RAISE(ABORT, 'archive failed'); END;",
            )
            .unwrap();

        let err = start_new_calendar_year(&mut fx.db, fx.hostel.id, "2025/2026").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let active = current_calendar_year(&fx.db, fx.hostel.id).unwrap();
        assert_eq!(active.id, fx.year.id);
        assert!(fx.db.residents().find_by_id(keep.id).unwrap().is_some());
        assert!(fx.db.residents().find_by_id(boom.id).unwrap().is_some());
        assert_eq!(fx.db.payments().list_for_resident(keep.id).unwrap().len(), 1);
        assert_eq!(fx.db.rooms().get(fx.room.id).unwrap().status, RoomStatus::Occupied);
        assert!(historical_calendar_years(&fx.db, fx.hostel.id).unwrap().is_empty());
    }

    #[test]
    fn test_rollover_requires_name_and_hostel() {
        let mut fx = Fixture::new();
        assert_eq!(
            start_new_calendar_year(&mut fx.db, fx.hostel.id, "  ")
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            start_new_calendar_year(&mut fx.db, Uuid::new_v4(), "Y2")
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_financial_report() {
        let mut fx = Fixture::new();
        let (gw, mail) = (FakeGateway::default(), RecordingNotifier::default());
        let ledger = Ledger::new(&gw, &mail, BillingPolicy::default());
        paid_resident(&mut fx, &ledger, "r1@x.com", dec!(1000));
        paid_resident(&mut fx, &ledger, "r2@x.com", dec!(700));
        let summary = start_new_calendar_year(&mut fx.db, fx.hostel.id, "Y2").unwrap();

        let report = financial_report(&fx.db, summary.new_year.id).unwrap();
        assert_eq!(report.total_revenue, dec!(1700));
        assert_eq!(report.historical_residents, 2);
        assert_eq!(report.average_revenue_per_resident, dec!(850));

        let empty = financial_report(&fx.db, fx.year.id).unwrap();
        assert_eq!(empty.total_revenue, Decimal::ZERO);
        assert_eq!(empty.average_revenue_per_resident, Decimal::ZERO);
    }

    #[test]
    fn test_rename_and_delete() {
        let mut fx = Fixture::new();
        let (gw, mail) = (FakeGateway::default(), RecordingNotifier::default());
        let ledger = Ledger::new(&gw, &mail, BillingPolicy::default());
        paid_resident(&mut fx, &ledger, "gone@x.com", dec!(1000));
        let first = start_new_calendar_year(&mut fx.db, fx.hostel.id, "Y2").unwrap();
        start_new_calendar_year(&mut fx.db, fx.hostel.id, "Y3").unwrap();

        let renamed = rename_calendar_year(&mut fx.db, first.new_year.id, "2025 Intake").unwrap();
        assert_eq!(renamed.name, "2025 Intake");
        assert_eq!(
            rename_calendar_year(&mut fx.db, Uuid::new_v4(), "x").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let active = current_calendar_year(&fx.db, fx.hostel.id).unwrap();
        assert!(matches!(
            delete_calendar_year(&mut fx.db, active.id),
            Err(Error::ActiveCalendarYear)
        ));

        delete_calendar_year(&mut fx.db, first.new_year.id).unwrap();
        assert!(fx.db.find_calendar_year(first.new_year.id).unwrap().is_none());
        assert!(fx
            .db
            .historical_residents()
            .list_for_year(first.new_year.id)
            .unwrap()
            .is_empty());
        // the archived payment survives as an orphan for the sweep
        let payments = fx.db.payments().list().unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].is_orphaned());

        assert_eq!(
            delete_calendar_year(&mut fx.db, first.new_year.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
