//! Payment ledger
//!
//! Payments move `PENDING -> CONFIRMED | INVALID`, with soft deletion for
//! duplicates found by the orphan sweep. Money only reaches a resident
//! through [`Ledger::confirm_payment`], which may be called any number of
//! times for the same reference by the polling endpoint and the webhook.

use chrono::{Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::billing::{self, BillingPolicy};
use crate::error::{Error, Result};
use crate::gateway::{to_minor_units, PaymentGateway};
use crate::invariants::assert_payment_invariants;
use crate::models::{
    round_money, Amount, CalendarYear, Checkout, Payment, PaymentKind, PaymentStatus,
    PaymentTotals, Resident, ResidentSnapshot, Resolution, ResolutionAction, Room,
};
use crate::notify::{access_code_email, Email, Notifier};
use crate::storage::{Database, Stores};

/// Webhook event that settles a charge
pub const CHARGE_SUCCESS: &str = "charge.success";

/// PENDING orphans older than this are invalidated
pub const STALE_AFTER_MONTHS: u32 = 6;

/// Same amount, room and year within this window counts as a duplicate
pub const DUPLICATE_WINDOW_MINUTES: i64 = 5;

/// PENDING payments younger than this hold their amount against the room
/// price; older ones are treated as abandoned checkouts
pub const CHECKOUT_HOLD_HOURS: i64 = 24;

/// Body of a payment or top-up initiation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub room_id: Uuid,
    pub resident_id: Uuid,
    #[serde(alias = "initialPayment")]
    pub amount: Amount,
}

/// What a webhook delivery resulted in
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Confirmed(ResidentSnapshot),
    /// Event type the ledger does not act on
    Ignored(String),
}

#[derive(Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

struct Confirmation {
    snapshot: ResidentSnapshot,
    email: Option<Email>,
}

/// Payment operations bound to the external collaborators
pub struct Ledger<'a> {
    gateway: &'a dyn PaymentGateway,
    notifier: &'a dyn Notifier,
    policy: BillingPolicy,
}

impl<'a> Ledger<'a> {
    pub fn new(
        gateway: &'a dyn PaymentGateway,
        notifier: &'a dyn Notifier,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            gateway,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Start a first payment. The amount must cover the minimum deposit and
    /// the resident may not already have paid or have a checkout open.
    #[instrument(skip(self, db, req), fields(room_id = %req.room_id, resident_id = %req.resident_id, amount = %req.amount.value()))]
    pub fn initiate_payment(&self, db: &mut Database, req: &PaymentRequest) -> Result<Checkout> {
        let (room, resident, year) = payment_context(db, req)?;
        let offered = req.amount.value();
        self.admit(db.stores(), &room, resident.id, offered, PaymentKind::Initial)?;
        self.open_checkout(db, &resident, &room, &year, offered, PaymentKind::Initial)
    }

    /// Start a top-up against a confirmed deposit. The amount may not exceed
    /// what is still owed once open checkouts are counted.
    #[instrument(skip(self, db, req), fields(room_id = %req.room_id, resident_id = %req.resident_id, amount = %req.amount.value()))]
    pub fn initiate_top_up(&self, db: &mut Database, req: &PaymentRequest) -> Result<Checkout> {
        let (room, resident, year) = payment_context(db, req)?;
        let offered = req.amount.value();
        self.admit(db.stores(), &room, resident.id, offered, PaymentKind::TopUp)?;
        self.open_checkout(db, &resident, &room, &year, offered, PaymentKind::TopUp)
    }

    /// Verify a payment with the provider and settle it exactly once.
    ///
    /// Repeated or concurrent calls for the same reference return the
    /// resident's current state without applying the amount again.
    #[instrument(skip(self, db))]
    pub fn confirm_payment(&self, db: &mut Database, reference: &str) -> Result<ResidentSnapshot> {
        // Only references issued here are sent to the provider
        let known = db
            .payments()
            .find_by_reference(reference)?
            .ok_or_else(|| Error::PaymentNotFound(reference.to_string()))?;
        if known.status == PaymentStatus::Invalid && known.historical_resident_id.is_none() {
            return Err(Error::PaymentInvalidated(reference.to_string()));
        }

        let verification = self.gateway.verify_transaction(reference).map_err(|e| {
            error!(error = %e, "Payment verification request failed");
            Error::from(e)
        })?;
        if !verification.is_success() {
            return Err(Error::VerificationFailed(format!(
                "provider reported status '{}' for {reference}",
                verification.status
            )));
        }
        let method = verification.channel.as_deref();

        let confirmation = db.transaction(|s| self.settle_verified(s, reference, method))?;

        if let Some(email) = confirmation.email {
            if let Err(e) = self.notifier.send(&email) {
                warn!(reference, to = %email.to, error = %e, "Failed to send access code email");
            }
        }
        Ok(confirmation.snapshot)
    }

    /// Top-ups settle through the same path as first payments
    pub fn confirm_top_up(&self, db: &mut Database, reference: &str) -> Result<ResidentSnapshot> {
        self.confirm_payment(db, reference)
    }

    /// Authenticate and apply a provider webhook delivery
    #[instrument(skip(self, db, raw_body, signature), fields(len = raw_body.len()))]
    pub fn handle_webhook(
        &self,
        db: &mut Database,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let verified = signature
            .is_some_and(|sig| self.gateway.verify_webhook_signature(raw_body, sig));
        if !verified {
            warn!("Rejected webhook with missing or invalid signature");
            return Err(Error::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)?;
        if event.event != CHARGE_SUCCESS {
            debug!(event = %event.event, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored(event.event));
        }

        let reference = event
            .data
            .get("reference")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::Validation("webhook payload has no data.reference".into()))?;
        self.confirm_payment(db, reference)
            .map(WebhookOutcome::Confirmed)
    }

    /// Billing rules for a new checkout, against the stored resident
    fn admit(
        &self,
        s: Stores<'_>,
        room: &Room,
        resident_id: Uuid,
        offered: Decimal,
        kind: PaymentKind,
    ) -> Result<()> {
        let resident = s.residents().get(resident_id)?;
        let pending = held_amount(s, resident.id)?;

        match kind {
            PaymentKind::Initial => {
                if resident.amount_paid > Decimal::ZERO || pending > Decimal::ZERO {
                    return Err(Error::AlreadyBilled {
                        resident_id: resident.id,
                        paid: resident.amount_paid,
                        pending,
                    });
                }
                let required = self.policy.minimum_deposit(room.price);
                if offered < required {
                    return Err(Error::BelowMinimumDeposit {
                        required: round_money(required),
                        offered,
                    });
                }
                if offered > room.price {
                    return Err(Error::OverpaymentRejected {
                        outstanding: room.price,
                        offered,
                    });
                }
            }
            PaymentKind::TopUp => {
                if resident.amount_paid <= Decimal::ZERO {
                    return Err(Error::DepositRequired(resident.id));
                }
                let room_price = resident.room_price.ok_or_else(|| {
                    Error::Validation(format!("Room price not set for resident {}", resident.id))
                })?;
                let outstanding = room_price - resident.amount_paid - pending;
                if offered > outstanding {
                    return Err(Error::OverpaymentRejected {
                        outstanding: outstanding.max(Decimal::ZERO),
                        offered,
                    });
                }
            }
        }
        Ok(())
    }

    fn open_checkout(
        &self,
        db: &mut Database,
        resident: &Resident,
        room: &Room,
        year: &CalendarYear,
        amount: Decimal,
        kind: PaymentKind,
    ) -> Result<Checkout> {
        let amount_minor = to_minor_units(amount)?;

        // Nothing is written unless the provider accepted the transaction
        let checkout = self
            .gateway
            .initialize_transaction(&resident.email, amount_minor)
            .map_err(|e| {
                error!(error = %e, "Payment initialization failed");
                Error::from(e)
            })?;

        let payment = Payment::pending(
            amount,
            resident.id,
            room.id,
            year.id,
            kind,
            checkout.reference.clone(),
        );
        // Another checkout may have opened while the provider was called
        db.transaction(|s| {
            self.admit(s, room, resident.id, amount, kind)?;
            s.payments().create(&payment)
        })
        .map_err(|e| {
            warn!(reference = %payment.reference, error = %e, "Checkout dropped after provider initialization");
            e
        })?;

        info!(reference = %payment.reference, kind = kind.as_str(), "Payment initiated");
        Ok(checkout)
    }

    fn settle_verified(
        &self,
        s: Stores<'_>,
        reference: &str,
        method: Option<&str>,
    ) -> Result<Confirmation> {
        let payment = s
            .payments()
            .find_by_reference(reference)?
            .ok_or_else(|| Error::PaymentNotFound(reference.to_string()))?;
        assert_payment_invariants(&payment);

        // Year already rolled over under this payment
        if let Some(historical_id) = payment.historical_resident_id {
            s.payments().record_verification(payment.id, method, Utc::now())?;
            let record = s
                .historical_residents()
                .find_by_id(historical_id)?
                .ok_or_else(|| Error::NotFound(format!("Historical resident {historical_id}")))?;
            info!(reference, historical_resident_id = %historical_id, "Payment confirmed for archived resident");
            return Ok(Confirmation {
                snapshot: ResidentSnapshot::from(&record),
                email: None,
            });
        }

        if payment.status == PaymentStatus::Invalid {
            return Err(Error::PaymentInvalidated(reference.to_string()));
        }

        let resident_id = payment.resident_id.ok_or_else(|| {
            Error::NotFound(format!("No resident linked to payment {reference}"))
        })?;
        let mut resident = s.residents().get(resident_id)?;

        if payment.status == PaymentStatus::Confirmed
            || !s.payments().confirm_if_pending(payment.id, method, Utc::now())?
        {
            debug!(reference, "Payment already confirmed");
            return Ok(Confirmation {
                snapshot: ResidentSnapshot::from(&resident),
                email: None,
            });
        }

        let issued = billing::settle(s, &self.policy, &mut resident, payment.amount)?;
        info!(
            reference,
            resident_id = %resident.id,
            amount = %payment.amount,
            amount_paid = %resident.amount_paid,
            "Payment confirmed"
        );

        Ok(Confirmation {
            snapshot: ResidentSnapshot::from(&resident),
            email: issued.map(|code| access_code_email(&resident.email, &resident.name, &code)),
        })
    }
}

/// Room, resident and active year a payment request refers to
fn payment_context(db: &Database, req: &PaymentRequest) -> Result<(Room, Resident, CalendarYear)> {
    let room = db.rooms().get(req.room_id)?;
    let resident = db.residents().get(req.resident_id)?;
    if resident.room_id != Some(room.id) {
        return Err(Error::Validation(format!(
            "Resident {} is not registered to room {}",
            resident.id, room.id
        )));
    }
    let year = db
        .calendar_years()
        .find_active(room.hostel_id)?
        .ok_or(Error::NoActiveCalendarYear(room.hostel_id))?;
    Ok((room, resident, year))
}

/// Sum of a resident's PENDING payments opened within the checkout hold
fn held_amount(s: Stores<'_>, resident_id: Uuid) -> Result<Decimal> {
    let since = Utc::now() - Duration::hours(CHECKOUT_HOLD_HOURS);
    Ok(s.payments()
        .list_for_resident(resident_id)?
        .iter()
        .filter(|p| p.status == PaymentStatus::Pending && p.created_at > since)
        .map(|p| p.amount)
        .sum())
}

/// Confirmed and pending sums over a resident's live payments
#[instrument(skip(db))]
pub fn resident_totals(db: &Database, resident_id: Uuid) -> Result<PaymentTotals> {
    db.residents().get(resident_id)?;
    let payments = db.payments().list_for_resident(resident_id)?;

    let mut totals = PaymentTotals::default();
    for payment in &payments {
        match payment.status {
            PaymentStatus::Confirmed => totals.confirmed += payment.amount,
            PaymentStatus::Pending => totals.pending += payment.amount,
            PaymentStatus::Invalid => {}
        }
        totals.count += 1;
    }
    Ok(totals)
}

/// Reconcile payments linked to neither a resident nor an archived resident.
///
/// Best effort: every payment touched gets an audit entry, and the whole
/// sweep commits or rolls back as one transaction.
#[instrument(skip(db))]
pub fn fix_orphaned_payments(db: &mut Database) -> Result<Vec<Resolution>> {
    let resolutions = db.transaction(|s| {
        let mut resolutions = Vec::new();
        for payment in s.payments().orphans()? {
            let resolution = resolve_orphan(s, &payment)?;
            s.resolutions().create(&resolution)?;
            info!(
                reference = %resolution.reference,
                action = resolution.action.as_str(),
                "Orphaned payment resolved"
            );
            resolutions.push(resolution);
        }
        Ok(resolutions)
    })?;

    info!(count = resolutions.len(), "Orphan sweep complete");
    Ok(resolutions)
}

fn resolve_orphan(s: Stores<'_>, payment: &Payment) -> Result<Resolution> {
    if let Some(room_id) = payment.room_id {
        if let Some(resident) = s.residents().first_in_room(room_id)? {
            s.payments().link_resident(payment.id, resident.id)?;
            return Ok(Resolution::new(
                payment,
                ResolutionAction::LinkedToResident,
                Some(resident.id),
                format!("room {room_id} is occupied by resident {}", resident.id),
            ));
        }

        if let Some(year_id) = payment.calendar_year_id {
            if let Some(record) = s.historical_residents().find_by_room_and_year(room_id, year_id)? {
                s.payments().link_historical(payment.id, record.id)?;
                return Ok(Resolution::new(
                    payment,
                    ResolutionAction::LinkedToHistoricalResident,
                    Some(record.id),
                    format!("room {room_id} was archived under calendar year {year_id}"),
                ));
            }
        }
    }

    let now = Utc::now();
    let stale_before = now
        .checked_sub_months(Months::new(STALE_AFTER_MONTHS))
        .unwrap_or(now);
    if payment.status == PaymentStatus::Pending && payment.created_at < stale_before {
        s.payments().mark_invalid(payment.id)?;
        return Ok(Resolution::new(
            payment,
            ResolutionAction::MarkedInvalidStale,
            None,
            format!("pending since {}", payment.created_at.to_rfc3339()),
        ));
    }

    // A CONFIRMED payment is never the copy; otherwise the original is the
    // CONFIRMED or else the earlier of the pair
    if payment.status != PaymentStatus::Confirmed {
        let window = Duration::minutes(DUPLICATE_WINDOW_MINUTES);
        let original = s
            .payments()
            .find_duplicates(payment, window)?
            .into_iter()
            .find(|candidate| ranks_ahead(candidate, payment));
        if let Some(original) = original {
            s.payments().soft_delete(payment.id)?;
            return Ok(Resolution::new(
                payment,
                ResolutionAction::SoftDeletedDuplicate,
                Some(original.id),
                format!("duplicate of payment {}", original.reference),
            ));
        }
    }

    s.payments().mark_invalid(payment.id)?;
    Ok(Resolution::new(
        payment,
        ResolutionAction::MarkedInvalidUnresolvable,
        None,
        "no resident, archived resident or duplicate matches".to_string(),
    ))
}

/// Which of two duplicate payments is kept
fn ranks_ahead(a: &Payment, b: &Payment) -> bool {
    let confirmed = |p: &Payment| p.status == PaymentStatus::Confirmed;
    match (confirmed(a), confirmed(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => (a.created_at, a.id) < (b.created_at, b.id),
    }
}
