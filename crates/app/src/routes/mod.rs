//! HTTP routes

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

mod calendar_years;
mod payments;
mod residents;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/payments", get(payments::list))
        .route("/payments/init", post(payments::initiate))
        .route("/payments/confirm", get(payments::confirm))
        .route("/payments/topup", post(payments::initiate_top_up))
        .route("/payments/topup/confirm", post(payments::confirm_top_up))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/orphans/fix", post(payments::fix_orphans))
        .route("/calendar-years/start", post(calendar_years::start))
        .route("/calendar-years/current/:hostel_id", get(calendar_years::current))
        .route(
            "/calendar-years/historical/:hostel_id",
            get(calendar_years::historical),
        )
        .route(
            "/calendar-years/financial-report/:id",
            get(calendar_years::financial_report),
        )
        .route("/calendar-years/update/:id", put(calendar_years::rename))
        .route(
            "/calendar-years/delete/:id",
            axum::routing::delete(calendar_years::delete),
        )
        .route("/residents", post(residents::register))
        .route(
            "/residents/:id",
            get(residents::fetch)
                .put(residents::update)
                .delete(residents::remove),
        )
        .route("/residents/:id/assign", post(residents::assign))
        .route("/residents/:id/totals", get(residents::totals))
        .route("/residents/debtors/:hostel_id", get(residents::debtors))
        .with_state(state)
}
