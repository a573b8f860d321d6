// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP routes.

pub mod health;
pub mod print;
pub mod printers;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router. Browser frontends call the bridge cross-origin, so
/// CORS is open.
pub fn create_router(state: AppState) -> Router {
    let printers = Router::new()
        .route(
            "/printers",
            get(printers::list_printers).post(printers::save_printer),
        )
        .route("/printers/active", get(printers::active_printer))
        .route("/printers/{id}", delete(printers::delete_printer))
        .route("/printers/{id}/activate", post(printers::activate_printer))
        .route("/printers/{id}/status", get(printers::printer_status));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/print", post(print::print))
        .merge(printers)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
