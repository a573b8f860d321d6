// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// escbridge server: the HTTP face of the bridge. Point-of-sale frontends post
// documents here; the bridge encodes them and pushes ESC/POS to the printer.

pub mod api;
pub mod error;
pub mod server;
pub mod state;

pub use api::create_router;
pub use server::BridgeServer;
pub use state::AppState;
