// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP mapping for `PrintError` on the printer-management routes.
//
// `/print` does not use this: it always answers 200 with a success flag.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use escbridge_core::error::PrintError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError(pub PrintError);

impl From<PrintError> for ApiError {
    fn from(err: PrintError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PrintError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PrintError::PrinterNotFound(_) => StatusCode::NOT_FOUND,
            PrintError::NoActivePrinter => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "success": false,
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
