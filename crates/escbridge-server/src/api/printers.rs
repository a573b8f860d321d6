// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry management routes.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use escbridge_core::error::PrintError;
use escbridge_core::types::{PrinterId, PrinterRecord};
use escbridge_print::probe;

use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /printers`. With an `id` that already exists the record is
/// updated in place; otherwise a new printer is created. A missing `isActive`
/// leaves the stored flag alone.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePrinter {
    pub id: Option<PrinterId>,
    pub name: String,
    pub ip_address: String,
    pub port: Option<u16>,
    pub bridge_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    pub id: PrinterId,
    pub address: String,
    pub online: bool,
}

pub async fn list_printers(State(state): State<AppState>) -> ApiResult<Json<Vec<PrinterRecord>>> {
    let printers = state.with_registry(|r| r.list())?;
    Ok(Json(printers))
}

pub async fn save_printer(
    State(state): State<AppState>,
    Json(body): Json<SavePrinter>,
) -> ApiResult<Json<PrinterRecord>> {
    let name = body.name.trim();
    let ip = body.ip_address.trim();
    if name.is_empty() || ip.is_empty() {
        return Err(PrintError::InvalidInput("name and ipAddress are required".into()).into());
    }
    if body.port == Some(0) {
        return Err(PrintError::InvalidInput("port must be 1-65535".into()).into());
    }
    let port = body.port.unwrap_or(state.config.default_port);

    let record = state.with_registry(|r| {
        let existing = match body.id {
            Some(id) => r.get(&id)?,
            None => None,
        };
        let mut record = match existing {
            Some(existing) => existing,
            None => {
                let mut fresh = PrinterRecord::new(name, ip, port);
                if let Some(id) = body.id {
                    fresh.id = id;
                }
                fresh
            }
        };
        record.name = name.to_string();
        record.ip_address = ip.to_string();
        record.port = port;
        record.bridge_url = body.bridge_url.clone().filter(|u| !u.trim().is_empty());
        if let Some(active) = body.is_active {
            record.is_active = active;
        }
        r.upsert(&record)?;
        Ok(record)
    })?;

    info!(printer_id = %record.id, name = %record.name, "printer saved via API");
    Ok(Json(record))
}

pub async fn delete_printer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = PrinterId::parse(&id)?;
    state.with_registry(|r| r.remove(&id))?;
    Ok(Json(json!({ "success": true })))
}

pub async fn activate_printer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PrinterRecord>> {
    let id = PrinterId::parse(&id)?;
    let record = state.with_registry(|r| r.set_active(&id))?;
    Ok(Json(record))
}

pub async fn active_printer(
    State(state): State<AppState>,
) -> ApiResult<Json<Option<PrinterRecord>>> {
    Ok(Json(state.with_registry(|r| r.get_active())?))
}

/// Connect-only reachability check. Nothing is sent to the printer.
pub async fn printer_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PrinterStatus>> {
    let id = PrinterId::parse(&id)?;
    let record = state
        .with_registry(|r| r.get(&id))?
        .ok_or_else(|| PrintError::PrinterNotFound(id.to_string()))?;

    let online = probe(&record.ip_address, record.port, state.config.connect_timeout()).await;
    Ok(Json(PrinterStatus {
        id,
        address: record.destination().to_string(),
        online,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use escbridge_core::BridgeConfig;
    use escbridge_print::InMemoryPrinterRegistry;
    use tower::ServiceExt;

    fn app() -> (AppState, Router) {
        let state = AppState::new(
            BridgeConfig::default(),
            Box::new(InMemoryPrinterRegistry::new()),
        );
        (state.clone(), create_router(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_list_and_activate() {
        let (_, app) = app();

        let (status, a) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": "Kitchen", "ipAddress": "10.0.0.5" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(a["port"], 9100);
        assert_eq!(a["isActive"], false);

        let (_, b) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": "Bar", "ipAddress": "10.0.0.6", "port": 9101, "isActive": true })),
        )
        .await;

        let (_, list) = call(&app, Method::GET, "/printers", None).await;
        assert_eq!(list.as_array().unwrap().len(), 2);

        let (_, active) = call(&app, Method::GET, "/printers/active", None).await;
        assert_eq!(active["id"], b["id"]);

        let uri = format!("/printers/{}/activate", a["id"].as_str().unwrap());
        let (status, activated) = call(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activated["isActive"], true);

        let (_, list) = call(&app, Method::GET, "/printers", None).await;
        let active_count = list
            .as_array()
            .unwrap()
            .iter()
            .filter(|p| p["isActive"] == true)
            .count();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn saving_with_known_id_updates() {
        let (state, app) = app();
        let (_, created) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": "Front", "ipAddress": "10.0.0.9" })),
        )
        .await;
        let id = created["id"].clone();

        call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "id": id, "name": "Front desk", "ipAddress": "10.0.0.10" })),
        )
        .await;

        let all = state.with_registry(|r| r.list()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Front desk");
        assert_eq!(all[0].ip_address, "10.0.0.10");
    }

    #[tokio::test]
    async fn editing_without_is_active_keeps_the_active_printer() {
        let (state, app) = app();
        let (_, created) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": "Till", "ipAddress": "10.0.0.20", "isActive": true })),
        )
        .await;

        let (_, edited) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "id": created["id"], "name": "Till 1", "ipAddress": "10.0.0.21" })),
        )
        .await;
        assert_eq!(edited["isActive"], true);

        let active = state.with_registry(|r| r.get_active()).unwrap().unwrap();
        assert_eq!(active.name, "Till 1");

        call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "id": created["id"], "name": "Till 1", "ipAddress": "10.0.0.21", "isActive": false })),
        )
        .await;
        assert!(state.with_registry(|r| r.get_active()).unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_and_unknown_ids() {
        let (_, app) = app();
        let (_, created) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": "Tmp", "ipAddress": "10.0.0.7" })),
        )
        .await;
        let uri = format!("/printers/{}", created["id"].as_str().unwrap());

        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, Method::POST, "/printers/not-a-uuid/activate", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (_, app) = app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/printers",
            Some(json!({ "name": " ", "ipAddress": "10.0.0.1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_probes_the_printer() {
        let (state, app) = app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let record = PrinterRecord::new("Local", "127.0.0.1", port);
        state.with_registry(|r| r.upsert(&record)).unwrap();

        let uri = format!("/printers/{}/status", record.id);
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["online"], true);
        assert_eq!(body["address"], format!("127.0.0.1:{port}"));
    }
}
