// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface.
//
//   POST /print     submit a document
//   GET  /health    liveness plus in-flight and staging usage
//   GET  /printers  destinations the router can resolve

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use spoolgate_core::config::ServiceConfig;
use spoolgate_core::error::DispatchError;
use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::JobId;

use crate::dispatch::{Dispatcher, PrintRequest};

pub type AppState = Arc<Dispatcher>;

/// Build the router with CORS and the request body limit from `config`.
pub fn app(dispatcher: AppState, config: &ServiceConfig) -> Router {
    Router::new()
        .route("/print", post(print))
        .route("/health", get(health))
        .route("/printers", get(printers))
        .layer(DefaultBodyLimit::max(config.max_request_body_bytes()))
        .layer(cors_layer(&config.cors_origins))
        .with_state(dispatcher)
}

/// `"*"` anywhere in the list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/// Wire shape of `POST /print`.  Option fields stay loosely typed so that
/// unrecognised values fall back to defaults instead of failing the request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrintBody {
    document: Option<Value>,
    printer: Option<Value>,
    orientation: Option<Value>,
    color_mode: Option<Value>,
    scale: Option<Value>,
}

impl PrintBody {
    fn into_request(self) -> Result<PrintRequest, DispatchError> {
        let document = match self.document {
            Some(Value::String(document)) => document,
            Some(_) => {
                return Err(DispatchError::InvalidPayload(
                    "document must be a base64 string".into(),
                ));
            }
            None => return Err(DispatchError::InvalidPayload("document is required".into())),
        };
        let printer = match self.printer {
            None | Some(Value::Null) => None,
            Some(Value::String(printer)) => Some(printer),
            Some(_) => {
                return Err(DispatchError::InvalidPayload("printer must be a string".into()));
            }
        };
        Ok(PrintRequest {
            document,
            printer,
            options: PrintOptions::from_request(
                self.orientation.as_ref(),
                self.color_mode.as_ref(),
                self.scale.as_ref(),
            ),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintSuccess {
    status: &'static str,
    job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    spooler_job: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
}

/// A dispatch failure rendered as `{status: "error", message, jobId?}`.
#[derive(Debug)]
pub struct ApiError(pub DispatchError);

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            status: "error",
            message: self.0.to_string(),
            job_id: self.0.job_id(),
        };
        (status, Json(body)).into_response()
    }
}

async fn print(
    State(dispatcher): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PrintSuccess>, ApiError> {
    let body = body.map_err(|rejection| {
        DispatchError::InvalidPayload(format!("unreadable request body: {}", rejection.body_text()))
    })?;
    let parsed: PrintBody = serde_json::from_slice(&body)
        .map_err(|e| DispatchError::InvalidPayload(format!("malformed JSON: {e}")))?;

    let receipt = dispatcher.dispatch(parsed.into_request()?).await?;
    Ok(Json(PrintSuccess {
        status: "success",
        job_id: receipt.job_id,
        spooler_job: receipt.spooler_job,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    in_flight: usize,
    staged_files: usize,
    staged_bytes: u64,
}

async fn health(State(dispatcher): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        in_flight: dispatcher.in_flight(),
        staged_files: dispatcher.staging().staged_count(),
        staged_bytes: dispatcher.staging().staged_bytes(),
    })
}

#[derive(Debug, Serialize)]
struct PrintersBody {
    printers: Vec<String>,
    default: String,
}

async fn printers(State(dispatcher): State<AppState>) -> Json<PrintersBody> {
    Json(PrintersBody {
        printers: dispatcher.router().printers(),
        default: dispatcher.default_printer().to_owned(),
    })
}
