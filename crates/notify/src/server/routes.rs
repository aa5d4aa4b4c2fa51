use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::{Server, USER_HEADER};
use crate::{event::Event, metrics::gather_metrics, Error};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn dispatch_event(State(server): State<Arc<Server>>, Json(event): Json<Event>) -> Response {
    info!(
        "Received event {} ({:?}) for {} {}",
        event.id, event.event_type, event.resource_type, event.resource_id
    );

    let notifications = match server.dispatcher.notifications_from_event(&event).await {
        Ok(notifications) => notifications,
        Err(e @ (Error::UnsupportedResourceType(_) | Error::NotFound(_))) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if !notifications.is_empty() {
        if let Err(e) = server.sink.deliver(&notifications).await {
            error!(
                "Sink {} failed to deliver {} notifications for event {}: {}",
                server.sink.name(),
                notifications.len(),
                event.id,
                e
            );
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    }

    Json(json!({
        "event_id": event.id,
        "notifications": notifications,
    }))
    .into_response()
}

pub async fn file_ticket(State(server): State<Arc<Server>>, headers: HeaderMap, body: Bytes) -> Response {
    let user = headers.get(USER_HEADER).and_then(|v| v.to_str().ok());

    match server.filer.file_ticket_from_body(user, &body).await {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(e) => error_response(e.status_code(), e.to_string()),
    }
}
