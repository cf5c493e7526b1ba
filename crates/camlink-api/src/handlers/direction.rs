//! POST /direction: forward a move to the producer's command channel.
//!
//! Accepts `{"direction":"RIGHT"}` or a form field `direction=RIGHT`.

use axum::extract::{FromRequest, Request, State};
use axum::http::{header, StatusCode};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use camlink_core::Direction;

use super::ApiState;

#[derive(Debug, Default, Deserialize)]
pub struct DirectionRequest {
    pub direction: Option<String>,
}

pub async fn handle_direction(
    State(state): State<ApiState>,
    request: Request,
) -> (StatusCode, Json<Value>) {
    let token = read_direction(request)
        .await
        .filter(|token| !token.trim().is_empty());
    let Some(token) = token else {
        return error(StatusCode::BAD_REQUEST, "No direction received".to_string());
    };
    let Some(direction) = Direction::from_token(&token) else {
        return error(
            StatusCode::BAD_REQUEST,
            format!("unknown direction: {}", token.trim()),
        );
    };

    match state.client.send_direction(direction).await {
        Ok(coords) => {
            state.coords.set(coords);
            tracing::debug!(%direction, x = coords.x, y = coords.y, "direction forwarded");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "direction": direction.as_token(),
                    "coords": coords,
                })),
            )
        }
        Err(e) => {
            tracing::warn!(%direction, error = %e, "direction forward failed");
            error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn read_direction(request: Request) -> Option<String> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let body = if is_form {
        Form::<DirectionRequest>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .ok()
    } else {
        Json::<DirectionRequest>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .ok()
    };
    body.and_then(|b| b.direction)
}

fn error(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
}
