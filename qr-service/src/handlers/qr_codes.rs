use crate::dtos::{GenerateQrRequest, QrCodeResponse, ValidateQrRequest, ValidateQrResponse};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

/// Malformed bodies are the caller's fault, never a server error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected request body");
        AppError::BadRequest(anyhow::anyhow!("Invalid request: {}", rejection.body_text()))
    })
}

pub async fn generate_qr(
    State(state): State<AppState>,
    payload: Result<Json<GenerateQrRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;

    let generated = state
        .registrations
        .generate(request.event_id, request.user_id, request.user_name)
        .await?;

    Ok(Json(QrCodeResponse::new(generated.url)))
}

pub async fn get_qr(
    State(state): State<AppState>,
    Path((event_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let url = state
        .registrations
        .lookup(&event_id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("QR code not found")))?;

    Ok(Json(QrCodeResponse::new(url)))
}

pub async fn validate_qr(
    State(state): State<AppState>,
    payload: Result<Json<ValidateQrRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;

    let (event_id, user_id) = match (request.event_id, request.user_id) {
        (Some(event_id), Some(user_id)) if !event_id.is_empty() && !user_id.is_empty() => {
            (event_id, user_id)
        }
        _ => return Err(AppError::BadRequest(anyhow::anyhow!("Invalid data"))),
    };

    let registered = state
        .registrations
        .validate(&event_id, &user_id, request.registration_id.as_deref())
        .await?;

    tracing::info!(
        event_id = %event_id,
        user_id = %user_id,
        registered,
        "Ticket validated"
    );

    let response = if registered {
        ValidateQrResponse::registered(request.user_name)
    } else {
        ValidateQrResponse::unregistered()
    };

    Ok(Json(response))
}
