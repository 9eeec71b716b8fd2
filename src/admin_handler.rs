use crate::bitrix_client::{normalize_webhook_url, BitrixClient, ConnectionStatus, CrmClient};
use crate::errors::{AppError, ResultExt};
use crate::handlers::AppState;
use crate::settings::BITRIX_WEBHOOK_KEY;
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct BitrixStatusResponse {
    pub configured: bool,
    /// Webhook URL with the secret path segment masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub connection: ConnectionStatus,
}

#[derive(Debug, Deserialize)]
pub struct BitrixConfigRequest {
    pub webhook_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BitrixTestRequest {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BitrixConfigResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/v1/admin/bitrix
///
/// Reports whether the CRM is configured and whether the webhook answers.
pub async fn bitrix_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BitrixStatusResponse>, AppError> {
    validate_admin_token(&state, &headers)?;

    let webhook_url = state.bitrix.webhook_url();
    let connection = state.bitrix.test_connection().await;

    Ok(Json(BitrixStatusResponse {
        configured: state.bitrix.is_configured(),
        webhook_url: webhook_url.as_deref().map(mask_webhook_url),
        connection,
    }))
}

/// PUT /api/v1/admin/bitrix
///
/// Persists a new webhook URL, applies it to the live client, then tests the
/// connection. A failed test does not roll the URL back.
pub async fn save_bitrix_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BitrixConfigRequest>,
) -> Result<Json<BitrixConfigResponse>, AppError> {
    validate_admin_token(&state, &headers)?;

    let stored = normalize_webhook_url(&payload.webhook_url)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // The live client only changes once the file holds the new URL
    state
        .settings
        .set(BITRIX_WEBHOOK_KEY, &stored)
        .await
        .context("Saving Bitrix webhook URL")?;

    state
        .bitrix
        .configure(&stored)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!("Bitrix webhook URL saved: {}", mask_webhook_url(&stored));

    let connection = state.bitrix.test_connection().await;
    let message = if connection.success {
        "Configuration saved and connection verified successfully!".to_string()
    } else {
        format!(
            "Configuration saved but connection test failed: {}",
            connection.message
        )
    };

    Ok(Json(BitrixConfigResponse {
        success: connection.success,
        message,
    }))
}

/// POST /api/v1/admin/bitrix/test
///
/// Tests a candidate webhook URL without applying it, or the current one
/// when the body names none.
pub async fn test_bitrix_connection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<BitrixTestRequest>>,
) -> Result<Json<ConnectionStatus>, AppError> {
    validate_admin_token(&state, &headers)?;

    let candidate = payload
        .and_then(|Json(body)| body.webhook_url)
        .filter(|url| !url.trim().is_empty());

    let status = match candidate {
        Some(url) => {
            let candidate_client = BitrixClient::new(Some(url)).map_err(|e| AppError::BadRequest(e.to_string()))?;
            candidate_client.test_connection().await
        }
        None => state.bitrix.test_connection().await,
    };

    Ok(Json(status))
}

/// Validate the admin token from the X-Admin-Token header. Without a
/// configured token every admin request is refused.
fn validate_admin_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref expected) = state.config.admin_token else {
        return Err(AppError::Unauthorized(
            "Admin endpoints disabled, ADMIN_TOKEN not set".to_string(),
        ));
    };

    let token = headers
        .get("X-Admin-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Admin-Token header".to_string()))?;

    if !constant_time_compare(token, expected) {
        tracing::warn!("Invalid admin token received");
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Hides the webhook token: `https://acme.bitrix24.com/rest/1/abc123`
/// becomes `https://acme.bitrix24.com/rest/1/***`.
fn mask_webhook_url(url: &str) -> String {
    let has_path = url::Url::parse(url).is_ok_and(|parsed| parsed.path().len() > 1);

    match url.rsplit_once('/') {
        Some((prefix, _)) if has_path => format!("{}/***", prefix),
        _ => "***".to_string(),
    }
}
