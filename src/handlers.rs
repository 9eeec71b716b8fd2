use crate::admin_handler;
use crate::bitrix_client::{BitrixClient, CrmClient};
use crate::config::Config;
use crate::errors::SubmitError;
use crate::i18n::{t, Language, MessageKey};
use crate::lead_form::{failure_message_key, LeadForm, SubmitOutcome, TracingView};
use crate::lead_store::LeadStore;
use crate::pipeline::{LeadPipeline, LeadRequest};
use crate::settings::SettingsStore;
use crate::validation::FormField;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Submission pipeline shared by every form.
    pub pipeline: Arc<LeadPipeline>,
    /// Live Bitrix client; the admin endpoints reconfigure it in place.
    pub bitrix: Arc<BitrixClient>,
    /// Lead store, for readiness reporting.
    pub store: Arc<dyn LeadStore>,
    /// Persisted operator settings.
    pub settings: Arc<SettingsStore>,
    /// One form controller per browser form instance, keyed by `form_id`.
    pub forms: Cache<String, Arc<LeadForm<TracingView>>>,
}

/// Routes without transport layers; `main` adds limits, tracing and CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/leads", post(submit_lead))
        .route(
            "/api/v1/admin/bitrix",
            get(admin_handler::bitrix_status).put(admin_handler::save_bitrix_config),
        )
        .route(
            "/api/v1/admin/bitrix/test",
            post(admin_handler::test_bitrix_connection),
        )
        .with_state(state)
}

/// Health check endpoint.
///
/// Reports which integrations are configured. Always 200: an unconfigured
/// store or CRM is a deployment state, not an outage of this service.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "parkline-leads",
            "version": env!("CARGO_PKG_VERSION"),
            "store_configured": state.store.is_ready(),
            "crm_configured": state.bitrix.is_configured(),
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct SubmitLeadRequest {
    /// Client-generated id of the form instance.
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(flatten)]
    pub lead: LeadRequest,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitLeadResponse {
    pub success: bool,
    pub message: String,
    pub form_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_after_ms: Option<u64>,
}

/// POST /api/v1/leads
///
/// Submits one lead form. The CRM outcome is not reported to the visitor:
/// a stored lead is a success even when the CRM mirror failed.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitLeadRequest>,
) -> (StatusCode, Json<SubmitLeadResponse>) {
    let language = payload.language.unwrap_or(state.config.default_language);
    let form_id = payload
        .form_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info!(
        "POST /leads - form: {}, apartment: {}",
        form_id,
        payload.lead.apartment.id.as_deref().unwrap_or("-")
    );

    let form = form_for(&state, &form_id, &payload.lead, language).await;

    let mut response = SubmitLeadResponse {
        success: false,
        message: String::new(),
        form_id,
        lead_id: None,
        field_errors: Vec::new(),
        close_after_ms: None,
    };

    let status = match form.submit(&payload.lead, language).await {
        SubmitOutcome::Succeeded(submission) => {
            response.success = true;
            response.message = t(language, MessageKey::Success).to_string();
            response.lead_id = Some(submission.lead.id);
            response.close_after_ms =
                Some(u64::try_from(state.config.form_close_delay.as_millis()).unwrap_or(u64::MAX));
            StatusCode::CREATED
        }
        SubmitOutcome::Ignored => {
            response.message = t(language, MessageKey::ErrorInFlight).to_string();
            StatusCode::CONFLICT
        }
        SubmitOutcome::Failed(err) => {
            response.message = t(language, failure_message_key(&err)).to_string();
            if let SubmitError::Validation(errors) = &err {
                response.field_errors = errors
                    .fields
                    .iter()
                    .map(|field| FieldError {
                        field: *field,
                        message: t(language, field.error_key()).to_string(),
                    })
                    .collect();
            }
            submit_error_status(&err)
        }
    };

    (status, Json(response))
}

/// HTTP status for a failed submission.
pub fn submit_error_status(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::StoreNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        SubmitError::StoreTimeout => StatusCode::GATEWAY_TIMEOUT,
        SubmitError::StoreRejected(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Returns the controller for a form instance, opening it on first use.
async fn form_for(
    state: &AppState,
    form_id: &str,
    request: &LeadRequest,
    language: Language,
) -> Arc<LeadForm<TracingView>> {
    state
        .forms
        .get_with(form_id.to_string(), async {
            let form = LeadForm::new(Arc::clone(&state.pipeline), Arc::new(TracingView))
                .with_close_delay(state.config.form_close_delay);
            form.open(&request.apartment, language);
            Arc::new(form)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::validation::ValidationErrors;

    #[test]
    fn test_submit_error_status() {
        assert_eq!(
            submit_error_status(&SubmitError::Validation(ValidationErrors {
                fields: vec![FormField::Name]
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            submit_error_status(&SubmitError::StoreNotConfigured),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            submit_error_status(&SubmitError::StoreTimeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            submit_error_status(&SubmitError::StoreRejected(StoreError::Other("x".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_request_flattens_lead_fields() {
        let request: SubmitLeadRequest = serde_json::from_value(json!({
            "form_id": "f-1",
            "language": "sq",
            "page_path": "/en",
            "apartment": { "id": "B-2-4" },
            "contact": { "name": "Ana", "email": "ana@example.mk", "phone": "070123456" }
        }))
        .unwrap();

        assert_eq!(request.form_id.as_deref(), Some("f-1"));
        assert_eq!(request.language, Some(Language::Sq));
        assert_eq!(request.lead.page_path, "/en");
        assert_eq!(request.lead.apartment.id.as_deref(), Some("B-2-4"));
        assert_eq!(request.lead.contact.name, "Ana");
    }
}
