use crate::circuit_breaker::{create_crm_circuit_breaker, CrmCircuitBreaker};
use crate::errors::CrmError;
use crate::models::NewLead;
use async_trait::async_trait;
use failsafe::CircuitBreaker;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::RwLock;
use std::time::Duration;

/// CRM side of the lead fan-out.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Whether an endpoint is configured. When it is not, the pipeline skips
    /// the CRM mirror without calling [`CrmClient::create_lead`].
    fn is_configured(&self) -> bool;

    /// Creates the lead in the CRM and returns its external id.
    async fn create_lead(&self, lead: &NewLead) -> Result<String, CrmError>;
}

/// Outcome of a webhook connection test.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

/// Client for a Bitrix24 inbound webhook
/// (`https://<portal>.bitrix24.com/rest/<user>/<token>`).
///
/// The webhook URL can be replaced at runtime from the admin panel, so it
/// sits behind a lock instead of being fixed at construction.
pub struct BitrixClient {
    client: reqwest::Client,
    webhook_url: RwLock<Option<String>>,
    breaker: CrmCircuitBreaker,
}

impl BitrixClient {
    /// Creates a new `BitrixClient`.
    ///
    /// # Arguments
    ///
    /// * `webhook_url` - Inbound webhook URL, or `None` to start unconfigured.
    pub fn new(webhook_url: Option<String>) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| CrmError::RequestError(format!("Failed to create Bitrix client: {}", e)))?;

        let bitrix = Self {
            client,
            webhook_url: RwLock::new(None),
            breaker: create_crm_circuit_breaker(),
        };

        if let Some(url) = webhook_url {
            bitrix.configure(&url)?;
        }

        Ok(bitrix)
    }

    /// Points the client at a (new) webhook URL.
    pub fn configure(&self, webhook_url: &str) -> Result<(), CrmError> {
        let normalized = normalize_webhook_url(webhook_url)?;

        let mut guard = self
            .webhook_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(normalized);

        tracing::info!("✓ Bitrix integration configured");
        Ok(())
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn endpoint(&self, method: &str) -> Result<String, CrmError> {
        self.webhook_url()
            .map(|base| format!("{}/{}", base, method))
            .ok_or(CrmError::NotConfigured)
    }

    /// Checks the webhook by listing a single lead id.
    pub async fn test_connection(&self) -> ConnectionStatus {
        let url = match self.endpoint("crm.lead.list.json") {
            Ok(url) => format!("{}?order[ID]=DESC&filter[>ID]=0&select[]=ID&start=0", url),
            Err(_) => {
                return ConnectionStatus {
                    success: false,
                    message: "Bitrix webhook URL not configured".to_string(),
                }
            }
        };

        tracing::info!("Testing Bitrix connection");

        let outcome = match self.client.get(&url).send().await {
            Ok(response) => parse_bitrix_response(response).await.map(|_| ()),
            Err(e) => Err(CrmError::from(e)),
        };

        match outcome {
            Ok(()) => ConnectionStatus {
                success: true,
                message: "Successfully connected to Bitrix24".to_string(),
            },
            Err(CrmError::RemoteError(msg)) => ConnectionStatus {
                success: false,
                message: format!("Connection failed: {}", msg),
            },
            Err(e) => ConnectionStatus {
                success: false,
                message: format!("Connection error: {}", e),
            },
        }
    }

    /// Records a call outcome on the breaker. Application-level errors mean
    /// the endpoint is alive, so only transport failures count.
    fn record_outcome<T>(&self, outcome: &Result<T, CrmError>) {
        let transport_failed = matches!(outcome, Err(CrmError::RequestError(_)));
        let _ = self.breaker.call(|| {
            if transport_failed {
                Err(())
            } else {
                Ok(())
            }
        });
    }
}

#[async_trait]
impl CrmClient for BitrixClient {
    fn is_configured(&self) -> bool {
        self.webhook_url().is_some()
    }

    /// Creates a new lead in Bitrix24 via `crm.lead.add`.
    ///
    /// # Returns
    ///
    /// * `Result<String, CrmError>` - The Bitrix lead id.
    async fn create_lead(&self, lead: &NewLead) -> Result<String, CrmError> {
        let url = self.endpoint("crm.lead.add.json")?;

        if !self.breaker.is_call_permitted() {
            tracing::warn!("Bitrix circuit open, skipping request");
            return Err(CrmError::RequestError(
                "circuit open after repeated failures".to_string(),
            ));
        }

        let body = build_lead_payload(lead);
        tracing::info!("Creating lead in Bitrix: {}", lead.contact_name);
        tracing::debug!("Bitrix lead payload: {}", body);

        let outcome = match self.client.post(&url).json(&body).send().await {
            Ok(response) => parse_bitrix_response(response)
                .await
                .and_then(|result| extract_lead_id(&result)),
            Err(e) => Err(CrmError::from(e)),
        };

        self.record_outcome(&outcome);

        match &outcome {
            Ok(id) => tracing::info!("✓ Lead created in Bitrix: {}", id),
            Err(e) => tracing::warn!("Bitrix lead creation failed: {}", e),
        }

        outcome
    }
}

/// Trims and checks a webhook URL, dropping any trailing slash.
pub fn normalize_webhook_url(raw: &str) -> Result<String, CrmError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CrmError::NotConfigured);
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| CrmError::RequestError(format!("Invalid webhook URL: {}", e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CrmError::RequestError(
            "Webhook URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Reads a Bitrix REST response: non-2xx and `{"error": ...}` bodies become
/// errors, anything else yields the `result` member.
async fn parse_bitrix_response(response: reqwest::Response) -> Result<Value, CrmError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(CrmError::RequestError(format!(
            "Bitrix returned {}: {}",
            status, error_text
        )));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| CrmError::RequestError(format!("Failed to parse Bitrix response: {}", e)))?;

    if let Some(error) = data.get("error") {
        let description = data
            .get("error_description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()));
        return Err(CrmError::RemoteError(description));
    }

    data.get("result")
        .cloned()
        .ok_or_else(|| CrmError::RemoteError("Response missing 'result' field".to_string()))
}

fn extract_lead_id(result: &Value) -> Result<String, CrmError> {
    match result {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => {
            tracing::warn!("Unexpected Bitrix lead id: {:?}", other);
            Err(CrmError::RemoteError(
                "Lead creation response has no lead id".to_string(),
            ))
        }
    }
}

/// `crm.lead.add` request body.
pub fn build_lead_payload(lead: &NewLead) -> Value {
    json!({
        "fields": {
            "TITLE": format!(
                "Apartment {} - {}",
                lead.apartment_id.as_deref().unwrap_or("Inquiry"),
                lead.contact_name
            ),
            "NAME": lead.contact_name,
            "EMAIL": [{ "VALUE": lead.contact_email, "VALUE_TYPE": "WORK" }],
            "PHONE": [{ "VALUE": lead.contact_phone, "VALUE_TYPE": "WORK" }],
            "SOURCE_ID": "WEB",
            "SOURCE_DESCRIPTION": lead.source,
            "COMMENTS": format_lead_comments(lead),
            "OPPORTUNITY": lead.apartment_price.unwrap_or(0.0),
            "CURRENCY_ID": "EUR",
            "UF_CRM_1": lead.apartment_id,
            "UF_CRM_2": lead.apartment_floor,
            "UF_CRM_3": lead.apartment_size,
            "UF_CRM_4": lead.apartment_bedrooms,
        }
    })
}

/// Human-readable summary placed in the Bitrix lead's comments.
pub fn format_lead_comments(lead: &NewLead) -> String {
    let mut lines = Vec::new();

    if let Some(id) = &lead.apartment_id {
        lines.push(format!("Apartment: {}", id));
    }
    if let Some(floor) = lead.apartment_floor {
        lines.push(format!("Floor: {}", floor));
    }
    if let Some(size) = lead.apartment_size {
        lines.push(format!("Size: {}m²", size));
    }
    if let Some(bedrooms) = lead.apartment_bedrooms {
        lines.push(format!("Bedrooms: {}", bedrooms));
    }
    if let Some(price) = lead.apartment_price {
        lines.push(format!("Price: €{}", format_price(price)));
    }
    lines.push(format!(
        "Preferred contact: {}",
        lead.preferred_contact_method.as_str()
    ));
    if let Some(message) = &lead.message {
        lines.push(format!("\nMessage: {}", message));
    }

    lines.join("\n")
}

/// Groups thousands with commas: 125000 -> "125,000", 99.5 -> "99.50".
fn format_price(price: f64) -> String {
    let rendered = if price.fract() == 0.0 {
        format!("{:.0}", price)
    } else {
        format!("{:.2}", price)
    };

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rendered, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 && c.is_ascii_digit() && digits[i - 1].is_ascii_digit() {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match frac_part {
        Some(frac) => format!("{}.{}", grouped, frac),
        None => grouped,
    }
}
