use crate::attributes::AttributeBag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Apartment context of a form submission, as handed over by the
/// visualization layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Apartment {
    /// Unit identifier (e.g. "A-12-3").
    #[serde(default)]
    pub id: Option<String>,

    /// Building view the unit was picked from.
    #[serde(default)]
    pub view: Option<String>,

    /// Fallback facts the visualization layer already parsed.
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<f64>,

    /// Raw attribute bag from the apartment sheet.
    #[serde(default)]
    pub data: AttributeBag,
}

/// Contact channel the visitor prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Phone,
    Email,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactMethod::Phone => "phone",
            ContactMethod::Email => "email",
        }
    }
}

/// User-entered contact form fields, untrimmed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub preferred_contact_method: ContactMethod,
    #[serde(default)]
    pub message: Option<String>,
}

/// Lead pipeline status. Only `New` is written by the submission pipeline;
/// the rest belong to the CRM dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Negotiation,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

/// Lead as written to the store (the `leads` table columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub apartment_id: Option<String>,
    pub apartment_floor: Option<i32>,
    pub apartment_size: Option<f64>,
    pub apartment_price: Option<f64>,
    pub apartment_bedrooms: Option<f64>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub preferred_contact_method: ContactMethod,
    pub message: Option<String>,
    pub source: String,
    pub status: LeadStatus,
    /// Bitrix24 lead id; `None` when the CRM mirror was skipped or failed.
    pub bitrix_lead_id: Option<String>,
}

/// Lead after the store accepted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLead {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub lead: NewLead,
}

/// Result of the CRM mirror attempt for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmSync {
    Succeeded { external_id: String },
    Failed { error: String },
    /// No CRM endpoint configured; nothing was attempted.
    Skipped,
}

impl CrmSync {
    pub fn external_id(&self) -> Option<&str> {
        match self {
            CrmSync::Succeeded { external_id } => Some(external_id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CrmSync::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> SyncStatus {
        match self {
            CrmSync::Succeeded { .. } => SyncStatus::Success,
            CrmSync::Failed { .. } => SyncStatus::Failed,
            CrmSync::Skipped => SyncStatus::Skipped,
        }
    }
}

/// Status column of `sync_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    Skipped,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one CRM fan-out attempt (`sync_log` row).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncLogEntry {
    pub sync_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub bitrix_id: Option<String>,
    pub status: SyncStatus,
    pub request_payload: serde_json::Value,
    pub error_message: Option<String>,
}

impl SyncLogEntry {
    /// Entry for a freshly created lead.
    pub fn lead_create(stored: &StoredLead, submitted: &NewLead, crm: &CrmSync) -> Self {
        Self {
            sync_type: "lead_create".to_string(),
            entity_type: "lead".to_string(),
            entity_id: stored.id.clone(),
            bitrix_id: crm.external_id().map(str::to_string),
            status: crm.status(),
            request_payload: serde_json::to_value(submitted).unwrap_or_default(),
            error_message: crm.error().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_apartment_request() {
        let apartment: Apartment = serde_json::from_value(json!({
            "id": "B-7",
            "view": "View 2",
            "data": { "Спрат": "7" }
        }))
        .unwrap();

        assert_eq!(apartment.id.as_deref(), Some("B-7"));
        assert_eq!(apartment.data.len(), 1);
        assert_eq!(apartment.floor, None);
    }

    #[test]
    fn test_contact_method_defaults_to_phone() {
        let form: ContactForm = serde_json::from_value(json!({
            "name": "Ana",
            "email": "ana@example.mk",
            "phone": "070123456"
        }))
        .unwrap();

        assert_eq!(form.preferred_contact_method, ContactMethod::Phone);
        assert_eq!(form.message, None);
    }

    #[test]
    fn test_crm_sync_status_mapping() {
        let ok = CrmSync::Succeeded {
            external_id: "42".to_string(),
        };
        assert_eq!(ok.status(), SyncStatus::Success);
        assert_eq!(ok.external_id(), Some("42"));

        let failed = CrmSync::Failed {
            error: "boom".to_string(),
        };
        assert_eq!(failed.status(), SyncStatus::Failed);
        assert_eq!(failed.error(), Some("boom"));

        assert_eq!(CrmSync::Skipped.status(), SyncStatus::Skipped);
        assert_eq!(CrmSync::Skipped.external_id(), None);
    }
}
