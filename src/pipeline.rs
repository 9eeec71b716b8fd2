//! Lead submission pipeline
//!
//! One form submission fans out to two independent systems:
//! 1. Validate the contact form (no side effects on failure)
//! 2. Mirror the lead into Bitrix24 (best-effort, failure downgraded)
//! 3. Persist the lead in the store under a hard timeout (authoritative)
//! 4. Write the sync audit entry in the background (fire-and-forget)
//!
//! The CRM call runs before the store write because the stored lead carries
//! the CRM id.

use crate::attributes::extract_facts;
use crate::bitrix_client::CrmClient;
use crate::errors::{CrmError, SubmitError};
use crate::lead_store::{AuditLog, LeadStore};
use crate::models::{Apartment, ContactForm, CrmSync, LeadStatus, NewLead, StoredLead, SyncLogEntry};
use crate::validation::{validate_contact, ValidContact};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Budget for the store write.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_VIEW: &str = "View 1";

fn default_page_path() -> String {
    "/".to_string()
}

/// Input of one submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadRequest {
    #[serde(default)]
    pub apartment: Apartment,
    #[serde(default)]
    pub contact: ContactForm,
    /// Page the form was opened on.
    #[serde(default = "default_page_path")]
    pub page_path: String,
}

/// A lead the store accepted, with the outcome of the CRM mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub lead: StoredLead,
    pub crm: CrmSync,
}

pub struct LeadPipeline {
    crm: Arc<dyn CrmClient>,
    store: Arc<dyn LeadStore>,
    audit: Arc<dyn AuditLog>,
    store_timeout: Duration,
}

impl LeadPipeline {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        store: Arc<dyn LeadStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            crm,
            store,
            audit,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Runs one submission end to end.
    ///
    /// Succeeds once the store write succeeds, whatever happened to the CRM
    /// mirror. Resubmitting creates another lead.
    pub async fn submit(&self, request: &LeadRequest) -> Result<Submission, SubmitError> {
        // 1. Validate before anything touches the network
        let contact = validate_contact(&request.contact).map_err(SubmitError::Validation)?;

        // An unconfigured store fails the submission anyway; bail out before
        // creating an orphan CRM lead.
        if !self.store.is_ready() {
            tracing::error!("Lead store not configured, rejecting submission");
            return Err(SubmitError::StoreNotConfigured);
        }

        let mut lead = build_lead(&request.apartment, contact, &request.page_path);

        // 2. CRM mirror
        let crm = self.mirror_to_crm(&lead).await;
        lead.bitrix_lead_id = crm.external_id().map(str::to_string);

        // 3. Durable write
        let stored = self.persist(&lead).await?;
        tracing::info!("✓ Lead {} saved (crm: {})", stored.id, crm.status());

        // 4. Audit entry
        self.spawn_audit(SyncLogEntry::lead_create(&stored, &lead, &crm));

        Ok(Submission { lead: stored, crm })
    }

    async fn mirror_to_crm(&self, lead: &NewLead) -> CrmSync {
        if !self.crm.is_configured() {
            tracing::info!("Bitrix integration not configured, skipping CRM mirror");
            return CrmSync::Skipped;
        }

        match self.crm.create_lead(lead).await {
            Ok(external_id) => CrmSync::Succeeded { external_id },
            Err(CrmError::NotConfigured) => {
                tracing::info!("Bitrix integration unconfigured mid-flight, skipping");
                CrmSync::Skipped
            }
            Err(e) => {
                tracing::warn!("⚠️  Bitrix mirror failed, continuing with store: {}", e);
                CrmSync::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Store write raced against the timeout. The losing future is dropped,
    /// so a late store answer is never observed.
    async fn persist(&self, lead: &NewLead) -> Result<StoredLead, SubmitError> {
        match tokio::time::timeout(self.store_timeout, self.store.create_lead(lead)).await {
            Ok(Ok(stored)) => Ok(stored),
            Ok(Err(e)) => {
                tracing::error!("Failed to store lead: {}", e);
                Err(SubmitError::from(e))
            }
            Err(_) => {
                tracing::error!(
                    "Lead store did not answer within {:?}",
                    self.store_timeout
                );
                Err(SubmitError::StoreTimeout)
            }
        }
    }

    fn spawn_audit(&self, entry: SyncLogEntry) {
        let audit = Arc::clone(&self.audit);

        tokio::spawn(async move {
            match audit.log_sync(&entry).await {
                Ok(()) => tracing::debug!("Sync entry logged for lead {}", entry.entity_id),
                Err(e) => tracing::warn!(
                    "⚠️  Failed to log sync for lead {}: {}",
                    entry.entity_id,
                    e
                ),
            }
        });
    }
}

/// Assembles the lead row from validated contact details and the apartment
/// context.
pub fn build_lead(apartment: &Apartment, contact: ValidContact, page_path: &str) -> NewLead {
    let facts = extract_facts(apartment);

    NewLead {
        apartment_id: apartment.id.clone(),
        apartment_floor: facts.floor,
        apartment_size: facts.size,
        apartment_price: facts.price,
        apartment_bedrooms: facts.bedrooms,
        contact_name: contact.name,
        contact_email: contact.email,
        contact_phone: contact.phone,
        preferred_contact_method: contact.preferred_contact_method,
        message: contact.message,
        source: format!(
            "{} - {}",
            page_path,
            apartment.view.as_deref().unwrap_or(DEFAULT_VIEW)
        ),
        status: LeadStatus::New,
        bitrix_lead_id: None,
    }
}
