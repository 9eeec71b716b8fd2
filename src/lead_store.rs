use crate::errors::StoreError;
use crate::models::{NewLead, StoredLead, SyncLogEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Authoritative store for leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Whether the store has a backend to write to.
    fn is_ready(&self) -> bool {
        true
    }

    /// Inserts a lead and returns it with its generated id and timestamp.
    async fn create_lead(&self, lead: &NewLead) -> Result<StoredLead, StoreError>;
}

/// Sink for CRM sync audit entries.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_sync(&self, entry: &SyncLogEntry) -> Result<(), StoreError>;
}

/// Postgres (Supabase) storage for the `leads` and `sync_log` tables.
///
/// Built without a pool when no database is configured; every call then
/// fails with [`StoreError::NotInitialized`].
#[derive(Clone)]
pub struct PgLeadStore {
    pool: Option<PgPool>,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn unconfigured() -> Self {
        Self { pool: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    fn pool(&self) -> Result<&PgPool, StoreError> {
        self.pool.as_ref().ok_or(StoreError::NotInitialized)
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    fn is_ready(&self) -> bool {
        self.is_initialized()
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<StoredLead, StoreError> {
        let pool = self.pool()?;

        let (id, created_at): (String, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO leads (
                apartment_id,
                apartment_floor,
                apartment_size,
                apartment_price,
                apartment_bedrooms,
                contact_name,
                contact_email,
                contact_phone,
                preferred_contact_method,
                message,
                status,
                source,
                bitrix_lead_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id::text, created_at
            "#,
        )
        .bind(&lead.apartment_id)
        .bind(lead.apartment_floor)
        .bind(lead.apartment_size)
        .bind(lead.apartment_price)
        .bind(lead.apartment_bedrooms)
        .bind(&lead.contact_name)
        .bind(&lead.contact_email)
        .bind(&lead.contact_phone)
        .bind(lead.preferred_contact_method.as_str())
        .bind(&lead.message)
        .bind(lead.status.as_str())
        .bind(&lead.source)
        .bind(&lead.bitrix_lead_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error creating lead: {:?}", e);
            StoreError::from(e)
        })?;

        tracing::debug!("Stored lead {}", id);

        Ok(StoredLead {
            id,
            created_at,
            lead: lead.clone(),
        })
    }
}

#[async_trait]
impl AuditLog for PgLeadStore {
    async fn log_sync(&self, entry: &SyncLogEntry) -> Result<(), StoreError> {
        let pool = self.pool()?;

        sqlx::query(
            r#"
            INSERT INTO sync_log (
                sync_type,
                entity_type,
                entity_id,
                bitrix_id,
                status,
                request_payload,
                error_message
            )
            VALUES ($1, $2, $3::uuid, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.sync_type)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.bitrix_id)
        .bind(entry.status.as_str())
        .bind(&entry.request_payload)
        .bind(&entry.error_message)
        .execute(pool)
        .await?;

        tracing::debug!(
            "Logged {} sync for {} {}",
            entry.status,
            entry.entity_type,
            entry.entity_id
        );
        Ok(())
    }
}
