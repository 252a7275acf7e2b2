use chrono::{DateTime, Utc};

use super::domain::{Client, ClientId, ClientUpdate, Draft, DraftId, TenantId, TenantSettings};
use super::snapshot::Snapshot;

/// Storage failure at any persistence seam.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Client roster and tenant preferences.
///
/// "Most recent snapshot per client" is always read through these seams per
/// run, never through process-wide cached state; a cache would hand a
/// concurrent run a stale baseline.
pub trait ClientDirectory: Send + Sync {
    fn list_clients(&self, tenant_id: &TenantId) -> Result<Vec<Client>, StoreError>;

    fn update_client(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        update: ClientUpdate,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Client>, StoreError>;

    fn set_next_run_at(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    fn tenant_settings(&self, tenant_id: &TenantId) -> Result<TenantSettings, StoreError>;
}

/// Append-only snapshot history; the latest entry is the diff baseline.
pub trait SnapshotStore: Send + Sync {
    fn latest(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
    ) -> Result<Option<Snapshot>, StoreError>;

    fn append(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError>;
}

/// Fields assembled by the orchestrator for a new pending draft.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub client_name: String,
    pub client_email: String,
    pub subject: String,
    pub body: String,
    pub change_count: usize,
}

/// Applied when a pending draft is approved.
#[derive(Debug, Clone)]
pub struct DraftApproval {
    pub mailbox_draft_id: Option<String>,
    pub approved_at: DateTime<Utc>,
}

pub trait DraftStore: Send + Sync {
    fn insert(&self, draft: NewDraft, created_at: DateTime<Utc>) -> Result<Draft, StoreError>;

    fn fetch(&self, draft_id: &DraftId) -> Result<Option<Draft>, StoreError>;

    /// Newest first.
    fn list(&self, tenant_id: &TenantId) -> Result<Vec<Draft>, StoreError>;

    fn mark_approved(
        &self,
        draft_id: &DraftId,
        approval: DraftApproval,
    ) -> Result<Draft, StoreError>;
}
