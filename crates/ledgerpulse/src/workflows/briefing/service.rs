use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::compose::DraftComposer;
use super::diff::diff;
use super::domain::{
    Client, ClientId, ClientUpdate, Draft, DraftId, DraftStatus, ScheduleError, TenantId,
};
use super::ledger::LedgerGateway;
use super::mailbox::{MailboxError, MailboxGateway};
use super::policy::should_use_composer;
use super::schedule::{is_due, next_run};
use super::snapshot::{CollectionError, SnapshotBuilder};
use super::store::{
    ClientDirectory, DraftApproval, DraftStore, NewDraft, SnapshotStore, StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum BriefingError {
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("no matching clients found")]
    NoMatchingClients,
    #[error("client not found")]
    ClientNotFound,
    #[error("draft not found")]
    DraftNotFound,
    #[error("draft already processed")]
    DraftAlreadyProcessed,
    #[error("a run is already in progress for client {0}")]
    RunInProgress(String),
}

/// Why a run ended without a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// First capture for this client; it only seeds the baseline.
    Baseline,
    /// Nothing crossed the significance thresholds.
    NoChanges,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::NoChanges => "no_changes",
        }
    }
}

/// Per-client result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRunOutcome {
    pub client_id: ClientId,
    pub draft_id: Option<DraftId>,
    pub change_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClientRunOutcome {
    fn completed(client_id: ClientId, draft_id: DraftId, change_count: usize) -> Self {
        Self {
            client_id,
            draft_id: Some(draft_id),
            change_count,
            skipped: None,
            error: None,
        }
    }

    fn skipped(client_id: ClientId, change_count: usize, reason: SkipReason) -> Self {
        Self {
            client_id,
            draft_id: None,
            change_count,
            skipped: Some(reason),
            error: None,
        }
    }

    fn failed(client_id: ClientId, error: String) -> Self {
        Self {
            client_id,
            draft_id: None,
            change_count: 0,
            skipped: None,
            error: Some(error),
        }
    }
}

/// Sequences capture, diff, draft eligibility, and re-scheduling per client.
///
/// Clients in a batch are independent: each runs its own pipeline, failures
/// stay contained, and sibling work is never cancelled. Runs for the same
/// client are serialized through an in-flight set so two overlapping batches
/// cannot interleave the baseline read with the snapshot write.
pub struct BriefingService {
    collector: SnapshotBuilder,
    directory: Arc<dyn ClientDirectory>,
    snapshots: Arc<dyn SnapshotStore>,
    drafts: Arc<dyn DraftStore>,
    composer: DraftComposer,
    mailbox: Arc<dyn MailboxGateway>,
    in_flight: Mutex<HashSet<ClientId>>,
}

impl BriefingService {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        directory: Arc<dyn ClientDirectory>,
        snapshots: Arc<dyn SnapshotStore>,
        drafts: Arc<dyn DraftStore>,
        composer: DraftComposer,
        mailbox: Arc<dyn MailboxGateway>,
    ) -> Self {
        Self {
            collector: SnapshotBuilder::new(ledger),
            directory,
            snapshots,
            drafts,
            composer,
            mailbox,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// On-demand run for one client or the whole roster. Never touches
    /// schedules.
    pub async fn run_on_demand(
        &self,
        tenant_id: &TenantId,
        client_id: Option<&ClientId>,
    ) -> Result<Vec<ClientRunOutcome>, BriefingError> {
        let clients = self.directory.list_clients(tenant_id)?;
        let targets: Vec<Client> = match client_id {
            Some(id) => clients.into_iter().filter(|c| c.id == *id).collect(),
            None => clients,
        };
        if targets.is_empty() {
            return Err(BriefingError::NoMatchingClients);
        }
        Ok(self.run_for_clients(&targets, false).await)
    }

    /// Scheduled run over every client currently due. An empty due set is a
    /// successful no-op.
    pub async fn run_scheduled(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<ClientRunOutcome>, BriefingError> {
        let now = Utc::now();
        let due: Vec<Client> = self
            .directory
            .list_clients(tenant_id)?
            .into_iter()
            .filter(|client| is_due(&client.schedule, client.next_run_at, now))
            .collect();
        Ok(self.run_for_clients(&due, true).await)
    }

    /// Runs the pipeline for each connected client concurrently and returns
    /// one outcome per client. Unconnected clients are excluded up front.
    pub async fn run_for_clients(
        &self,
        clients: &[Client],
        is_scheduled_run: bool,
    ) -> Vec<ClientRunOutcome> {
        let connected: Vec<&Client> = clients
            .iter()
            .filter(|client| client.account_id.is_some())
            .collect();
        info!(
            clients = connected.len(),
            scheduled = is_scheduled_run,
            "briefing batch started"
        );

        let runs = connected.into_iter().map(|client| async move {
            match self.run_client(client, is_scheduled_run).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(client = %client.id.0, %error, "client run failed");
                    ClientRunOutcome::failed(client.id.clone(), error.to_string())
                }
            }
        });

        futures::future::join_all(runs).await
    }

    async fn run_client(
        &self,
        client: &Client,
        is_scheduled_run: bool,
    ) -> Result<ClientRunOutcome, BriefingError> {
        let _slot = self
            .begin(&client.id)
            .ok_or_else(|| BriefingError::RunInProgress(client.id.0.clone()))?;

        let account_id = client
            .account_id
            .as_deref()
            .ok_or(BriefingError::ClientNotFound)?;

        let snapshot = self.collector.build(account_id).await?;
        let previous = self.snapshots.latest(&client.tenant_id, &client.id)?;
        let outcome = diff(&snapshot, previous.as_ref());

        // The capture becomes the next run's baseline no matter how this
        // run classifies.
        self.snapshots
            .append(&client.tenant_id, &client.id, &snapshot)?;

        let change_count = outcome.changes.len();
        let run_outcome = if outcome.is_first_run {
            ClientRunOutcome::skipped(client.id.clone(), change_count, SkipReason::Baseline)
        } else if outcome.changes.is_empty() {
            ClientRunOutcome::skipped(client.id.clone(), change_count, SkipReason::NoChanges)
        } else {
            let settings = self.directory.tenant_settings(&client.tenant_id)?;
            let use_natural_language = should_use_composer(
                settings.composer_mode,
                settings.min_change_count,
                change_count,
                is_scheduled_run,
            );
            let content = self
                .composer
                .compose(&client.name, &outcome.changes, &snapshot, use_natural_language)
                .await;
            let draft = self.drafts.insert(
                NewDraft {
                    tenant_id: client.tenant_id.clone(),
                    client_id: client.id.clone(),
                    client_name: client.name.clone(),
                    client_email: client.email.clone(),
                    subject: content.subject,
                    body: content.body,
                    change_count,
                },
                Utc::now(),
            )?;
            ClientRunOutcome::completed(client.id.clone(), draft.id, change_count)
        };

        // Only scheduled runs move the schedule forward; on-demand runs
        // leave it alone.
        if is_scheduled_run && client.schedule.is_active() {
            let next = next_run(&client.schedule, Utc::now());
            self.directory
                .set_next_run_at(&client.tenant_id, &client.id, next)?;
        }

        Ok(run_outcome)
    }

    /// Approves a pending draft: creates the mailbox draft first, then
    /// records the transition. A mailbox failure leaves the draft pending.
    pub async fn approve_draft(
        &self,
        tenant_id: &TenantId,
        draft_id: &DraftId,
    ) -> Result<Draft, BriefingError> {
        let draft = self
            .drafts
            .fetch(draft_id)?
            .filter(|draft| draft.tenant_id == *tenant_id)
            .ok_or(BriefingError::DraftNotFound)?;
        if draft.status != DraftStatus::Pending {
            return Err(BriefingError::DraftAlreadyProcessed);
        }

        let mailbox_draft_id = self
            .mailbox
            .create_draft(&draft.client_email, &draft.subject, &draft.body)
            .await?;

        let approved = self.drafts.mark_approved(
            draft_id,
            DraftApproval {
                mailbox_draft_id: Some(mailbox_draft_id),
                approved_at: Utc::now(),
            },
        )?;
        Ok(approved)
    }

    pub fn list_drafts(&self, tenant_id: &TenantId) -> Result<Vec<Draft>, BriefingError> {
        Ok(self.drafts.list(tenant_id)?)
    }

    pub fn list_clients(&self, tenant_id: &TenantId) -> Result<Vec<Client>, BriefingError> {
        Ok(self.directory.list_clients(tenant_id)?)
    }

    /// Wholesale client edit. The schedule is validated here, at the edit
    /// boundary, and `next_run_at` is rewritten to keep its invariant: set
    /// from now for an active schedule, cleared otherwise.
    pub fn update_client(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        update: ClientUpdate,
    ) -> Result<Client, BriefingError> {
        update.schedule.validate()?;
        let next_run_at = next_run(&update.schedule, Utc::now());
        self.directory
            .update_client(tenant_id, client_id, update, next_run_at)?
            .ok_or(BriefingError::ClientNotFound)
    }

    fn begin(&self, client_id: &ClientId) -> Option<InFlightSlot<'_>> {
        let mut guard = self.in_flight.lock().expect("in-flight mutex poisoned");
        if !guard.insert(client_id.clone()) {
            return None;
        }
        Some(InFlightSlot {
            registry: &self.in_flight,
            client_id: client_id.clone(),
        })
    }
}

/// Releases the per-client run slot when the pipeline finishes or unwinds.
struct InFlightSlot<'a> {
    registry: &'a Mutex<HashSet<ClientId>>,
    client_id: ClientId,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.registry.lock() {
            guard.remove(&self.client_id);
        }
    }
}
