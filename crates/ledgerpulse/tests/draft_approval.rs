use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerpulse::workflows::briefing::{
    BriefingError, BriefingService, Client, ClientDirectory, ClientId, ClientUpdate,
    DraftApproval, DraftComposer, Draft, DraftId, DraftStatus, DraftStore, LedgerError,
    LedgerGateway, MailboxError, MailboxGateway, NewDraft, OpenItem, OpenItemKind, ReportKind,
    ReportTree, Snapshot, SnapshotStore, StoreError, TenantId, TenantSettings,
};

struct OfflineLedger;

#[async_trait]
impl LedgerGateway for OfflineLedger {
    async fn fetch_report(
        &self,
        _account_id: &str,
        _kind: ReportKind,
    ) -> Result<ReportTree, LedgerError> {
        Err(LedgerError::Transport("offline".to_string()))
    }

    async fn fetch_open_items(
        &self,
        _account_id: &str,
        _kind: OpenItemKind,
    ) -> Result<Vec<OpenItem>, LedgerError> {
        Err(LedgerError::Transport("offline".to_string()))
    }
}

#[derive(Default)]
struct EmptyDirectory;

impl ClientDirectory for EmptyDirectory {
    fn list_clients(&self, _tenant_id: &TenantId) -> Result<Vec<Client>, StoreError> {
        Ok(Vec::new())
    }

    fn update_client(
        &self,
        _tenant_id: &TenantId,
        _client_id: &ClientId,
        _update: ClientUpdate,
        _next_run_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Client>, StoreError> {
        Ok(None)
    }

    fn set_next_run_at(
        &self,
        _tenant_id: &TenantId,
        _client_id: &ClientId,
        _next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn tenant_settings(&self, _tenant_id: &TenantId) -> Result<TenantSettings, StoreError> {
        Ok(TenantSettings::default())
    }
}

#[derive(Default)]
struct EmptySnapshotStore;

impl SnapshotStore for EmptySnapshotStore {
    fn latest(
        &self,
        _tenant_id: &TenantId,
        _client_id: &ClientId,
    ) -> Result<Option<Snapshot>, StoreError> {
        Ok(None)
    }

    fn append(
        &self,
        _tenant_id: &TenantId,
        _client_id: &ClientId,
        _snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryDraftStore {
    drafts: Mutex<Vec<Draft>>,
    sequence: AtomicU64,
}

impl DraftStore for InMemoryDraftStore {
    fn insert(&self, draft: NewDraft, created_at: DateTime<Utc>) -> Result<Draft, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = Draft {
            id: DraftId(format!("draft-{id:04}")),
            tenant_id: draft.tenant_id,
            client_id: draft.client_id,
            client_name: draft.client_name,
            client_email: draft.client_email,
            subject: draft.subject,
            body: draft.body,
            change_count: draft.change_count,
            status: DraftStatus::Pending,
            mailbox_draft_id: None,
            created_at,
            approved_at: None,
        };
        self.drafts
            .lock()
            .expect("draft mutex")
            .push(stored.clone());
        Ok(stored)
    }

    fn fetch(&self, draft_id: &DraftId) -> Result<Option<Draft>, StoreError> {
        Ok(self
            .drafts
            .lock()
            .expect("draft mutex")
            .iter()
            .find(|draft| draft.id == *draft_id)
            .cloned())
    }

    fn list(&self, tenant_id: &TenantId) -> Result<Vec<Draft>, StoreError> {
        Ok(self
            .drafts
            .lock()
            .expect("draft mutex")
            .iter()
            .rev()
            .filter(|draft| draft.tenant_id == *tenant_id)
            .cloned()
            .collect())
    }

    fn mark_approved(
        &self,
        draft_id: &DraftId,
        approval: DraftApproval,
    ) -> Result<Draft, StoreError> {
        let mut drafts = self.drafts.lock().expect("draft mutex");
        let draft = drafts
            .iter_mut()
            .find(|draft| draft.id == *draft_id)
            .ok_or(StoreError::NotFound)?;
        draft.status = DraftStatus::Approved;
        draft.mailbox_draft_id = approval.mailbox_draft_id;
        draft.approved_at = Some(approval.approved_at);
        Ok(draft.clone())
    }
}

#[derive(Default)]
struct FlakyMailbox {
    failing: AtomicBool,
    created: Mutex<Vec<(String, String)>>,
}

impl FlakyMailbox {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn creations(&self) -> Vec<(String, String)> {
        self.created.lock().expect("mailbox mutex").clone()
    }
}

#[async_trait]
impl MailboxGateway for FlakyMailbox {
    async fn create_draft(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<String, MailboxError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(MailboxError::Transport("mailbox offline".to_string()));
        }
        let mut created = self.created.lock().expect("mailbox mutex");
        created.push((recipient.to_string(), subject.to_string()));
        Ok(format!("mbx-{}", created.len()))
    }
}

fn tenant() -> TenantId {
    TenantId("default".to_string())
}

fn service_with(
    drafts: Arc<InMemoryDraftStore>,
    mailbox: Arc<FlakyMailbox>,
) -> BriefingService {
    BriefingService::new(
        Arc::new(OfflineLedger),
        Arc::new(EmptyDirectory),
        Arc::new(EmptySnapshotStore),
        drafts,
        DraftComposer::deterministic(),
        mailbox,
    )
}

fn pending_draft(drafts: &InMemoryDraftStore, tenant_id: TenantId) -> Draft {
    drafts
        .insert(
            NewDraft {
                tenant_id,
                client_id: ClientId("c1".to_string()),
                client_name: "Client c1".to_string(),
                client_email: "c1@example.com".to_string(),
                subject: "Financial update - Client c1".to_string(),
                body: "Hi Client c1,".to_string(),
                change_count: 2,
            },
            Utc::now(),
        )
        .expect("insert draft")
}

#[tokio::test]
async fn approval_creates_the_mailbox_draft_and_transitions_once() {
    let drafts = Arc::new(InMemoryDraftStore::default());
    let mailbox = Arc::new(FlakyMailbox::default());
    let service = service_with(drafts.clone(), mailbox.clone());

    let draft = pending_draft(&drafts, tenant());
    let approved = service
        .approve_draft(&tenant(), &draft.id)
        .await
        .expect("approval succeeds");

    assert_eq!(approved.status, DraftStatus::Approved);
    assert_eq!(approved.mailbox_draft_id.as_deref(), Some("mbx-1"));
    assert!(approved.approved_at.is_some());

    let creations = mailbox.creations();
    assert_eq!(creations.len(), 1);
    assert_eq!(creations[0].0, "c1@example.com");
    assert_eq!(creations[0].1, "Financial update - Client c1");
}

#[tokio::test]
async fn approving_twice_is_rejected() {
    let drafts = Arc::new(InMemoryDraftStore::default());
    let mailbox = Arc::new(FlakyMailbox::default());
    let service = service_with(drafts.clone(), mailbox.clone());

    let draft = pending_draft(&drafts, tenant());
    service
        .approve_draft(&tenant(), &draft.id)
        .await
        .expect("first approval succeeds");

    let second = service.approve_draft(&tenant(), &draft.id).await;
    assert!(matches!(second, Err(BriefingError::DraftAlreadyProcessed)));
    assert_eq!(mailbox.creations().len(), 1);
}

#[tokio::test]
async fn mailbox_failure_leaves_the_draft_pending() {
    let drafts = Arc::new(InMemoryDraftStore::default());
    let mailbox = Arc::new(FlakyMailbox::default());
    let service = service_with(drafts.clone(), mailbox.clone());

    let draft = pending_draft(&drafts, tenant());
    mailbox.set_failing(true);

    let result = service.approve_draft(&tenant(), &draft.id).await;
    assert!(matches!(result, Err(BriefingError::Mailbox(_))));

    let stored = drafts
        .fetch(&draft.id)
        .expect("fetch")
        .expect("draft still exists");
    assert_eq!(stored.status, DraftStatus::Pending);
    assert_eq!(stored.mailbox_draft_id, None);

    // Once the mailbox recovers the same draft can still be approved.
    mailbox.set_failing(false);
    let approved = service
        .approve_draft(&tenant(), &draft.id)
        .await
        .expect("approval succeeds after recovery");
    assert_eq!(approved.status, DraftStatus::Approved);
}

#[tokio::test]
async fn drafts_from_another_tenant_are_invisible() {
    let drafts = Arc::new(InMemoryDraftStore::default());
    let mailbox = Arc::new(FlakyMailbox::default());
    let service = service_with(drafts.clone(), mailbox.clone());

    let foreign = pending_draft(&drafts, TenantId("other-books".to_string()));
    let result = service.approve_draft(&tenant(), &foreign.id).await;

    assert!(matches!(result, Err(BriefingError::DraftNotFound)));
    assert!(mailbox.creations().is_empty());
}

#[tokio::test]
async fn unknown_draft_is_rejected() {
    let drafts = Arc::new(InMemoryDraftStore::default());
    let mailbox = Arc::new(FlakyMailbox::default());
    let service = service_with(drafts, mailbox);

    let result = service
        .approve_draft(&tenant(), &DraftId("draft-9999".to_string()))
        .await;
    assert!(matches!(result, Err(BriefingError::DraftNotFound)));
}
