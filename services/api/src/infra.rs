use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerpulse::config::AppConfig;
use ledgerpulse::workflows::briefing::{
    AccessTokenProvider, BriefingService, Client, ClientDirectory, ClientId, ClientUpdate,
    DataRow, Draft, DraftApproval, DraftComposer, DraftId, DraftStatus, DraftStore,
    HttpComposerClient, HttpLedgerClient, HttpMailboxClient, LedgerError, LedgerGateway,
    MailboxError, MailboxGateway, NewDraft, OpenItem, OpenItemKind, ReportKind, ReportNode,
    ReportTree, Schedule, SectionNode, Snapshot, SnapshotStore, StoreError, TenantId,
    TenantSettings,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the CLI and server need a handle on after wiring.
pub(crate) struct Wiring {
    pub(crate) service: Arc<BriefingService>,
    pub(crate) demo_ledger: Option<Arc<DemoLedger>>,
}

/// Builds the service from configuration. Each collaborator with real
/// credentials gets its HTTP client; the rest fall back to local stand-ins
/// so the service stays fully operable in development.
pub(crate) fn build_service(config: &AppConfig) -> Wiring {
    let directory = Arc::new(InMemoryClientDirectory::default());
    let snapshots = Arc::new(InMemorySnapshotStore::default());
    let drafts = Arc::new(InMemoryDraftStore::default());

    let (ledger, demo_ledger): (Arc<dyn LedgerGateway>, Option<Arc<DemoLedger>>) =
        match &config.ledger.access_token {
            Some(token) => {
                let provider = Arc::new(StaticAccessTokenProvider {
                    token: token.clone(),
                });
                (
                    Arc::new(HttpLedgerClient::new(&config.ledger.base_url, provider)),
                    None,
                )
            }
            None => {
                info!("no ledger credentials configured, serving the built-in demo ledger");
                let demo = Arc::new(DemoLedger::default());
                seed_demo_data(&directory, &demo);
                (demo.clone(), Some(demo))
            }
        };

    let composer = match &config.composer.api_key {
        Some(api_key) => DraftComposer::with_gateway(Arc::new(HttpComposerClient::new(
            &config.composer.base_url,
            api_key,
            &config.composer.model,
        ))),
        None => DraftComposer::deterministic(),
    };

    let mailbox: Arc<dyn MailboxGateway> = match &config.mailbox.access_token {
        Some(token) => Arc::new(HttpMailboxClient::new(&config.mailbox.base_url, token)),
        None => Arc::new(LocalMailbox::default()),
    };

    let service = Arc::new(BriefingService::new(
        ledger, directory, snapshots, drafts, composer, mailbox,
    ));

    Wiring {
        service,
        demo_ledger,
    }
}

/// Wiring for the CLI demo: always the scripted ledger, deterministic
/// composer, and local mailbox, regardless of configured credentials.
pub(crate) fn build_demo_wiring() -> Wiring {
    let directory = Arc::new(InMemoryClientDirectory::default());
    let snapshots = Arc::new(InMemorySnapshotStore::default());
    let drafts = Arc::new(InMemoryDraftStore::default());
    let demo = Arc::new(DemoLedger::default());
    seed_demo_data(&directory, &demo);

    let service = Arc::new(BriefingService::new(
        demo.clone(),
        directory,
        snapshots,
        drafts,
        DraftComposer::deterministic(),
        Arc::new(LocalMailbox::default()),
    ));

    Wiring {
        service,
        demo_ledger: Some(demo),
    }
}

pub(crate) fn default_tenant() -> TenantId {
    TenantId("default".to_string())
}

fn seed_demo_data(directory: &InMemoryClientDirectory, ledger: &DemoLedger) {
    ledger.set_feed("demo-account-1", DemoFeed::harborview());
    ledger.set_feed("demo-account-2", DemoFeed::marigold());

    directory.add_client(Client {
        id: ClientId("harborview-cafe".to_string()),
        tenant_id: default_tenant(),
        account_id: Some("demo-account-1".to_string()),
        name: "Harborview Cafe".to_string(),
        email: "owner@harborviewcafe.example".to_string(),
        tags: vec!["hospitality".to_string()],
        schedule: Schedule::monthly(1, 9).expect("valid demo schedule"),
        next_run_at: None,
    });
    directory.add_client(Client {
        id: ClientId("marigold-design".to_string()),
        tenant_id: default_tenant(),
        account_id: Some("demo-account-2".to_string()),
        name: "Marigold Design".to_string(),
        email: "accounts@marigolddesign.example".to_string(),
        tags: Vec::new(),
        schedule: Schedule::weekly(1, 9).expect("valid demo schedule"),
        next_run_at: None,
    });
}

pub(crate) struct StaticAccessTokenProvider {
    pub(crate) token: String,
}

#[async_trait]
impl AccessTokenProvider for StaticAccessTokenProvider {
    async fn access_token(&self, _account_id: &str) -> Result<String, LedgerError> {
        Ok(self.token.clone())
    }
}

/// Scripted accounting platform used for development and the CLI demo.
#[derive(Debug, Default, Clone)]
pub(crate) struct DemoFeed {
    pub(crate) cash: Option<f64>,
    pub(crate) receivable: Option<f64>,
    pub(crate) payable: Option<f64>,
    pub(crate) net_income: Option<f64>,
    pub(crate) invoices: Vec<OpenItem>,
    pub(crate) bills: Vec<OpenItem>,
}

impl DemoFeed {
    pub(crate) fn harborview() -> Self {
        Self {
            cash: Some(12_450.0),
            receivable: Some(3_800.0),
            payable: Some(2_150.0),
            net_income: Some(1_920.0),
            invoices: Vec::new(),
            bills: Vec::new(),
        }
    }

    pub(crate) fn marigold() -> Self {
        Self {
            cash: Some(28_700.0),
            receivable: Some(9_100.0),
            payable: Some(4_300.0),
            net_income: Some(5_400.0),
            invoices: Vec::new(),
            bills: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct DemoLedger {
    feeds: Mutex<HashMap<String, DemoFeed>>,
}

impl DemoLedger {
    pub(crate) fn set_feed(&self, account_id: &str, feed: DemoFeed) {
        self.feeds
            .lock()
            .expect("demo feed mutex poisoned")
            .insert(account_id.to_string(), feed);
    }

    fn feed(&self, account_id: &str) -> Result<DemoFeed, LedgerError> {
        self.feeds
            .lock()
            .expect("demo feed mutex poisoned")
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::Transport(format!("unknown demo account {account_id}")))
    }
}

fn amount_section(label: &str, value: Option<f64>) -> Option<ReportNode> {
    value.map(|amount| {
        ReportNode::Section(SectionNode {
            header: Some(DataRow::labeled(label, amount.to_string())),
            summary: None,
            children: Vec::new(),
        })
    })
}

#[async_trait]
impl LedgerGateway for DemoLedger {
    async fn fetch_report(
        &self,
        account_id: &str,
        kind: ReportKind,
    ) -> Result<ReportTree, LedgerError> {
        let feed = self.feed(account_id)?;
        let sections = match kind {
            ReportKind::BalanceSheet => vec![
                amount_section("Cash and cash equivalents", feed.cash),
                amount_section("Accounts receivable", feed.receivable),
                amount_section("Accounts payable", feed.payable),
            ],
            ReportKind::ProfitAndLossLast30Days => {
                vec![amount_section("Net income", feed.net_income)]
            }
        };
        Ok(sections.into_iter().flatten().collect())
    }

    async fn fetch_open_items(
        &self,
        account_id: &str,
        kind: OpenItemKind,
    ) -> Result<Vec<OpenItem>, LedgerError> {
        let feed = self.feed(account_id)?;
        Ok(match kind {
            OpenItemKind::Invoice => feed.invoices,
            OpenItemKind::Bill => feed.bills,
        })
    }
}

#[derive(Default)]
pub(crate) struct InMemoryClientDirectory {
    clients: Mutex<Vec<Client>>,
    settings: Mutex<HashMap<TenantId, TenantSettings>>,
}

impl InMemoryClientDirectory {
    pub(crate) fn add_client(&self, client: Client) {
        self.clients
            .lock()
            .expect("client mutex poisoned")
            .push(client);
    }
}

impl ClientDirectory for InMemoryClientDirectory {
    fn list_clients(&self, tenant_id: &TenantId) -> Result<Vec<Client>, StoreError> {
        Ok(self
            .clients
            .lock()
            .expect("client mutex poisoned")
            .iter()
            .filter(|client| client.tenant_id == *tenant_id)
            .cloned()
            .collect())
    }

    fn update_client(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        update: ClientUpdate,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Client>, StoreError> {
        let mut clients = self.clients.lock().expect("client mutex poisoned");
        let Some(client) = clients
            .iter_mut()
            .find(|client| client.tenant_id == *tenant_id && client.id == *client_id)
        else {
            return Ok(None);
        };
        client.name = update.name;
        client.email = update.email;
        client.tags = update.tags;
        client.schedule = update.schedule;
        client.next_run_at = next_run_at;
        Ok(Some(client.clone()))
    }

    fn set_next_run_at(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut clients = self.clients.lock().expect("client mutex poisoned");
        let client = clients
            .iter_mut()
            .find(|client| client.tenant_id == *tenant_id && client.id == *client_id)
            .ok_or(StoreError::NotFound)?;
        client.next_run_at = next_run_at;
        Ok(())
    }

    fn tenant_settings(&self, tenant_id: &TenantId) -> Result<TenantSettings, StoreError> {
        Ok(self
            .settings
            .lock()
            .expect("settings mutex poisoned")
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct InMemorySnapshotStore {
    history: Mutex<HashMap<(TenantId, ClientId), Vec<Snapshot>>>,
}

impl SnapshotStore for InMemorySnapshotStore {
    fn latest(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
    ) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .history
            .lock()
            .expect("snapshot mutex poisoned")
            .get(&(tenant_id.clone(), client_id.clone()))
            .and_then(|entries| entries.last().cloned()))
    }

    fn append(
        &self,
        tenant_id: &TenantId,
        client_id: &ClientId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        self.history
            .lock()
            .expect("snapshot mutex poisoned")
            .entry((tenant_id.clone(), client_id.clone()))
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryDraftStore {
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
            .expect("draft mutex poisoned")
            .push(stored.clone());
        Ok(stored)
    }

    fn fetch(&self, draft_id: &DraftId) -> Result<Option<Draft>, StoreError> {
        Ok(self
            .drafts
            .lock()
            .expect("draft mutex poisoned")
            .iter()
            .find(|draft| draft.id == *draft_id)
            .cloned())
    }

    fn list(&self, tenant_id: &TenantId) -> Result<Vec<Draft>, StoreError> {
        Ok(self
            .drafts
            .lock()
            .expect("draft mutex poisoned")
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
        let mut drafts = self.drafts.lock().expect("draft mutex poisoned");
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

/// Stand-in mailbox: approvals succeed with a local identifier so the flow
/// stays exercisable without Gmail credentials.
#[derive(Default)]
pub(crate) struct LocalMailbox {
    created: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MailboxGateway for LocalMailbox {
    async fn create_draft(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<String, MailboxError> {
        let mut created = self.created.lock().expect("mailbox mutex poisoned");
        created.push((recipient.to_string(), subject.to_string()));
        Ok(format!("local-draft-{}", created.len()))
    }
}
