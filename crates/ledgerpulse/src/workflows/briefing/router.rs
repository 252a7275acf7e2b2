use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ClientId, ClientUpdate, DraftId, TenantId};
use super::service::{BriefingError, BriefingService};

/// Router exposing the briefing pipeline over HTTP. Tenancy arrives as a
/// query parameter; callers without one share the default tenant.
pub fn briefing_router(service: Arc<BriefingService>) -> Router {
    Router::new()
        .route("/api/v1/briefings/run", post(run_handler))
        .route("/api/v1/briefings/run-scheduled", post(run_scheduled_handler))
        .route("/api/v1/clients", get(list_clients_handler))
        .route("/api/v1/clients/:client_id", post(update_client_handler))
        .route("/api/v1/drafts", get(list_drafts_handler))
        .route("/api/v1/drafts/:draft_id/approve", post(approve_draft_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TenantQuery {
    tenant: Option<String>,
}

impl TenantQuery {
    fn tenant_id(self) -> TenantId {
        TenantId(self.tenant.unwrap_or_else(|| "default".to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunRequest {
    client_id: Option<String>,
}

async fn run_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
    payload: Option<axum::Json<RunRequest>>,
) -> Response {
    let tenant_id = tenant.tenant_id();
    let client_id = payload
        .and_then(|axum::Json(request)| request.client_id)
        .map(ClientId);
    match service.run_on_demand(&tenant_id, client_id.as_ref()).await {
        Ok(results) => {
            (StatusCode::OK, axum::Json(json!({ "ok": true, "results": results })))
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn run_scheduled_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
) -> Response {
    match service.run_scheduled(&tenant.tenant_id()).await {
        Ok(results) => {
            (StatusCode::OK, axum::Json(json!({ "ok": true, "results": results })))
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn list_clients_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
) -> Response {
    match service.list_clients(&tenant.tenant_id()) {
        Ok(clients) => {
            (StatusCode::OK, axum::Json(json!({ "clients": clients }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn update_client_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
    Path(client_id): Path<String>,
    axum::Json(update): axum::Json<ClientUpdate>,
) -> Response {
    let client_id = ClientId(client_id);
    match service.update_client(&tenant.tenant_id(), &client_id, update) {
        Ok(client) => (StatusCode::OK, axum::Json(json!({ "client": client }))).into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_drafts_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
) -> Response {
    match service.list_drafts(&tenant.tenant_id()) {
        Ok(drafts) => (StatusCode::OK, axum::Json(json!({ "drafts": drafts }))).into_response(),
        Err(error) => error_response(error),
    }
}

async fn approve_draft_handler(
    State(service): State<Arc<BriefingService>>,
    Query(tenant): Query<TenantQuery>,
    Path(draft_id): Path<String>,
) -> Response {
    let draft_id = DraftId(draft_id);
    match service.approve_draft(&tenant.tenant_id(), &draft_id).await {
        Ok(draft) => {
            (StatusCode::OK, axum::Json(json!({ "ok": true, "draft": draft }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: BriefingError) -> Response {
    let status = match &error {
        BriefingError::NoMatchingClients
        | BriefingError::ClientNotFound
        | BriefingError::DraftNotFound => StatusCode::NOT_FOUND,
        BriefingError::DraftAlreadyProcessed => StatusCode::BAD_REQUEST,
        BriefingError::Schedule(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BriefingError::RunInProgress(_) => StatusCode::CONFLICT,
        BriefingError::Collection(_)
        | BriefingError::Store(_)
        | BriefingError::Mailbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use tower::util::ServiceExt;

    use crate::workflows::briefing::compose::DraftComposer;
    use crate::workflows::briefing::domain::{Client, Draft, TenantSettings};
    use crate::workflows::briefing::ledger::{
        LedgerError, LedgerGateway, OpenItem, OpenItemKind, ReportKind,
    };
    use crate::workflows::briefing::mailbox::{MailboxError, MailboxGateway};
    use crate::workflows::briefing::snapshot::Snapshot;
    use crate::workflows::briefing::store::{
        ClientDirectory, DraftApproval, DraftStore, NewDraft, SnapshotStore, StoreError,
    };
    use crate::workflows::briefing::ReportTree;

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

    struct EmptyDraftStore;

    impl DraftStore for EmptyDraftStore {
        fn insert(
            &self,
            _draft: NewDraft,
            _created_at: DateTime<Utc>,
        ) -> Result<Draft, StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }

        fn fetch(&self, _draft_id: &DraftId) -> Result<Option<Draft>, StoreError> {
            Ok(None)
        }

        fn list(&self, _tenant_id: &TenantId) -> Result<Vec<Draft>, StoreError> {
            Ok(Vec::new())
        }

        fn mark_approved(
            &self,
            _draft_id: &DraftId,
            _approval: DraftApproval,
        ) -> Result<Draft, StoreError> {
            Err(StoreError::NotFound)
        }
    }

    struct NullMailbox;

    #[async_trait]
    impl MailboxGateway for NullMailbox {
        async fn create_draft(
            &self,
            _recipient: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<String, MailboxError> {
            Err(MailboxError::Transport("unconfigured".to_string()))
        }
    }

    fn empty_router() -> Router {
        let service = Arc::new(BriefingService::new(
            Arc::new(OfflineLedger),
            Arc::new(EmptyDirectory),
            Arc::new(EmptySnapshotStore),
            Arc::new(EmptyDraftStore),
            DraftComposer::deterministic(),
            Arc::new(NullMailbox),
        ));
        briefing_router(service)
    }

    #[tokio::test]
    async fn listing_drafts_on_an_empty_store_returns_an_empty_set() {
        let response = empty_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/drafts")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["drafts"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn running_without_clients_is_not_found() {
        let response = empty_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/briefings/run")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scheduled_run_with_nothing_due_is_an_empty_success() {
        let response = empty_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/briefings/run-scheduled")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["ok"], serde_json::json!(true));
        assert_eq!(payload["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn approving_an_unknown_draft_is_not_found() {
        let response = empty_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/drafts/draft-0001/approve")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
