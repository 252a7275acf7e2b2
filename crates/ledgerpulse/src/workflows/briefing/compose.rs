use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::diff::{format_currency, format_integer, ChangeRecord, PERCENT_NOT_APPLICABLE};
use super::snapshot::Snapshot;

/// Fixed instruction handed to the natural-language collaborator; caps the
/// length and forbids detail beyond the supplied metrics.
pub const COMPOSER_SYSTEM_INSTRUCTION: &str = "You are a helpful bookkeeping assistant. \
Write concise, professional client update emails. Avoid sensitive data beyond the \
provided metrics. Keep under 180 words.";

/// Structured payload handed to the natural-language collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ComposePayload {
    pub client_name: String,
    pub changes: Vec<ChangeRecord>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftContent {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
    #[error("composer request failed: {0}")]
    Transport(String),
    #[error("composer returned an empty completion")]
    EmptyCompletion,
}

/// Boundary to the optional natural-language composer.
#[async_trait]
pub trait ComposerGateway: Send + Sync {
    async fn compose(&self, payload: &ComposePayload) -> Result<String, ComposerError>;
}

/// Produces the update body: the deterministic template always, a
/// natural-language body when requested and the collaborator cooperates.
/// A collaborator failure silently falls back; composition never blocks or
/// fails the pipeline.
pub struct DraftComposer {
    gateway: Option<Arc<dyn ComposerGateway>>,
}

impl DraftComposer {
    pub fn deterministic() -> Self {
        Self { gateway: None }
    }

    pub fn with_gateway(gateway: Arc<dyn ComposerGateway>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    pub async fn compose(
        &self,
        client_name: &str,
        changes: &[ChangeRecord],
        snapshot: &Snapshot,
        use_natural_language: bool,
    ) -> DraftContent {
        let subject = format!("Financial update - {client_name}");

        if use_natural_language {
            if let Some(gateway) = &self.gateway {
                let payload = ComposePayload {
                    client_name: client_name.to_string(),
                    changes: changes.to_vec(),
                    snapshot: snapshot.clone(),
                };
                match gateway.compose(&payload).await {
                    Ok(body) if !body.trim().is_empty() => {
                        return DraftContent {
                            subject,
                            body: body.trim().to_string(),
                        };
                    }
                    Ok(_) => {
                        tracing::warn!(client = client_name, "composer returned an empty body, using template");
                    }
                    Err(error) => {
                        tracing::warn!(client = client_name, %error, "composer unavailable, using template");
                    }
                }
            }
        }

        DraftContent {
            subject,
            body: build_template(client_name, changes, snapshot),
        }
    }
}

/// Deterministic update body: greeting, one line per change in detector
/// order, the full current snapshot with unknowns spelled out, and a
/// closing invitation.
pub fn build_template(client_name: &str, changes: &[ChangeRecord], snapshot: &Snapshot) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("Hi {client_name},"));
    lines.push(String::new());

    if changes.is_empty() {
        lines.push(
            "No major changes stood out since the last update. Here is a quick snapshot:"
                .to_string(),
        );
    } else {
        lines.push("Here are the most meaningful changes since the last update:".to_string());
        for change in changes {
            lines.push(format!(
                "- {}: {} (was {}, change {})",
                change.label, change.current, change.previous, change.delta
            ));
        }
    }

    lines.push(String::new());
    lines.push("Current snapshot:".to_string());
    lines.push(format!("- Cash: {}", currency_or_marker(snapshot.cash)));
    lines.push(format!(
        "- Accounts receivable: {}",
        currency_or_marker(snapshot.accounts_receivable)
    ));
    lines.push(format!(
        "- Accounts payable: {}",
        currency_or_marker(snapshot.accounts_payable)
    ));
    lines.push(format!(
        "- Net income (last 30 days): {}",
        currency_or_marker(snapshot.net_income_last_30_days)
    ));
    lines.push(format!(
        "- Open invoices: {} ({})",
        count_or_marker(snapshot.invoices_open.map(|s| s.recent_count)),
        currency_or_marker(snapshot.invoices_open.map(|s| s.open_total))
    ));
    lines.push(format!(
        "- Open bills: {} ({})",
        count_or_marker(snapshot.bills_open.map(|s| s.recent_count)),
        currency_or_marker(snapshot.bills_open.map(|s| s.open_total))
    ));

    lines.push(String::new());
    lines.push(
        "If you want a deeper dive or any follow-up, just reply and I can send a detailed report."
            .to_string(),
    );
    lines.push(String::new());
    lines.push("Best,".to_string());
    lines.push("Your bookkeeping team".to_string());

    lines.join("\n")
}

fn currency_or_marker(value: Option<f64>) -> String {
    value
        .map(format_currency)
        .unwrap_or_else(|| PERCENT_NOT_APPLICABLE.to_string())
}

fn count_or_marker(value: Option<u32>) -> String {
    value
        .map(|count| format_integer(f64::from(count)))
        .unwrap_or_else(|| PERCENT_NOT_APPLICABLE.to_string())
}

/// Thin client for a chat-completions style composer endpoint.
pub struct HttpComposerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpComposerClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ComposerGateway for HttpComposerClient {
    async fn compose(&self, payload: &ComposePayload) -> Result<String, ComposerError> {
        let user_content = serde_json::to_string(payload)
            .map_err(|err| ComposerError::Transport(err.to_string()))?;
        let request = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": COMPOSER_SYSTEM_INSTRUCTION },
                { "role": "user", "content": user_content }
            ]
        });

        let response = self
            .http
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ComposerError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ComposerError::Transport(err.to_string()))?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| ComposerError::Transport(err.to_string()))?;

        let body = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let body = body.trim();
        if body.is_empty() {
            return Err(ComposerError::EmptyCompletion);
        }
        Ok(body.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}
