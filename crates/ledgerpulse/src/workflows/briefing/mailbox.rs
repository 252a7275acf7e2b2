use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("mailbox request failed: {0}")]
    Transport(String),
    #[error("mailbox rejected the draft: {0}")]
    Rejected(String),
}

/// Boundary to the client-facing mailbox; invoked only once a human
/// approves a pending draft.
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    /// Creates a draft in the tenant's mailbox and returns its identifier.
    async fn create_draft(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MailboxError>;
}

/// Thin client for a Gmail-style drafts endpoint. The message travels as a
/// base64url-encoded RFC 2822 payload; token acquisition and refresh stay
/// with the caller.
pub struct HttpMailboxClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpMailboxClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }
}

pub(crate) fn encode_raw_message(recipient: &str, subject: &str, body: &str) -> String {
    let message = [
        format!("To: {recipient}"),
        format!("Subject: {subject}"),
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        "Content-Transfer-Encoding: 7bit".to_string(),
        String::new(),
        body.to_string(),
    ]
    .join("\n");

    URL_SAFE_NO_PAD.encode(message)
}

#[async_trait]
impl MailboxGateway for HttpMailboxClient {
    async fn create_draft(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MailboxError> {
        let raw = encode_raw_message(recipient, subject, body);
        let request = json!({ "message": { "raw": raw } });

        let response = self
            .http
            .post(format!(
                "{}/gmail/v1/users/me/drafts",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|err| MailboxError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(MailboxError::Rejected(format!("{status}: {detail}")));
        }

        let created: CreatedDraft = response
            .json()
            .await
            .map_err(|err| MailboxError::Transport(err.to_string()))?;
        Ok(created.id)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedDraft {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_message_is_base64url_without_padding() {
        let raw = encode_raw_message("client@example.com", "Financial update", "Hi,\n\nAll good.");
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!raw.ends_with('='));

        let decoded = URL_SAFE_NO_PAD.decode(raw).expect("round-trips");
        let text = String::from_utf8(decoded).expect("utf-8");
        assert!(text.starts_with("To: client@example.com\nSubject: Financial update\n"));
        assert!(text.ends_with("\n\nHi,\n\nAll good."));
    }
}
