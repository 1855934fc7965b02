use crate::domain::UserEmail;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";
const MESSAGE_STREAM: &str = "outbound";

/// A transactional email addressed to one user.
#[derive(Debug)]
pub struct OutgoingEmail<'a> {
    pub to: &'a UserEmail,
    pub subject: &'a str,
    pub html_body: &'a str,
    pub text_body: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to reach the email provider")]
    Transport(#[from] reqwest::Error),
    #[error("Email provider rejected the message with {status} (code {error_code}): {message}")]
    Rejected {
        status: StatusCode,
        error_code: i64,
        message: String,
    },
}

/// Client for a Postmark-compatible email API.
#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: UserEmail,
    server_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: UserEmail,
        server_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url,
            sender,
            server_token,
        })
    }

    #[tracing::instrument(
        name = "Send email",
        skip_all,
        fields(recipient = %email.to, subject = email.subject)
    )]
    pub async fn send(&self, email: &OutgoingEmail<'_>) -> Result<(), EmailError> {
        let body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: email.to.as_ref(),
            subject: email.subject,
            html_body: email.html_body,
            text_body: email.text_body,
            message_stream: MESSAGE_STREAM,
        };

        let response = self
            .http_client
            .post(format!("{}/email", self.base_url))
            .header(SERVER_TOKEN_HEADER, self.server_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let rejection = response
            .json::<ProviderError>()
            .await
            .unwrap_or_else(|_| ProviderError {
                error_code: -1,
                message: "No error details".to_string(),
            });

        Err(EmailError::Rejected {
            status,
            error_code: rejection.error_code,
            message: rejection.message,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderError {
    error_code: i64,
    message: String,
}
