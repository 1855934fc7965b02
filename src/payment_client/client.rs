use super::{Customer, SubscriptionSnapshot, USER_ID_METADATA_KEY};
use crate::domain::UserEmail;
use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use uuid::Uuid;

/// Client for the payment processor's form-encoded REST API.
#[derive(Clone)]
pub struct PaymentClient {
    http_client: Client,
    base_url: String,
    secret_key: Secret<String>,
}

impl PaymentClient {
    pub fn new(
        base_url: String,
        secret_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            secret_key,
        })
    }

    #[tracing::instrument(name = "Create processor customer", skip(self, email))]
    pub async fn create_customer(
        &self,
        email: &UserEmail,
        user_id: Uuid,
    ) -> Result<String, anyhow::Error> {
        let body = [
            ("email".to_string(), email.to_string()),
            (metadata_field(), user_id.to_string()),
        ];

        let customer: Customer = self
            .send(self.post("/v1/customers").form(&body), "create customer")
            .await?;

        Ok(customer.id)
    }

    #[tracing::instrument(name = "Retrieve processor customer", skip(self))]
    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, anyhow::Error> {
        let request = self
            .http_client
            .get(self.url(&format!("/v1/customers/{}", object_id(customer_id)?)))
            .bearer_auth(self.secret_key.expose_secret());

        self.send(request, "retrieve customer").await
    }

    #[tracing::instrument(name = "Attach payment method", skip(self))]
    pub async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), anyhow::Error> {
        let body = [("customer", customer_id)];

        let _: IgnoredObject = self
            .send(
                self.post(&format!(
                    "/v1/payment_methods/{}/attach",
                    object_id(payment_method_id)?
                ))
                    .form(&body),
                "attach payment method",
            )
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Set default payment method", skip(self))]
    pub async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), anyhow::Error> {
        let body = [(
            "invoice_settings[default_payment_method]",
            payment_method_id,
        )];

        let _: IgnoredObject = self
            .send(
                self.post(&format!("/v1/customers/{}", object_id(customer_id)?))
                    .form(&body),
                "set default payment method",
            )
            .await?;

        Ok(())
    }

    /// Creates a subscription for a single price, expanding the first invoice's
    /// payment intent so that its client secret can be handed to the browser.
    #[tracing::instrument(name = "Create processor subscription", skip(self))]
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        user_id: Uuid,
    ) -> Result<SubscriptionSnapshot, anyhow::Error> {
        let body = [
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            (metadata_field(), user_id.to_string()),
            (
                "expand[]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];

        self.send(
            self.post("/v1/subscriptions").form(&body),
            "create subscription",
        )
        .await
    }

    #[tracing::instrument(name = "Retrieve processor subscription", skip(self))]
    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, anyhow::Error> {
        let request = self
            .http_client
            .get(self.url(&format!(
                "/v1/subscriptions/{}",
                object_id(subscription_id)?
            )))
            .bearer_auth(self.secret_key.expose_secret());

        self.send(request, "retrieve subscription").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(self.url(path))
            .bearer_auth(self.secret_key.expose_secret())
    }

    async fn send<T>(&self, request: RequestBuilder, context: &'static str) -> Result<T, anyhow::Error>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {context}"))?;

        ensure_success(response, context)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to decode {context} response"))
    }
}

/// Processor object ids such as `cus_123` or `pm_card_visa`.
pub fn is_object_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ids end up in URL paths, so anything else could address another endpoint.
fn object_id(id: &str) -> Result<&str, anyhow::Error> {
    if is_object_id(id) {
        Ok(id)
    } else {
        anyhow::bail!("`{id}` is not a valid processor object id")
    }
}

fn metadata_field() -> String {
    format!("metadata[{USER_ID_METADATA_KEY}]")
}

async fn ensure_success(response: Response, context: &str) -> Result<Response, anyhow::Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let request_id = response
        .headers()
        .get("request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    let body = response.text().await.unwrap_or_default();
    let error = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error)
        .ok();

    tracing::error!(
        status = %status,
        processor_request_id = ?request_id,
        processor_error_type = ?error.as_ref().and_then(|e| e.type_.as_deref()),
        processor_error_code = ?error.as_ref().and_then(|e| e.code.as_deref()),
        processor_error_message = ?error.as_ref().and_then(|e| e.message.as_deref()),
        "Payment processor request failed"
    );

    anyhow::bail!("Payment processor request failed: {context} (status {status})")
}

#[derive(Deserialize)]
struct IgnoredObject {}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}
