use std::collections::HashMap;

use anyhow::Result;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripeCustomer {
    pub id: String,
    /// Stripe answers 200 with `deleted: true` for removed customers.
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: String,
}

/// Inputs for a subscription-mode Checkout Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_period_days: i64,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionParams {
    /// Form-encoded body for `POST /v1/checkout/sessions`.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), self.customer_id.clone()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            (
                "subscription_data[trial_period_days]".to_string(),
                self.trial_period_days.to_string(),
            ),
        ];

        // Session metadata serves checkout.session.* events, subscription metadata
        // serves customer.subscription.* events.
        for (key, value) in &self.metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
            body.push((format!("subscription_data[metadata][{}]", key), value.clone()));
        }

        body
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

fn parse_error_envelope(body: &str) -> Option<StripeErrorDetails> {
    serde_json::from_str::<StripeErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error)
}

impl StripeClient {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = parse_error_envelope(&body);
        let stripe_error_message = details.as_ref().and_then(|d| d.message.clone());

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?stripe_error_message,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        match stripe_error_message {
            Some(message) => anyhow::bail!("{}", message),
            None => anyhow::bail!(
                "Stripe API request failed: {} (status {}, request_id={:?})",
                context,
                status,
                request_id
            ),
        }
    }

    /// Creates a Stripe customer tagged with the learner's user id.
    pub async fn create_customer(
        &self,
        email: Option<&str>,
        name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String> {
        // https://stripe.com/docs/api/customers/create
        let mut body = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email {
            body.push(("email", email.to_string()));
        }
        if let Some(name) = name {
            body.push(("name", name.to_string()));
        }

        let resp = self
            .http
            .post(self.endpoint("customers"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        let parsed: StripeCustomer = resp.json().await?;
        Ok(parsed.id)
    }

    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer> {
        // https://stripe.com/docs/api/customers/retrieve
        let resp = self
            .http
            .get(self.endpoint(&format!("customers/{}", customer_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve customer").await?;

        let customer: StripeCustomer = resp.json().await?;
        Ok(customer)
    }

    /// Creates a Checkout Session and returns its id and hosted URL.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<StripeCheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/create
        let resp = self
            .http
            .post(self.endpoint("checkout/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&params.to_form())
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))?;

        Ok(StripeCheckoutSession { id: parsed.id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CheckoutSessionParams {
        CheckoutSessionParams {
            customer_id: "cus_123".to_string(),
            price_id: "price_premium_monthly".to_string(),
            success_url: "https://app.test/billing?success=true".to_string(),
            cancel_url: "https://app.test/billing?canceled=true".to_string(),
            trial_period_days: 14,
            metadata: HashMap::from([("tier".to_string(), "premium".to_string())]),
        }
    }

    fn value_of<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn checkout_form_is_subscription_mode_with_trial() {
        let form = sample_params().to_form();

        assert_eq!(value_of(&form, "mode"), Some("subscription"));
        assert_eq!(value_of(&form, "customer"), Some("cus_123"));
        assert_eq!(
            value_of(&form, "line_items[0][price]"),
            Some("price_premium_monthly")
        );
        assert_eq!(value_of(&form, "line_items[0][quantity]"), Some("1"));
        assert_eq!(
            value_of(&form, "subscription_data[trial_period_days]"),
            Some("14")
        );
    }

    #[test]
    fn checkout_form_copies_metadata_to_session_and_subscription() {
        let form = sample_params().to_form();

        assert_eq!(value_of(&form, "metadata[tier]"), Some("premium"));
        assert_eq!(
            value_of(&form, "subscription_data[metadata][tier]"),
            Some("premium")
        );
    }

    #[test]
    fn parses_stripe_error_envelope() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such price: 'price_x'","param":"line_items[0][price]"}}"#;

        let details = parse_error_envelope(body).unwrap();

        assert_eq!(details.code.as_deref(), Some("resource_missing"));
        assert_eq!(details.message.as_deref(), Some("No such price: 'price_x'"));
        assert!(parse_error_envelope("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn deleted_customer_payload_is_flagged() {
        let live: StripeCustomer =
            serde_json::from_str(r#"{"id":"cus_1","object":"customer","email":"a@b.test"}"#).unwrap();
        let deleted: StripeCustomer =
            serde_json::from_str(r#"{"id":"cus_2","object":"customer","deleted":true}"#).unwrap();

        assert!(!live.deleted);
        assert!(deleted.deleted);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = StripeClient::new("sk_test".to_string(), "http://localhost:12111/".to_string());
        assert_eq!(
            client.endpoint("customers"),
            "http://localhost:12111/v1/customers"
        );
    }
}
