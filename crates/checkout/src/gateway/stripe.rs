//! Stripe Checkout Sessions over the REST API (no SDK dependency).

use std::time::Duration;

use async_trait::async_trait;

use super::{
    CreateSessionRequest, GatewayError, GatewaySession, PaymentGateway, SessionSnapshot,
    SessionStatus,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Payment gateway backed by Stripe embedded Checkout.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
    return_url: String,
}

impl StripeGateway {
    /// Creates a gateway client.
    ///
    /// `return_url` may contain the `{CHECKOUT_SESSION_ID}` placeholder, which
    /// Stripe substitutes before redirecting the browser back.
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            return_url: return_url.into(),
        })
    }

    async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(resp.json().await?)
    }
}

/// Longest raw error body carried into a [`GatewayError::Status`] message.
const MAX_ERROR_BODY: usize = 200;

/// Pulls a readable message out of an error response body.
///
/// Stripe errors carry `error.message`; anything else (proxy HTML pages,
/// plain text) is passed through trimmed and truncated.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(message) = value["error"]["message"].as_str()
    {
        return message.to_string();
    }
    let text = body.trim();
    if text.is_empty() {
        "no error message".to_string()
    } else {
        text.chars().take(MAX_ERROR_BODY).collect()
    }
}

/// Builds the retrieve URL for a checkout session.
///
/// The id is appended as a single percent-encoded path segment, so `/`, `?`
/// and `#` inside it can never reach another endpoint.
pub fn session_url(api_base: &str, session_id: &str) -> Result<reqwest::Url, GatewayError> {
    if session_id.is_empty() || session_id.chars().all(|c| c == '.') {
        return Err(GatewayError::Request(format!(
            "invalid checkout session id {session_id:?}"
        )));
    }
    let mut url = reqwest::Url::parse(api_base)
        .map_err(|e| GatewayError::Request(format!("invalid api base {api_base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| GatewayError::Request(format!("api base {api_base} cannot hold a path")))?
        .pop_if_empty()
        .extend(["v1", "checkout", "sessions", session_id]);
    Ok(url)
}

/// Builds the form body for `POST /v1/checkout/sessions`.
pub fn session_form(request: &CreateSessionRequest, return_url: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("ui_mode".to_string(), "embedded".to_string()),
        ("return_url".to_string(), return_url.to_string()),
        (
            "client_reference_id".to_string(),
            request.client_reference.clone(),
        ),
    ];
    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.cents().to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(image) = &item.image {
            form.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    form
}

/// Extracts the fields we need from a retrieved checkout session.
pub fn parse_session(body: &serde_json::Value) -> Result<SessionSnapshot, GatewayError> {
    let status = body["status"]
        .as_str()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("session without status: {body}")))?;

    // `payment_intent` is a string id unless the caller asked for expansion.
    let payment_id = match &body["payment_intent"] {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Object(obj) => obj.get("id").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    };

    Ok(SessionSnapshot {
        status: SessionStatus::parse(status),
        payment_id,
        customer_email: body["customer_details"]["email"]
            .as_str()
            .or_else(|| body["customer_email"].as_str())
            .map(String::from),
    })
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&session_form(request, &self.return_url))
            .send()
            .await?;
        let body = Self::read_json(resp).await?;

        let session_id = body["id"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse(format!("session without id: {body}")))?;
        let client_secret = body["client_secret"].as_str().ok_or_else(|| {
            GatewayError::InvalidResponse(format!("session {session_id} without client_secret"))
        })?;

        Ok(GatewaySession {
            session_id: session_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, GatewayError> {
        let resp = self
            .client
            .get(session_url(&self.api_base, session_id)?)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        let body = Self::read_json(resp).await?;
        parse_session(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LineItem;
    use store::Money;

    fn request() -> CreateSessionRequest {
        CreateSessionRequest {
            idempotency_key: "key-1".to_string(),
            client_reference: "42".to_string(),
            customer_email: Some("asha@example.com".to_string()),
            currency: "inr".to_string(),
            line_items: vec![
                LineItem {
                    name: "Paneer Tikka".to_string(),
                    unit_amount: Money::from_cents(950),
                    quantity: 1,
                    image: Some("https://img.example/5.png".to_string()),
                },
                LineItem {
                    name: "Mango Lassi".to_string(),
                    unit_amount: Money::from_cents(500),
                    quantity: 2,
                    image: None,
                },
            ],
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form_encodes_line_items() {
        let form = session_form(&request(), "https://app.example/return?session_id={CHECKOUT_SESSION_ID}");
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "ui_mode"), Some("embedded"));
        assert_eq!(value(&form, "client_reference_id"), Some("42"));
        assert_eq!(value(&form, "customer_email"), Some("asha@example.com"));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("950"));
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][images][0]"),
            Some("https://img.example/5.png")
        );
        assert_eq!(value(&form, "line_items[1][quantity]"), Some("2"));
        assert_eq!(value(&form, "line_items[1][price_data][currency]"), Some("inr"));
        assert_eq!(
            value(&form, "line_items[1][price_data][product_data][images][0]"),
            None
        );
    }

    #[test]
    fn test_parse_completed_session() {
        let body = serde_json::json!({
            "id": "cs_test_a1",
            "status": "complete",
            "payment_intent": "pi_123",
            "customer_details": { "email": "asha@example.com" }
        });
        let snapshot = parse_session(&body).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Complete);
        assert_eq!(snapshot.payment_id.as_deref(), Some("pi_123"));
        assert_eq!(snapshot.customer_email.as_deref(), Some("asha@example.com"));
    }

    #[test]
    fn test_parse_expanded_payment_intent() {
        let body = serde_json::json!({
            "status": "complete",
            "payment_intent": { "id": "pi_456", "object": "payment_intent" },
            "customer_details": null
        });
        let snapshot = parse_session(&body).unwrap();
        assert_eq!(snapshot.payment_id.as_deref(), Some("pi_456"));
        assert_eq!(snapshot.customer_email, None);
    }

    #[test]
    fn test_parse_expired_session_without_payment() {
        let body = serde_json::json!({ "status": "expired", "payment_intent": null });
        let snapshot = parse_session(&body).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Expired);
        assert_eq!(snapshot.payment_id, None);
    }

    #[test]
    fn test_parse_rejects_missing_status() {
        let err = parse_session(&serde_json::json!({ "id": "cs_1" })).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let gateway = StripeGateway::new("sk_test", "https://api.stripe.com/", "https://x").unwrap();
        assert_eq!(gateway.api_base, "https://api.stripe.com");
    }

    #[test]
    fn test_session_url_appends_encoded_id() {
        let url = session_url("https://api.stripe.com", "cs_test_a1").unwrap();
        assert_eq!(url.as_str(), "https://api.stripe.com/v1/checkout/sessions/cs_test_a1");

        let url = session_url("http://localhost:12111/stripe", "cs_1").unwrap();
        assert_eq!(url.path(), "/stripe/v1/checkout/sessions/cs_1");
    }

    #[test]
    fn test_session_url_keeps_traversal_inside_one_segment() {
        let url =
            session_url("https://api.stripe.com", "../../customers/cus_victim?expand[]=sources")
                .unwrap();
        assert_eq!(url.host_str(), Some("api.stripe.com"));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url.path().starts_with("/v1/checkout/sessions/"));
        assert!(!url.path().contains("/customers"));
        assert_eq!(url.path_segments().unwrap().count(), 4);

        let url = session_url("https://api.stripe.com", "cs_1#frag").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_session_url_rejects_dot_and_empty_ids() {
        for id in ["", ".", ".."] {
            let err = session_url("https://api.stripe.com", id).unwrap_err();
            assert!(matches!(err, GatewayError::Request(_)));
        }
    }

    #[test]
    fn test_error_message_prefers_stripe_error() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such checkout.session: cs_x"}}"#;
        assert_eq!(error_message(body), "No such checkout.session: cs_x");
    }

    #[test]
    fn test_error_message_falls_back_to_body_text() {
        assert_eq!(
            error_message("<html><body>502 Bad Gateway</body></html>\n"),
            "<html><body>502 Bad Gateway</body></html>"
        );
        assert_eq!(error_message("{\"unexpected\":true}"), "{\"unexpected\":true}");
        assert_eq!(error_message("   "), "no error message");
        assert_eq!(error_message(&"x".repeat(500)).len(), MAX_ERROR_BODY);
    }
}
