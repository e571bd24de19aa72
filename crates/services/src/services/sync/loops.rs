//! Loops (email platform) client.

use std::time::Duration;

use async_trait::async_trait;
use db::models::outbox::{OutboxEventType, SyncTarget};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ContactSink, SyncError, error_for_response};
use crate::services::{config::ApiTargetConfig, contact::ContactPayload};

pub const CONTACT_SOURCE: &str = "World Staffing Awards";

#[derive(Debug, Deserialize)]
struct LoopsResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct LoopsClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for LoopsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopsClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<secret>")
            .finish()
    }
}

/// Body for `PUT /contacts/update`. Loops creates the contact when the email
/// is unknown.
pub fn contact_body(contact: &ContactPayload) -> Value {
    let mut body = Map::new();
    body.insert("email".into(), json!(contact.email));
    body.insert("source".into(), json!(CONTACT_SOURCE));
    body.insert("userGroup".into(), json!(contact.role.to_string()));
    body.insert("wsaYear".into(), json!(contact.campaign_year));

    let optional = [
        ("firstName", &contact.firstname),
        ("lastName", &contact.lastname),
        ("company", &contact.company),
        ("jobTitle", &contact.job_title),
        ("country", &contact.country),
        ("linkedin", &contact.linkedin),
        ("wsaCategory", &contact.category),
        ("liveUrl", &contact.live_url),
    ];
    for (key, value) in optional {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            body.insert(key.into(), json!(v));
        }
    }
    Value::Object(body)
}

impl LoopsClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(config: &ApiTargetConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("wsa-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.token.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), SyncError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let parsed: LoopsResponse = response.json().await?;
        if !parsed.success {
            return Err(SyncError::Response(
                parsed.message.unwrap_or_else(|| "success: false".to_string()),
            ));
        }
        Ok(())
    }

    pub async fn upsert_contact(&self, contact: &ContactPayload) -> Result<(), SyncError> {
        let request = self
            .http
            .put(format!("{}/contacts/update", self.base_url))
            .json(&contact_body(contact));
        self.send(request).await
    }

    pub async fn send_event(
        &self,
        email: &str,
        event_name: &str,
        properties: Value,
    ) -> Result<(), SyncError> {
        let request = self
            .http
            .post(format!("{}/events/send", self.base_url))
            .json(&json!({
                "email": email,
                "eventName": event_name,
                "eventProperties": properties,
            }));
        self.send(request).await
    }
}

#[async_trait]
impl ContactSink for LoopsClient {
    fn target(&self) -> SyncTarget {
        SyncTarget::Loops
    }

    /// Upsert the contact, then fire the matching event so Loops can send
    /// the campaign email.
    async fn deliver(
        &self,
        event: OutboxEventType,
        contact: &ContactPayload,
    ) -> Result<(), SyncError> {
        self.upsert_contact(contact).await?;
        let properties = json!({
            "category": contact.category,
            "subcategoryId": contact.subcategory_id,
            "liveUrl": contact.live_url,
            "wsaYear": contact.campaign_year,
        });
        self.send_event(&contact.email, &event.to_string(), properties)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::State,
        http::StatusCode,
        routing::{post, put},
    };

    use super::*;
    use crate::services::contact::ContactRole;

    type Calls = Arc<Mutex<Vec<(&'static str, Value)>>>;

    async fn update(State(calls): State<Calls>, Json(body): Json<Value>) -> Json<Value> {
        calls.lock().unwrap().push(("update", body));
        Json(json!({ "success": true, "id": "c_1" }))
    }

    async fn event(State(calls): State<Calls>, Json(body): Json<Value>) -> Json<Value> {
        calls.lock().unwrap().push(("event", body));
        Json(json!({ "success": true }))
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/v1")
    }

    fn client(base_url: String) -> LoopsClient {
        LoopsClient::new(&ApiTargetConfig {
            base_url,
            token: SecretString::from("loops-test"),
        })
        .unwrap()
    }

    fn voter() -> ContactPayload {
        ContactPayload {
            email: "vic@example.com".into(),
            firstname: Some("Vic".into()),
            lastname: Some("Voter".into()),
            company: None,
            job_title: None,
            phone: None,
            country: Some("".into()),
            linkedin: None,
            role: ContactRole::Voter,
            campaign_year: "2026".into(),
            subcategory_id: Some("top-recruiter".into()),
            category: Some("Top Recruiter".into()),
            live_url: Some("https://awards.example.com/nominee/jane-doe".into()),
        }
    }

    #[test]
    fn contact_body_uses_loops_field_names() {
        let body = contact_body(&voter());
        assert_eq!(body["firstName"], "Vic");
        assert_eq!(body["userGroup"], "voter");
        assert_eq!(body["source"], CONTACT_SOURCE);
        assert!(body.get("country").is_none());
        assert!(body.get("company").is_none());
    }

    #[tokio::test]
    async fn deliver_upserts_then_sends_event() {
        let calls: Calls = Arc::default();
        let router = Router::new()
            .route("/api/v1/contacts/update", put(update))
            .route("/api/v1/events/send", post(event))
            .with_state(calls.clone());
        let base = serve(router).await;

        client(base)
            .deliver(OutboxEventType::VoteCast, &voter())
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "update");
        assert_eq!(calls[0].1["email"], "vic@example.com");
        assert_eq!(calls[1].0, "event");
        assert_eq!(calls[1].1["eventName"], "vote_cast");
        assert_eq!(calls[1].1["eventProperties"]["category"], "Top Recruiter");
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let router = Router::new().route(
            "/api/v1/contacts/update",
            put(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(router).await;

        let err = client(base).upsert_contact(&voter()).await.unwrap_err();
        assert!(matches!(err, SyncError::Http { status: 429, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unsuccessful_body_is_permanent() {
        let router = Router::new().route(
            "/api/v1/contacts/update",
            put(|| async { Json(json!({ "success": false, "message": "Invalid email" })) }),
        );
        let base = serve(router).await;

        let err = client(base).upsert_contact(&voter()).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "unexpected response: Invalid email");
    }
}
