//! HubSpot CRM contacts client.

use std::time::Duration;

use async_trait::async_trait;
use db::models::outbox::{OutboxEventType, SyncTarget};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ContactSink, SyncError, error_for_response};
use crate::services::{config::ApiTargetConfig, contact::ContactPayload};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ContactRef>,
}

#[derive(Debug, Deserialize)]
struct ContactRef {
    id: String,
}

#[derive(Clone)]
pub struct HubspotClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl std::fmt::Debug for HubspotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubspotClient")
            .field("base_url", &self.base_url)
            .field("token", &"<secret>")
            .finish()
    }
}

/// Contact properties in HubSpot's naming. Unset fields are left out so an
/// update never blanks data HubSpot already holds.
pub fn contact_properties(contact: &ContactPayload) -> Map<String, Value> {
    let mut props = Map::new();
    let mut put = |key: &str, value: Option<&str>| {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            props.insert(key.to_string(), Value::String(v.to_string()));
        }
    };
    put("email", Some(contact.email.as_str()));
    put("firstname", contact.firstname.as_deref());
    put("lastname", contact.lastname.as_deref());
    put("company", contact.company.as_deref());
    put("jobtitle", contact.job_title.as_deref());
    put("phone", contact.phone.as_deref());
    put("country", contact.country.as_deref());
    put("wsa_role", Some(contact.role.to_string().as_str()));
    put("wsa_year", Some(contact.campaign_year.as_str()));
    put("wsa_category", contact.category.as_deref());
    put("wsa_linkedin", contact.linkedin.as_deref());
    put("wsa_live_url", contact.live_url.as_deref());
    props
}

impl HubspotClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(config: &ApiTargetConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("wsa-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// HubSpot id of the contact with this email, if any.
    pub async fn find_contact(&self, email: &str) -> Result<Option<String>, SyncError> {
        let body = json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "email", "operator": "EQ", "value": email }]
            }],
            "properties": ["email"],
            "limit": 1
        });

        let response = self
            .http
            .post(self.url("/crm/v3/objects/contacts/search"))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let found: SearchResponse = response.json().await?;
        Ok(found.results.into_iter().next().map(|c| c.id))
    }

    /// Create or update the contact keyed by email. Returns the HubSpot id.
    pub async fn upsert_contact(&self, contact: &ContactPayload) -> Result<String, SyncError> {
        let body = json!({ "properties": contact_properties(contact) });

        let request = match self.find_contact(&contact.email).await? {
            Some(id) => {
                tracing::debug!(contact_id = %id, "Updating HubSpot contact");
                self.http
                    .patch(self.url(&format!("/crm/v3/objects/contacts/{id}")))
            }
            None => {
                tracing::debug!("Creating HubSpot contact");
                self.http.post(self.url("/crm/v3/objects/contacts"))
            }
        };

        let response = request
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let saved: ContactRef = response.json().await?;
        Ok(saved.id)
    }
}

#[async_trait]
impl ContactSink for HubspotClient {
    fn target(&self) -> SyncTarget {
        SyncTarget::Hubspot
    }

    async fn deliver(
        &self,
        _event: OutboxEventType,
        contact: &ContactPayload,
    ) -> Result<(), SyncError> {
        self.upsert_contact(contact).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{patch, post},
    };

    use super::*;
    use crate::services::contact::ContactRole;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        existing_id: Option<String>,
        fail_with: Option<u16>,
    }

    fn check_auth(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer pat-test")
    }

    async fn search(
        State(s): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        assert!(check_auth(&headers));
        s.calls.lock().unwrap().push(("search".into(), body));
        if let Some(code) = s.fail_with {
            return (StatusCode::from_u16(code).unwrap(), Json(json!({"message": "nope"})));
        }
        let results = match &s.existing_id {
            Some(id) => json!([{ "id": id }]),
            None => json!([]),
        };
        let total = results.as_array().map_or(0, |r| r.len());
        (StatusCode::OK, Json(json!({ "total": total, "results": results })))
    }

    async fn create(
        State(s): State<Recorded>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        s.calls.lock().unwrap().push(("create".into(), body));
        (StatusCode::CREATED, Json(json!({ "id": "901" })))
    }

    async fn update(
        State(s): State<Recorded>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        s.calls.lock().unwrap().push((format!("update:{id}"), body));
        Json(json!({ "id": id }))
    }

    async fn serve(state: Recorded) -> String {
        let app = Router::new()
            .route("/crm/v3/objects/contacts/search", post(search))
            .route("/crm/v3/objects/contacts", post(create))
            .route("/crm/v3/objects/contacts/{id}", patch(update))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> HubspotClient {
        HubspotClient::new(&ApiTargetConfig {
            base_url,
            token: SecretString::from("pat-test"),
        })
        .unwrap()
    }

    fn contact() -> ContactPayload {
        ContactPayload {
            email: "jane@example.com".into(),
            firstname: Some("Jane".into()),
            lastname: Some("Doe".into()),
            company: None,
            job_title: Some("Recruiter".into()),
            phone: None,
            country: None,
            linkedin: None,
            role: ContactRole::Nominee,
            campaign_year: "2026".into(),
            subcategory_id: Some("top-recruiter".into()),
            category: Some("Top Recruiter".into()),
            live_url: Some("https://awards.example.com/nominee/jane-doe".into()),
        }
    }

    #[test]
    fn properties_skip_missing_fields() {
        let props = contact_properties(&contact());
        assert_eq!(props["jobtitle"], "Recruiter");
        assert_eq!(props["wsa_role"], "nominee");
        assert_eq!(props["wsa_year"], "2026");
        assert!(!props.contains_key("company"));
        assert!(!props.contains_key("phone"));
    }

    #[tokio::test]
    async fn creates_when_search_finds_nothing() {
        let state = Recorded::default();
        let base = serve(state.clone()).await;

        let id = client(base).upsert_contact(&contact()).await.unwrap();
        assert_eq!(id, "901");

        let calls = state.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1["filterGroups"][0]["filters"][0]["value"], "jane@example.com");
        assert_eq!(calls[1].0, "create");
        assert_eq!(
            calls[1].1["properties"]["wsa_live_url"],
            "https://awards.example.com/nominee/jane-doe"
        );
    }

    #[tokio::test]
    async fn patches_existing_contact() {
        let state = Recorded {
            existing_id: Some("77".into()),
            ..Default::default()
        };
        let base = serve(state.clone()).await;

        let id = client(base).upsert_contact(&contact()).await.unwrap();
        assert_eq!(id, "77");
        assert_eq!(state.calls.lock().unwrap()[1].0, "update:77");
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_client_errors_permanent() {
        let base = serve(Recorded {
            fail_with: Some(503),
            ..Default::default()
        })
        .await;
        let err = client(base).upsert_contact(&contact()).await.unwrap_err();
        assert!(err.is_transient(), "{err}");

        let base = serve(Recorded {
            fail_with: Some(400),
            ..Default::default()
        })
        .await;
        let err = client(base).upsert_contact(&contact()).await.unwrap_err();
        assert!(!err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}"))
            .upsert_contact(&contact())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(err.is_transient());
    }
}
