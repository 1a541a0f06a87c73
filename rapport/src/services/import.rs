//! Contacts import service
//!
//! Fetches the signed-in user's Google contacts through the People API with
//! the access token granted at sign-in, normalizes them into contact inputs,
//! and caches the result per user in the local store for a short while.

use crate::config::{IMPORT_CACHE_KEY, IMPORT_CACHE_TTL, IMPORT_PAGE_SIZE, PEOPLE_API_BASE};
use crate::error::{AppError, ImportError, Result};
use crate::models::ContactInput;
use crate::session::Session;
use crate::storage::LocalStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const PERSON_FIELDS: &str = "names,emailAddresses,phoneNumbers,organizations,biographies";

/// A contact as offered for import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportedContact {
    /// Provider's stable id ("people/c123")
    pub google_resource_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub biography: String,
}

impl From<ImportedContact> for ContactInput {
    fn from(imported: ImportedContact) -> Self {
        ContactInput {
            first_name: Some(imported.first_name),
            last_name: Some(imported.last_name),
            email: Some(imported.email),
            phone: Some(imported.phone),
            company: Some(imported.company),
            biography: Some(imported.biography),
            ..Default::default()
        }
    }
}

/// Where imported contacts come from
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn fetch(&self, access_token: &str) -> Result<Vec<ImportedContact>>;
}

// ===== People API =====

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConnectionsResponse {
    connections: Vec<Person>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Person {
    resource_name: Option<String>,
    names: Vec<PersonName>,
    email_addresses: Vec<FieldValue>,
    phone_numbers: Vec<FieldValue>,
    organizations: Vec<Organization>,
    biographies: Vec<FieldValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PersonName {
    given_name: Option<String>,
    family_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FieldValue {
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Organization {
    name: Option<String>,
}

fn first_value(values: &[FieldValue]) -> String {
    values
        .first()
        .and_then(|v| v.value.clone())
        .unwrap_or_default()
}

/// Convert a People API connections response into import candidates.
///
/// People without any name entry are dropped; for everything else the
/// first entry of each field is used.
pub fn normalize_connections(body: Value) -> Result<Vec<ImportedContact>> {
    let response: ConnectionsResponse = serde_json::from_value(body)?;

    Ok(response
        .connections
        .into_iter()
        .filter_map(|person| {
            let name = person.names.into_iter().next()?;
            Some(ImportedContact {
                google_resource_name: person.resource_name,
                first_name: name.given_name.unwrap_or_default(),
                last_name: name.family_name.unwrap_or_default(),
                email: first_value(&person.email_addresses),
                phone: first_value(&person.phone_numbers),
                company: person
                    .organizations
                    .into_iter()
                    .next()
                    .and_then(|org| org.name)
                    .unwrap_or_default(),
                biography: first_value(&person.biographies),
            })
        })
        .collect())
}

/// Map a failed People API response to an import error
fn error_for_status(status: u16, body: &Value) -> ImportError {
    match status {
        401 => ImportError::SessionExpired,
        403 => ImportError::PermissionDenied,
        _ => ImportError::Api {
            status,
            message: body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Failed to fetch contacts")
                .to_string(),
        },
    }
}

/// Google People API contact source
#[derive(Clone)]
pub struct GoogleContactsSource {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleContactsSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(PEOPLE_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Rapport/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn connections_url(&self) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/people/me/connections", base))
            .map_err(|e| AppError::Generic(format!("Invalid People API URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("personFields", PERSON_FIELDS)
            .append_pair("pageSize", &IMPORT_PAGE_SIZE.to_string())
            .append_pair("sortOrder", "FIRST_NAME_ASCENDING");

        Ok(url)
    }
}

#[async_trait]
impl ContactSource for GoogleContactsSource {
    async fn fetch(&self, access_token: &str) -> Result<Vec<ImportedContact>> {
        tracing::info!("Fetching contacts from the People API...");

        let response = self
            .client
            .get(self.connections_url()?)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            tracing::warn!("People API returned status: {}", status);
            return Err(error_for_status(status.as_u16(), &body).into());
        }

        let contacts = normalize_connections(response.json().await?)?;
        tracing::info!("Fetched {} contacts for import", contacts.len());
        Ok(contacts)
    }
}

// ===== Importer =====

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    data: Vec<ImportedContact>,
    timestamp: DateTime<Utc>,
}

/// Cached access to the current user's importable contacts
#[derive(Clone)]
pub struct ContactImporter {
    source: Arc<dyn ContactSource>,
    session: Arc<Session>,
    cache: Arc<dyn LocalStore>,
    ttl: Duration,
}

impl ContactImporter {
    pub fn new(source: Arc<dyn ContactSource>, session: Arc<Session>, cache: Arc<dyn LocalStore>) -> Self {
        Self {
            source,
            session,
            cache,
            ttl: IMPORT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Import needs a signed-in user holding a provider token
    pub fn is_available(&self) -> bool {
        !self.session.is_guest() && self.session.third_party_token().is_some()
    }

    /// Whatever is cached for the current user, fresh or not
    pub fn cached(&self) -> Vec<ImportedContact> {
        self.session
            .current()
            .and_then(|identity| self.load_cache(&identity.uid))
            .map(|entry| entry.data)
            .unwrap_or_default()
    }

    /// Cached contacts when fresh, otherwise a new fetch
    pub async fn contacts(&self) -> Result<Vec<ImportedContact>> {
        let identity = self.session.current().ok_or(ImportError::NotAvailable)?;

        if let Some(entry) = self.load_cache(&identity.uid) {
            if self.is_fresh(&entry) {
                tracing::debug!("Using cached import contacts for {}", identity.uid);
                return Ok(entry.data);
            }
        }

        self.fetch(&identity.uid).await
    }

    /// Drop the cache and fetch again
    pub async fn refetch(&self) -> Result<Vec<ImportedContact>> {
        let identity = self.session.current().ok_or(ImportError::NotAvailable)?;
        self.clear_cache(&identity.uid);
        self.fetch(&identity.uid).await
    }

    async fn fetch(&self, uid: &str) -> Result<Vec<ImportedContact>> {
        let token = self
            .session
            .third_party_token()
            .ok_or(ImportError::NotAvailable)?;

        match self.source.fetch(&token).await {
            Ok(contacts) => {
                self.save_cache(uid, &contacts);
                Ok(contacts)
            }
            Err(AppError::Import(ImportError::SessionExpired)) => {
                tracing::warn!("Contacts import token expired; clearing it");
                self.session.clear_third_party_token();
                Err(ImportError::SessionExpired.into())
            }
            Err(e) => {
                tracing::error!("Contacts import failed: {}", e);
                Err(e)
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        // A timestamp in the future counts as fresh
        (Utc::now() - entry.timestamp)
            .to_std()
            .map(|age| age < self.ttl)
            .unwrap_or(true)
    }

    fn load_cache(&self, uid: &str) -> Option<CacheEntry> {
        let raw = match self.cache.load(&cache_key(uid)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read import cache: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring corrupt import cache: {}", e);
                None
            }
        }
    }

    fn save_cache(&self, uid: &str, contacts: &[ImportedContact]) {
        let entry = CacheEntry {
            data: contacts.to_vec(),
            timestamp: Utc::now(),
        };
        let result = serde_json::to_string(&entry)
            .map_err(AppError::from)
            .and_then(|json| self.cache.save(&cache_key(uid), &json));

        if let Err(e) = result {
            tracing::warn!("Failed to cache import contacts: {}", e);
        }
    }

    fn clear_cache(&self, uid: &str) {
        if let Err(e) = self.cache.remove(&cache_key(uid)) {
            tracing::warn!("Failed to clear import cache: {}", e);
        }
    }
}

fn cache_key(uid: &str) -> String {
    format!("{}_{}", IMPORT_CACHE_KEY, uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        calls: AtomicUsize,
        tokens: Mutex<Vec<String>>,
        response: Mutex<std::result::Result<Vec<ImportedContact>, ImportError>>,
    }

    impl FakeSource {
        fn returning(contacts: Vec<ImportedContact>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                tokens: Mutex::new(Vec::new()),
                response: Mutex::new(Ok(contacts)),
            })
        }

        fn failing(error: ImportError) -> Arc<Self> {
            let source = Self::returning(Vec::new());
            *source.response.lock().unwrap() = Err(error);
            source
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContactSource for FakeSource {
        async fn fetch(&self, access_token: &str) -> Result<Vec<ImportedContact>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().push(access_token.to_string());
            self.response.lock().unwrap().clone().map_err(AppError::from)
        }
    }

    fn ada() -> ImportedContact {
        ImportedContact {
            google_resource_name: Some("people/c1".to_string()),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..Default::default()
        }
    }

    fn signed_in_session() -> Arc<Session> {
        let session = Arc::new(Session::new());
        session.sign_in(Identity::new("u1"), Some("token-1".to_string()));
        session
    }

    fn create_test_importer(source: Arc<FakeSource>, session: Arc<Session>) -> (ContactImporter, Arc<MemoryStore>) {
        let cache = Arc::new(MemoryStore::new());
        (ContactImporter::new(source, session, cache.clone()), cache)
    }

    #[test]
    fn test_normalize_connections() {
        let body = json!({
            "connections": [
                {
                    "resourceName": "people/c1",
                    "names": [{ "givenName": "Ada", "familyName": "Lovelace" }],
                    "emailAddresses": [{ "value": "ada@example.com" }, { "value": "ada@work.example" }],
                    "phoneNumbers": [{ "value": "+44 20 7946 0000" }],
                    "organizations": [{ "name": "Analytical Engines" }],
                    "biographies": [{ "value": "Mathematician" }]
                },
                { "resourceName": "people/c2", "emailAddresses": [{ "value": "nameless@example.com" }] },
                { "resourceName": "people/c3", "names": [{ "givenName": "Grace" }] }
            ]
        });

        let contacts = normalize_connections(body).unwrap();

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].first_name, "Ada");
        assert_eq!(contacts[0].last_name, "Lovelace");
        assert_eq!(contacts[0].email, "ada@example.com");
        assert_eq!(contacts[0].phone, "+44 20 7946 0000");
        assert_eq!(contacts[0].company, "Analytical Engines");
        assert_eq!(contacts[0].biography, "Mathematician");
        assert_eq!(contacts[1].google_resource_name.as_deref(), Some("people/c3"));
        assert_eq!(contacts[1].last_name, "");
    }

    #[test]
    fn test_normalize_empty_response() {
        assert!(normalize_connections(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_error_for_status() {
        assert_eq!(error_for_status(401, &Value::Null), ImportError::SessionExpired);
        assert_eq!(error_for_status(403, &Value::Null), ImportError::PermissionDenied);
        assert_eq!(
            error_for_status(500, &json!({ "error": { "message": "Backend error" } })),
            ImportError::Api {
                status: 500,
                message: "Backend error".to_string()
            }
        );
        assert_eq!(
            error_for_status(429, &Value::Null),
            ImportError::Api {
                status: 429,
                message: "Failed to fetch contacts".to_string()
            }
        );
    }

    #[test]
    fn test_connections_url() {
        let source = GoogleContactsSource::with_base_url("https://people.example/v1/").unwrap();
        let url = source.connections_url().unwrap();

        assert_eq!(url.path(), "/v1/people/me/connections");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("pageSize".to_string(), "500".to_string())));
        assert!(query.contains(&("sortOrder".to_string(), "FIRST_NAME_ASCENDING".to_string())));
        assert!(query.contains(&("personFields".to_string(), PERSON_FIELDS.to_string())));
    }

    #[test]
    fn test_imported_contact_into_input() {
        let input: ContactInput = ada().into();
        assert_eq!(input.first_name.as_deref(), Some("Ada"));
        assert_eq!(input.email.as_deref(), Some("ada@example.com"));
        assert!(input.biography_attachments.is_none());
    }

    #[tokio::test]
    async fn test_fresh_cache_avoids_refetch() {
        let source = FakeSource::returning(vec![ada()]);
        let (importer, _cache) = create_test_importer(source.clone(), signed_in_session());

        assert_eq!(importer.contacts().await.unwrap(), vec![ada()]);
        assert_eq!(importer.contacts().await.unwrap(), vec![ada()]);

        assert_eq!(source.calls(), 1);
        assert_eq!(source.tokens.lock().unwrap()[0], "token-1");
        assert_eq!(importer.cached(), vec![ada()]);
    }

    #[tokio::test]
    async fn test_stale_cache_refetches() {
        let source = FakeSource::returning(vec![ada()]);
        let (importer, _cache) = create_test_importer(source.clone(), signed_in_session());
        let importer = importer.with_ttl(Duration::ZERO);

        importer.contacts().await.unwrap();
        importer.contacts().await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refetch_bypasses_cache() {
        let source = FakeSource::returning(vec![ada()]);
        let (importer, _cache) = create_test_importer(source.clone(), signed_in_session());

        importer.contacts().await.unwrap();
        importer.refetch().await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_is_per_user() {
        let source = FakeSource::returning(vec![ada()]);
        let session = signed_in_session();
        let (importer, cache) = create_test_importer(source, session.clone());

        importer.contacts().await.unwrap();
        assert!(cache.load("googleContactsCache_u1").unwrap().is_some());

        session.sign_in(Identity::new("u2"), None);
        assert!(importer.cached().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_clears_token() {
        let source = FakeSource::failing(ImportError::SessionExpired);
        let session = signed_in_session();
        let (importer, _cache) = create_test_importer(source, session.clone());

        let err = importer.contacts().await.unwrap_err();

        assert!(matches!(err, AppError::Import(ImportError::SessionExpired)));
        assert!(session.third_party_token().is_none());
        assert!(!importer.is_available());
    }

    #[tokio::test]
    async fn test_not_available_without_token() {
        let source = FakeSource::returning(vec![ada()]);
        let session = Arc::new(Session::new());
        session.sign_in(Identity::new("u1"), None);
        let (importer, _cache) = create_test_importer(source.clone(), session);

        let err = importer.contacts().await.unwrap_err();

        assert!(matches!(err, AppError::Import(ImportError::NotAvailable)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_guest_cannot_import() {
        let source = FakeSource::returning(vec![ada()]);
        let (importer, _cache) = create_test_importer(source, Arc::new(Session::new()));

        assert!(!importer.is_available());
        assert!(importer.contacts().await.is_err());
        assert!(importer.cached().is_empty());
    }
}
