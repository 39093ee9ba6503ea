use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::notion::model::{PageRef, QueryDatabaseResp, RetrieveDatabaseResp};

pub mod model;

const NOTION_API_BASE: &str = "https://api.notion.com/";

/// Largest page of query results we ask for; anything above one match is an anomaly.
const QUERY_PAGE_SIZE: u32 = 10;

/// Remote document store operations the sync engine relies on.
#[async_trait]
pub trait NotionService: Send + Sync {
    /// Ids of pages whose `number_property` equals `number`, in Notion's order.
    async fn find_pages_by_number(
        &self,
        database_id: &str,
        number_property: &str,
        number: i64,
    ) -> SyncResult<Vec<String>>;

    async fn create_page(
        &self,
        database_id: &str,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> SyncResult<String>;

    /// Properties-only update; page content is left alone.
    async fn update_page(&self, page_id: &str, properties: Map<String, Value>) -> SyncResult<()>;
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    pub fn new(token: String, version: String) -> anyhow::Result<Self> {
        let base_url = Url::parse(NOTION_API_BASE).context("invalid default Notion URL")?;
        Self::with_base_url(token, version, base_url)
    }

    pub fn with_base_url(token: String, version: String, base_url: Url) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("gh-notion-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
            version,
        })
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SyncResult<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| SyncError::RemoteUnavailable(format!("invalid Notion URL {path}: {e}")))?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version);
        if let Some(body) = body {
            builder = builder.header("Content-Type", "application/json").json(body);
        }
        builder
            .build()
            .map_err(|e| SyncError::RemoteUnavailable(format!("failed to build Notion request: {e}")))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SyncResult<T> {
        let request = self.build_request(method, path, body)?;
        debug!(method = %request.method(), url = %request.url(), "sending notion request");

        let res = self
            .http
            .execute(request)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("failed to reach Notion: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, path, "notion request failed");
            return Err(classify_failure(status, &body));
        }

        res.json::<T>()
            .await
            .map_err(|e| SyncError::RemoteWriteFailed(format!("invalid Notion response: {e}")))
    }

    pub async fn retrieve_database(&self, database_id: &str) -> SyncResult<RetrieveDatabaseResp> {
        self.execute(Method::GET, &format!("v1/databases/{database_id}"), None)
            .await
    }
}

/// Transport-level refusals are `RemoteUnavailable`; everything else Notion
/// rejected is `RemoteWriteFailed`.
pub fn classify_failure(status: StatusCode, body: &str) -> SyncError {
    let msg = format!("notion error {status}: {body}");
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        SyncError::RemoteUnavailable(msg)
    } else {
        SyncError::RemoteWriteFailed(msg)
    }
}

pub fn build_query_request(number_property: &str, number: i64) -> Value {
    json!({
        "filter": {
            "property": number_property,
            "number": { "equals": number }
        },
        "page_size": QUERY_PAGE_SIZE,
    })
}

pub fn build_create_request(
    database_id: &str,
    properties: Map<String, Value>,
    children: Vec<Value>,
) -> Value {
    let mut body = json!({
        "parent": { "database_id": database_id },
        "properties": Value::Object(properties),
    });
    if !children.is_empty() {
        body["children"] = Value::Array(children);
    }
    body
}

pub fn build_update_request(properties: Map<String, Value>) -> Value {
    json!({ "properties": Value::Object(properties) })
}

#[async_trait]
impl NotionService for NotionClient {
    async fn find_pages_by_number(
        &self,
        database_id: &str,
        number_property: &str,
        number: i64,
    ) -> SyncResult<Vec<String>> {
        let body = build_query_request(number_property, number);
        let resp: QueryDatabaseResp = self
            .execute(
                Method::POST,
                &format!("v1/databases/{database_id}/query"),
                Some(&body),
            )
            .await?;
        Ok(resp.results.into_iter().map(|p| p.id).collect())
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> SyncResult<String> {
        let body = build_create_request(database_id, properties, children);
        let page: PageRef = self.execute(Method::POST, "v1/pages", Some(&body)).await?;
        Ok(page.id)
    }

    async fn update_page(&self, page_id: &str, properties: Map<String, Value>) -> SyncResult<()> {
        let body = build_update_request(properties);
        let _: PageRef = self
            .execute(Method::PATCH, &format!("v1/pages/{page_id}"), Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NotionClient {
        NotionClient::new("token".into(), "2022-06-28".into()).unwrap()
    }

    #[test]
    fn build_request_sets_headers() {
        let body = json!({ "sample": true });
        let request = client()
            .build_request(Method::POST, "v1/pages", Some(&body))
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/v1/pages");
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer token"
        );
        assert_eq!(
            headers
                .get("Notion-Version")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "2022-06-28"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn build_request_without_body_has_no_content_type() {
        let request = client()
            .build_request(Method::GET, "v1/databases/abc", None)
            .unwrap();
        assert_eq!(request.url().path(), "/v1/databases/abc");
        assert!(request.headers().get("Content-Type").is_none());
    }

    #[test]
    fn debug_output_hides_token() {
        let out = format!("{:?}", client());
        assert!(!out.contains("\"token\""));
        assert!(out.contains("api.notion.com"));
    }

    #[test]
    fn query_request_filters_on_number() {
        let body = build_query_request("PR Number", 42);
        assert_eq!(body["filter"]["property"], "PR Number");
        assert_eq!(body["filter"]["number"]["equals"], 42);
    }

    #[test]
    fn create_request_includes_children_only_when_present() {
        let mut props = Map::new();
        props.insert("Title".into(), json!({ "title": [] }));
        let body = build_create_request("db-1", props.clone(), vec![json!({ "type": "paragraph" })]);
        assert_eq!(body["parent"]["database_id"], "db-1");
        assert_eq!(body["children"][0]["type"], "paragraph");

        let body = build_create_request("db-1", props, Vec::new());
        assert!(body.get("children").is_none());
    }

    #[test]
    fn update_request_carries_properties_only() {
        let mut props = Map::new();
        props.insert("Status".into(), json!({ "select": { "name": "Closed" } }));
        let body = build_update_request(props);
        assert_eq!(body.as_object().unwrap().len(), 1);
        assert_eq!(body["properties"]["Status"]["select"]["name"], "Closed");
    }

    #[test]
    fn failures_are_classified() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
        ] {
            assert!(matches!(
                classify_failure(status, ""),
                SyncError::RemoteUnavailable(_)
            ));
        }
        for status in [StatusCode::BAD_REQUEST, StatusCode::NOT_FOUND, StatusCode::CONFLICT] {
            assert!(matches!(
                classify_failure(status, "validation_error"),
                SyncError::RemoteWriteFailed(_)
            ));
        }
    }
}
