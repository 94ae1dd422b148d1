//! HTTP client for a PostgREST-compatible service (Supabase's `/rest/v1`).

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{Backend, BackendError};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Connection settings for the hosted service.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service key, sent both as `apikey` and as the bearer token.
    pub key: String,
}

/// [`Backend`] over HTTP.
///
/// Missing or malformed configuration is not checked here; it surfaces as a
/// [`BackendError`] on the first request.
pub struct PostgrestClient {
    http: reqwest::Client,
    rest_url: String,
    key: String,
}

impl PostgrestClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(http: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            http,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            key: config.key.clone(),
        }
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        debug!(%method, table, "PostgREST request");
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn by_id(builder: RequestBuilder, id: Uuid) -> RequestBuilder {
        builder.query(&[("id", format!("eq.{}", id))])
    }

    /// Send and turn a non-2xx status into a [`BackendError`] carrying the
    /// service's message.
    async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::from_response(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn rows(builder: RequestBuilder) -> Result<Vec<Value>, BackendError> {
        let response = Self::send(builder).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}

impl Backend for PostgrestClient {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, BackendError> {
        Self::rows(self.request(Method::GET, table).query(&[("select", "*")])).await
    }

    async fn select_by_id(&self, table: &str, id: Uuid) -> Result<Value, BackendError> {
        let builder = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        let response = Self::send(Self::by_id(builder, id)).await?;
        Ok(response.json::<Value>().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[row]);

        Self::rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::new(format!("Insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value, BackendError> {
        let builder = self
            .request(Method::PATCH, table)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&changes);

        Self::rows(Self::by_id(builder, id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(table, id))
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), BackendError> {
        let builder = self
            .request(Method::DELETE, table)
            .header("Prefer", RETURN_REPRESENTATION);

        // PostgREST answers 2xx even when the filter matched nothing; the
        // returned representation tells the two apart.
        let deleted = Self::rows(Self::by_id(builder, id)).await?;
        if deleted.is_empty() {
            return Err(BackendError::not_found(table, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_url_ignores_trailing_slash() {
        let client = PostgrestClient::new(&BackendConfig {
            url: "https://xyz.supabase.co/".into(),
            key: "anon".into(),
        });
        assert_eq!(client.rest_url(), "https://xyz.supabase.co/rest/v1");
    }

    #[tokio::test]
    async fn unconfigured_client_fails_on_first_use() {
        let client = PostgrestClient::new(&BackendConfig::default());
        let err = client.select_all("ideas").await.unwrap_err();
        assert!(!err.message.is_empty());
        assert_eq!(err.status, None);
    }
}
