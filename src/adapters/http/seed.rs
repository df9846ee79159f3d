//! Seed capability request over reqwest.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use url::Url;

use crate::config::CapsConfig;
use crate::domain::capabilities::SeedRequest;
use crate::ports::{SeedClient, SeedError};

use super::build_client;

/// Seed client posting the catalog as a JSON array of names.
///
/// The server answers with a JSON object of `name -> uri`. A 404 means the
/// seed capability has expired and is reported as `SeedError::NotFound`;
/// every other failure is transient from the caller's point of view.
#[derive(Debug, Clone)]
pub struct ReqwestSeedClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestSeedClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            timeout,
        })
    }

    pub fn from_config(config: &CapsConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.seed_timeout(), &config.user_agent)
    }

    fn classify(&self, e: reqwest::Error) -> SeedError {
        if e.is_timeout() {
            SeedError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if e.is_decode() {
            SeedError::malformed(e.without_url().to_string())
        } else {
            SeedError::network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl SeedClient for ReqwestSeedClient {
    async fn request(
        &self,
        seed_uri: &Url,
        request: &SeedRequest,
    ) -> Result<HashMap<String, String>, SeedError> {
        let response = self
            .client
            .post(seed_uri.clone())
            .json(request.names())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SeedError::NotFound);
        }
        if !status.is_success() {
            return Err(SeedError::Http {
                status: status.as_u16(),
            });
        }

        let body: JsonValue = response.json().await.map_err(|e| self.classify(e))?;
        parse_capabilities(body)
    }
}

/// Keeps string-valued entries; anything else in the map is ignored.
fn parse_capabilities(body: JsonValue) -> Result<HashMap<String, String>, SeedError> {
    let JsonValue::Object(map) = body else {
        return Err(SeedError::malformed("seed response is not a mapping"));
    };

    let mut capabilities = HashMap::with_capacity(map.len());
    for (name, value) in map {
        match value {
            JsonValue::String(uri) => {
                capabilities.insert(name, uri);
            }
            _ => tracing::debug!(capability = %name, "Ignoring non-string capability value"),
        }
    }
    Ok(capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capabilities::CAPABILITY_CATALOG;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ReqwestSeedClient {
        ReqwestSeedClient::new(Duration::from_secs(5), "gridlink-test").unwrap()
    }

    fn seed_uri(server: &MockServer) -> Url {
        Url::parse(&format!("{}/cap/seed", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn posts_catalog_and_parses_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cap/seed"))
            .and(body_json(json!(CAPABILITY_CATALOG)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "EventQueueGet": "https://sim.example.com/cap/eq",
                "GetTexture": "https://sim.example.com/cap/tex",
                "Broken": 42
            })))
            .expect(1)
            .mount(&server)
            .await;

        let caps = client()
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap();

        assert_eq!(caps.len(), 2);
        assert_eq!(caps["EventQueueGet"], "https://sim.example.com/cap/eq");
    }

    #[tokio::test]
    async fn not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client()
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap_err();

        assert_eq!(err, SeedError::NotFound);
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client()
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap_err();

        assert_eq!(err, SeedError::Http { status: 503 });
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn non_mapping_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["EventQueueGet"])))
            .mount(&server)
            .await;

        let err = client()
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::Malformed(_)));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<llsd><map/></llsd>"))
            .mount(&server)
            .await;

        let err = client()
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::Malformed(_)));
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;
        let client = ReqwestSeedClient::new(Duration::from_millis(50), "gridlink-test").unwrap();

        let err = client
            .request(&seed_uri(&server), &SeedRequest::standard())
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::Timeout { .. }));
    }

    #[tokio::test]
    async fn error_messages_do_not_leak_uri() {
        let client = client();
        let uri = Url::parse("http://127.0.0.1:1/cap/secret-token").unwrap();

        let err = client.request(&uri, &SeedRequest::standard()).await.unwrap_err();

        assert!(!err.to_string().contains("secret-token"));
    }
}
