use crate::errors::SpeedTestError;
use crate::network::requests::Request;
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use url::Url;

/// Thin JSON client shared by every lookup.
#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
}

impl Client {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SpeedTestError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                SpeedTestError::config("could not build HTTP client")
                    .with_source(e)
            })?;

        Ok(Client { client })
    }

    pub async fn send<R: Request>(
        &self,
        request: R,
    ) -> Result<R::Response, SpeedTestError> {
        let url = Url::parse(&request.url()).map_err(|e| {
            SpeedTestError::config(format!("invalid lookup URL {}", request.url()))
                .with_source(e)
        })?;

        let response = self
            .client
            .request(R::METHOD, url.clone())
            .headers(request.headers())
            .query(&request.query())
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;

        serde_json::from_str::<R::Response>(&text).map_err(|e| {
            SpeedTestError::parse(format!("unexpected response from {}", url))
                .with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::network::requests::ipapi_co::IpapiCoRequest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        Client::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_send_decodes_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"ip": "203.0.113.7", "city": "Austin"}),
            ))
            .mount(&mock_server)
            .await;

        let response = client()
            .send(IpapiCoRequest::new(mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(response.city.as_deref(), Some("Austin"));
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let error = client()
            .send(IpapiCoRequest::new(mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Api);
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>blocked</html>"),
            )
            .mount(&mock_server)
            .await;

        let error = client()
            .send(IpapiCoRequest::new(mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_config_error() {
        let error = client()
            .send(IpapiCoRequest::new("not a url"))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({})),
            )
            .mount(&mock_server)
            .await;

        let client = Client::new(Duration::from_millis(200)).unwrap();
        let error = client
            .send(IpapiCoRequest::new(mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Timeout);
    }
}
