//! Public IP lookup services, tried in order until one reports a city.

use futures::future::{BoxFuture, FutureExt};

use crate::errors::SpeedTestError;
use crate::network::client::Client;
use crate::network::requests::ip_api_com::IpApiComRequest;
use crate::network::requests::ipapi_co::IpapiCoRequest;
use crate::network::requests::ipinfo_io::IpinfoIoRequest;
use crate::network::requests::Request;
use crate::network::GeoLookup;

/// One public IP and geolocation service.
pub trait LookupProvider: Send + Sync {
    /// Short name used in logs and in [`InfoSource`](super::InfoSource).
    fn name(&self) -> &str;

    fn lookup(&self) -> BoxFuture<'_, Result<GeoLookup, SpeedTestError>>;
}

/// [`LookupProvider`] for any JSON request whose response maps into a
/// [`GeoLookup`].
#[derive(Debug, Clone)]
pub struct HttpLookupProvider<R> {
    name: &'static str,
    client: Client,
    request: R,
}

impl<R> HttpLookupProvider<R> {
    pub fn new(name: &'static str, client: Client, request: R) -> Self {
        Self { name, client, request }
    }
}

impl<R> LookupProvider for HttpLookupProvider<R>
where
    R: Request + Send + Sync,
    R::Response: Into<GeoLookup> + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    fn lookup(&self) -> BoxFuture<'_, Result<GeoLookup, SpeedTestError>> {
        async move {
            let response = self.client.send(&self.request).await?;
            Ok(response.into())
        }
        .boxed()
    }
}

/// Base URLs of the lookup chain, overridable for tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUrls {
    pub ipapi_co: String,
    pub ip_api_com: String,
    pub ipinfo_io: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        use crate::network::requests::{ip_api_com, ipapi_co, ipinfo_io};

        Self {
            ipapi_co: ipapi_co::DEFAULT_BASE_URL.to_string(),
            ip_api_com: ip_api_com::DEFAULT_BASE_URL.to_string(),
            ipinfo_io: ipinfo_io::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
impl ProviderUrls {
    /// All three services on one host, as a mock server serves them.
    pub fn all(base_url: &str) -> Self {
        Self {
            ipapi_co: base_url.to_string(),
            ip_api_com: base_url.to_string(),
            ipinfo_io: base_url.to_string(),
        }
    }
}

/// The standard chain: ipapi.co, then ip-api.com, then ipinfo.io.
pub fn default_providers(
    client: &Client,
    urls: &ProviderUrls,
) -> Vec<Box<dyn LookupProvider>> {
    vec![
        Box::new(HttpLookupProvider::new(
            "ipapi.co",
            client.clone(),
            IpapiCoRequest::new(urls.ipapi_co.as_str()),
        )),
        Box::new(HttpLookupProvider::new(
            "ip-api.com",
            client.clone(),
            IpApiComRequest::new(urls.ip_api_com.as_str()),
        )),
        Box::new(HttpLookupProvider::new(
            "ipinfo.io",
            client.clone(),
            IpinfoIoRequest::new(urls.ipinfo_io.as_str()),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_chain_order() {
        let client = Client::new(Duration::from_secs(1)).unwrap();
        let providers = default_providers(&client, &ProviderUrls::default());

        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ipapi.co", "ip-api.com", "ipinfo.io"]);
    }

    #[tokio::test]
    async fn test_ip_api_com_provider_maps_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "status": "success",
                    "query": "198.51.100.23",
                    "city": "Berlin",
                    "regionName": "Land Berlin",
                    "country": "Germany",
                    "isp": "Deutsche Telekom AG",
                    "timezone": "Europe/Berlin"
                }),
            ))
            .mount(&mock_server)
            .await;

        let client = Client::new(Duration::from_secs(2)).unwrap();
        let provider = HttpLookupProvider::new(
            "ip-api.com",
            client,
            IpApiComRequest::new(mock_server.uri()),
        );

        let lookup = provider.lookup().await.unwrap();

        assert_eq!(lookup.ip.as_deref(), Some("198.51.100.23"));
        assert_eq!(lookup.city.as_deref(), Some("Berlin"));
        assert_eq!(lookup.timezone.as_deref(), Some("Europe/Berlin"));
    }
}
