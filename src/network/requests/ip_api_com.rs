use crate::network::requests::Request;
use crate::network::GeoLookup;
use serde::Deserialize;
use std::borrow::Cow;

// The free tier is plain HTTP only.
pub const DEFAULT_BASE_URL: &str = "http://ip-api.com";

/// Response of `ip-api.com/json/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpApiComResponse {
    pub query: Option<String>,
    pub city: Option<String>,
    pub region_name: Option<String>,
    pub country: Option<String>,
    pub isp: Option<String>,
    pub timezone: Option<String>,
}

impl From<IpApiComResponse> for GeoLookup {
    fn from(response: IpApiComResponse) -> Self {
        GeoLookup {
            ip: response.query,
            city: response.city,
            region: response.region_name,
            country: response.country,
            isp: response.isp,
            timezone: response.timezone,
        }
        .normalized()
    }
}

#[derive(Debug, Clone)]
pub struct IpApiComRequest {
    base_url: String,
}

impl IpApiComRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for IpApiComRequest {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Request for IpApiComRequest {
    type Response = IpApiComResponse;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> Cow<'_, str> {
        "/json/".into()
    }
}
