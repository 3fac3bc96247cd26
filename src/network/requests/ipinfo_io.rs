use crate::network::requests::Request;
use crate::network::GeoLookup;
use serde::Deserialize;
use std::borrow::Cow;

pub const DEFAULT_BASE_URL: &str = "https://ipinfo.io";

/// Response of `ipinfo.io/json`. `country` is a two-letter code here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpinfoIoResponse {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub org: Option<String>,
    pub timezone: Option<String>,
}

impl From<IpinfoIoResponse> for GeoLookup {
    fn from(response: IpinfoIoResponse) -> Self {
        GeoLookup {
            ip: response.ip,
            city: response.city,
            region: response.region,
            country: response.country,
            isp: response.org,
            timezone: response.timezone,
        }
        .normalized()
    }
}

#[derive(Debug, Clone)]
pub struct IpinfoIoRequest {
    base_url: String,
}

impl IpinfoIoRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for IpinfoIoRequest {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Request for IpinfoIoRequest {
    type Response = IpinfoIoResponse;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> Cow<'_, str> {
        "/json".into()
    }
}
