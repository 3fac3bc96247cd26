use crate::network::requests::Request;
use crate::network::GeoLookup;
use serde::Deserialize;
use std::borrow::Cow;

pub const DEFAULT_BASE_URL: &str = "https://ipapi.co";

/// Response of `ipapi.co/json/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpapiCoResponse {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country_name: Option<String>,
    pub org: Option<String>,
    pub timezone: Option<String>,
}

impl From<IpapiCoResponse> for GeoLookup {
    fn from(response: IpapiCoResponse) -> Self {
        GeoLookup {
            ip: response.ip,
            city: response.city,
            region: response.region,
            country: response.country_name,
            isp: response.org,
            timezone: response.timezone,
        }
        .normalized()
    }
}

#[derive(Debug, Clone)]
pub struct IpapiCoRequest {
    base_url: String,
}

impl IpapiCoRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for IpapiCoRequest {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Request for IpapiCoRequest {
    type Response = IpapiCoResponse;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> Cow<'_, str> {
        "/json/".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mapping() {
        let response: IpapiCoResponse = serde_json::from_str(
            r#"{
                "ip": "203.0.113.7",
                "city": "Austin",
                "region": "Texas",
                "country_name": "United States",
                "country": "US",
                "org": "AS7922 Comcast Cable",
                "timezone": "America/Chicago"
            }"#,
        )
        .unwrap();

        let lookup = GeoLookup::from(response);

        assert_eq!(lookup.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(lookup.country.as_deref(), Some("United States"));
        assert_eq!(lookup.isp.as_deref(), Some("AS7922 Comcast Cable"));
        assert_eq!(lookup.timezone.as_deref(), Some("America/Chicago"));
    }

    #[test]
    fn test_rate_limited_body_has_no_city() {
        let response: IpapiCoResponse = serde_json::from_str(
            r#"{"error": true, "reason": "RateLimited"}"#,
        )
        .unwrap();

        assert!(!GeoLookup::from(response).has_city());
    }
}
