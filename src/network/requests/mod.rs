//! Typed HTTP requests against the lookup services.
//!
//! Each request knows its base URL, endpoint and response shape; the
//! response converts into a [`GeoLookup`](super::GeoLookup) with that
//! service's field mapping.

pub mod ip_api_com;
pub mod ipapi_co;
pub mod ipinfo_io;
pub mod reverse_geocode;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use std::borrow::Cow;

const USER_AGENT_VALUE: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub trait Request {
    type Response: for<'de> Deserialize<'de>;

    const METHOD: Method = Method::GET;

    /// Scheme and host, without a trailing slash.
    fn base_url(&self) -> &str;

    fn endpoint(&self) -> Cow<'_, str>;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        headers
    }

    /// Absolute URL of the request, without the query string.
    fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url().trim_end_matches('/'),
            self.endpoint().trim_start_matches('/')
        )
    }
}

impl<R: Request> Request for &R {
    type Response = R::Response;

    const METHOD: Method = R::METHOD;

    fn base_url(&self) -> &str {
        (**self).base_url()
    }

    fn endpoint(&self) -> Cow<'_, str> {
        (**self).endpoint()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        (**self).query()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }
}

#[cfg(test)]
mod tests {
    use super::ipapi_co::IpapiCoRequest;
    use super::*;

    #[test]
    fn test_url_joins_base_and_endpoint() {
        let request = IpapiCoRequest::new("http://127.0.0.1:8080/");
        assert_eq!(request.url(), "http://127.0.0.1:8080/json/");
    }

    #[test]
    fn test_default_headers() {
        let headers = IpapiCoRequest::default().headers();

        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert!(headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("speedstream/"));
    }
}
