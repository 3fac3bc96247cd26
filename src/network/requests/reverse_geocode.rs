use crate::network::geolocation::Coordinates;
use crate::network::requests::Request;
use crate::network::GeoLookup;
use serde::Deserialize;
use std::borrow::Cow;

pub const DEFAULT_BASE_URL: &str = "https://api.bigdatacloud.net";

/// Response of the BigDataCloud client-side reverse geocoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseGeocodeResponse {
    pub city: Option<String>,
    pub locality: Option<String>,
    pub principal_subdivision: Option<String>,
    pub country_name: Option<String>,
}

impl From<ReverseGeocodeResponse> for GeoLookup {
    fn from(response: ReverseGeocodeResponse) -> Self {
        let city = response
            .city
            .filter(|city| !city.trim().is_empty())
            .or(response.locality);

        GeoLookup {
            city,
            region: response.principal_subdivision,
            country: response.country_name,
            ..Default::default()
        }
        .normalized()
    }
}

#[derive(Debug, Clone)]
pub struct ReverseGeocodeRequest {
    base_url: String,
    coordinates: Coordinates,
}

impl ReverseGeocodeRequest {
    pub fn new(base_url: impl Into<String>, coordinates: Coordinates) -> Self {
        Self { base_url: base_url.into(), coordinates }
    }
}

impl Request for ReverseGeocodeRequest {
    type Response = ReverseGeocodeResponse;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> Cow<'_, str> {
        "/data/reverse-geocode-client".into()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.coordinates.latitude.to_string()),
            ("longitude", self.coordinates.longitude.to_string()),
            ("localityLanguage", "en".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locality_used_when_city_blank() {
        let response: ReverseGeocodeResponse = serde_json::from_str(
            r#"{
                "city": "",
                "locality": "Shibuya",
                "principalSubdivision": "Tokyo",
                "countryName": "Japan"
            }"#,
        )
        .unwrap();

        let lookup = GeoLookup::from(response);

        assert_eq!(lookup.city.as_deref(), Some("Shibuya"));
        assert_eq!(lookup.region.as_deref(), Some("Tokyo"));
        assert_eq!(lookup.country.as_deref(), Some("Japan"));
        assert_eq!(lookup.ip, None);
    }

    #[test]
    fn test_query_carries_coordinates() {
        let request = ReverseGeocodeRequest::new(
            DEFAULT_BASE_URL,
            Coordinates::new(40.7128, -74.006),
        );

        let query = request.query();
        assert_eq!(query[0], ("latitude", "40.7128".to_string()));
        assert_eq!(query[1], ("longitude", "-74.006".to_string()));
        assert_eq!(query[2], ("localityLanguage", "en".to_string()));
    }
}
