//! Network identity and location.
//!
//! The resolver combines a local address probe, a chain of public IP lookup
//! services, device geolocation and mock fallbacks into a single
//! [`NetworkInfo`] record. Every field of that record is always populated.

pub mod classify;
pub mod client;
pub mod connectivity;
pub mod geolocation;
pub mod local_ip;
pub mod mock;
pub mod providers;
pub mod requests;
pub mod resolver;

use serde::Serialize;

pub use resolver::{NetworkInfoResolver, ResolverConfig};

/// Fallback values used when a lookup leaves a field empty.
pub mod placeholders {
    pub const LOADING: &str = "Loading...";
    pub const DETECTING: &str = "Detecting...";
    pub const UNKNOWN: &str = "Unknown";
    pub const UNKNOWN_CITY: &str = "Unknown City";
    pub const UNKNOWN_REGION: &str = "Unknown Region";
    pub const UNKNOWN_COUNTRY: &str = "Unknown Country";
    pub const UNKNOWN_LOWER: &str = "unknown";
}

/// Warning surfaced wherever a synthesized record is displayed.
pub const MOCK_NOTICE: &str =
    "Network lookups failed; showing estimated details.";

/// Geographic location of the public address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub city: String,
    pub region: String,
    pub country: String,
    pub timezone: String,
}

impl Location {
    /// "City, Region, Country"
    pub fn label(&self) -> String {
        format!("{}, {}, {}", self.city, self.region, self.country)
    }
}

/// Where the location in a [`NetworkInfo`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfoSource {
    /// An IP lookup service answered with a city
    Lookup { provider: String },
    /// Device coordinates were reverse geocoded
    DeviceGeolocation,
    /// Nothing answered; identity fields are synthesized
    Mock,
    /// Resolution has not finished yet
    Pending,
}

impl InfoSource {
    pub fn label(&self) -> String {
        match self {
            InfoSource::Lookup { provider } => provider.clone(),
            InfoSource::DeviceGeolocation => "device geolocation".to_string(),
            InfoSource::Mock => "mock data".to_string(),
            InfoSource::Pending => "pending".to_string(),
        }
    }
}

/// Resolved identity of the current network connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub public_ip: String,
    pub local_ip: String,
    pub isp: String,
    pub location: Location,
    /// Derived classification label, not a measurement
    pub connection_type: String,
    /// Interface type reported by the platform hint
    pub network_interface: String,
    /// Estimated download speed in Mbps, not measured
    pub download_speed: f64,
    pub is_online: bool,
    pub effective_type: String,
    pub source: InfoSource,
}

impl NetworkInfo {
    /// The record shown before the first resolution completes.
    pub fn placeholder(online: bool) -> Self {
        use placeholders::*;

        Self {
            public_ip: LOADING.to_string(),
            local_ip: DETECTING.to_string(),
            isp: LOADING.to_string(),
            location: Location {
                city: LOADING.to_string(),
                region: LOADING.to_string(),
                country: LOADING.to_string(),
                timezone: LOADING.to_string(),
            },
            connection_type: UNKNOWN.to_string(),
            network_interface: UNKNOWN.to_string(),
            download_speed: 0.0,
            is_online: online,
            effective_type: UNKNOWN.to_string(),
            source: InfoSource::Pending,
        }
    }

    /// Mirror a connectivity change into the record.
    pub fn with_online(mut self, online: bool) -> Self {
        self.is_online = online;
        self
    }

    pub fn is_mock(&self) -> bool {
        self.source == InfoSource::Mock
    }

    /// [`MOCK_NOTICE`] for synthesized records.
    pub fn notice(&self) -> Option<&'static str> {
        self.is_mock().then_some(MOCK_NOTICE)
    }

    /// Whether every string field holds a non-empty value.
    pub fn is_complete(&self) -> bool {
        [
            &self.public_ip,
            &self.local_ip,
            &self.isp,
            &self.location.city,
            &self.location.region,
            &self.location.country,
            &self.location.timezone,
            &self.connection_type,
            &self.network_interface,
            &self.effective_type,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Platform network-information hint, when one is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionHint {
    /// "slow-2g", "2g", "3g" or "4g"
    pub effective_type: Option<String>,
    /// Estimated downlink in Mbps
    pub downlink_mbps: Option<f64>,
    /// "wifi", "ethernet", "cellular", ...
    pub interface_type: Option<String>,
}

impl ConnectionHint {
    pub fn is_empty(&self) -> bool {
        self.effective_type.is_none()
            && self.downlink_mbps.is_none()
            && self.interface_type.is_none()
    }
}

/// Inputs the resolver reads instead of ambient globals.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverContext {
    pub online: bool,
    pub connection_hint: Option<ConnectionHint>,
    /// IANA zone used when a lookup does not report one
    pub timezone: String,
}

impl Default for ResolverContext {
    fn default() -> Self {
        Self { online: true, connection_hint: None, timezone: local_timezone() }
    }
}

/// Best-effort local IANA zone name: `$TZ`, then `/etc/timezone`, then UTC.
pub fn local_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        let tz = tz.trim().trim_start_matches(':');
        if !tz.is_empty() {
            return tz.to_string();
        }
    }

    std::fs::read_to_string("/etc/timezone")
        .ok()
        .map(|contents| contents.trim().to_string())
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| "UTC".to_string())
}

/// Partial location record returned by a lookup service.
///
/// Empty strings are normalized to `None` so fallbacks apply uniformly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoLookup {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub isp: Option<String>,
    pub timezone: Option<String>,
}

impl GeoLookup {
    pub fn has_city(&self) -> bool {
        self.city.is_some()
    }

    /// Drop blank fields.
    pub fn normalized(self) -> Self {
        Self {
            ip: non_empty(self.ip),
            city: non_empty(self.city),
            region: non_empty(self.region),
            country: non_empty(self.country),
            isp: non_empty(self.isp),
            timezone: non_empty(self.timezone),
        }
    }

    /// Overlay the location fields of `other`, keeping identity fields
    /// (ip, isp) from `self` when `other` lacks them.
    pub fn merged_with(self, other: GeoLookup) -> Self {
        Self {
            ip: other.ip.or(self.ip),
            city: other.city.or(self.city),
            region: other.region.or(self.region),
            country: other.country.or(self.country),
            isp: other.isp.or(self.isp),
            timezone: other.timezone.or(self.timezone),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_complete() {
        let info = NetworkInfo::placeholder(true);

        assert!(info.is_complete());
        assert_eq!(info.public_ip, "Loading...");
        assert_eq!(info.local_ip, "Detecting...");
        assert_eq!(info.source, InfoSource::Pending);
    }

    #[test]
    fn test_with_online() {
        let info = NetworkInfo::placeholder(true).with_online(false);
        assert!(!info.is_online);
    }

    #[test]
    fn test_notice_only_for_mock_records() {
        let mut info = NetworkInfo::placeholder(true);
        assert_eq!(info.notice(), None);

        info.source = InfoSource::Mock;
        assert_eq!(info.notice(), Some(MOCK_NOTICE));
    }

    #[test]
    fn test_normalized_drops_blank_fields() {
        let lookup = GeoLookup {
            ip: Some("203.0.113.7".to_string()),
            city: Some("   ".to_string()),
            region: Some(String::new()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(lookup.ip.as_deref(), Some("203.0.113.7"));
        assert!(!lookup.has_city());
        assert_eq!(lookup.region, None);
    }

    #[test]
    fn test_merged_keeps_identity_from_partial_lookup() {
        let partial = GeoLookup {
            ip: Some("203.0.113.7".to_string()),
            isp: Some("Example Net".to_string()),
            ..Default::default()
        };
        let device = GeoLookup {
            city: Some("Lisbon".to_string()),
            country: Some("Portugal".to_string()),
            ..Default::default()
        };

        let merged = partial.merged_with(device);

        assert_eq!(merged.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(merged.isp.as_deref(), Some("Example Net"));
        assert_eq!(merged.city.as_deref(), Some("Lisbon"));
        assert_eq!(merged.region, None);
    }

    #[test]
    fn test_info_source_serializes_tagged() {
        let source = InfoSource::Lookup { provider: "ipapi.co".to_string() };
        let json = serde_json::to_value(&source).unwrap();

        assert_eq!(json["kind"], "lookup");
        assert_eq!(json["provider"], "ipapi.co");
    }

    #[test]
    fn test_hint_is_empty() {
        assert!(ConnectionHint::default().is_empty());
        assert!(!ConnectionHint {
            downlink_mbps: Some(12.0),
            ..Default::default()
        }
        .is_empty());
    }
}
