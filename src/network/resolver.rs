//! Network info resolution pipeline.
//!
//! 1. Local address discovery, bounded by a hard timeout.
//! 2. Public IP lookup chain; the first answer with a city wins.
//! 3. Device geolocation plus reverse geocoding when the chain fails.
//! 4. Mock identity for whatever is still missing.
//!
//! [`NetworkInfoResolver::resolve`] never fails; every field of the record
//! it returns is populated.

use std::time::Duration;

use log::{debug, info, warn};

use super::classify::{connection_label, estimate_download};
use super::client::Client;
use super::geolocation::{GeolocationSource, HttpReverseGeocoder, ReverseGeocoder};
use super::local_ip::{
    discover_local_ip, CandidateGatherer, UdpCandidateGatherer,
    DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_STUN_TARGET,
};
use super::mock::{mock_ip, mock_isp};
use super::placeholders::{UNKNOWN_CITY, UNKNOWN_COUNTRY, UNKNOWN_LOWER, UNKNOWN_REGION};
use super::providers::{default_providers, LookupProvider, ProviderUrls};
use super::requests::reverse_geocode;
use super::{GeoLookup, InfoSource, Location, NetworkInfo, ResolverContext};
use crate::errors::SpeedTestError;
use crate::random::RandomSource;

/// Configuration for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Per-request timeout for the HTTP lookups
    pub lookup_timeout: Duration,
    /// Hard limit on local address discovery
    pub local_ip_timeout: Duration,
    /// Host the UDP probe is routed toward
    pub stun_target: String,
    pub provider_urls: ProviderUrls,
    pub reverse_geocode_url: String,
    /// Skip every HTTP lookup and go straight to the fallbacks
    pub offline_lookup: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(8),
            local_ip_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            stun_target: DEFAULT_STUN_TARGET.to_string(),
            provider_urls: ProviderUrls::default(),
            reverse_geocode_url: reverse_geocode::DEFAULT_BASE_URL.to_string(),
            offline_lookup: false,
        }
    }
}

/// Resolves a [`NetworkInfo`] record from the configured sources.
pub struct NetworkInfoResolver {
    providers: Vec<Box<dyn LookupProvider>>,
    gatherer: Box<dyn CandidateGatherer>,
    local_ip_timeout: Duration,
    geolocation: Box<dyn GeolocationSource>,
    reverse_geocoder: Option<Box<dyn ReverseGeocoder>>,
    random: Box<dyn RandomSource>,
}

impl NetworkInfoResolver {
    /// Resolver with no lookup services; only fallbacks apply until
    /// providers are added.
    pub fn new(
        gatherer: Box<dyn CandidateGatherer>,
        geolocation: Box<dyn GeolocationSource>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            providers: Vec::new(),
            gatherer,
            local_ip_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            geolocation,
            reverse_geocoder: None,
            random,
        }
    }

    /// The standard pipeline described by `config`.
    pub fn from_config(
        config: &ResolverConfig,
        geolocation: Box<dyn GeolocationSource>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, SpeedTestError> {
        let gatherer = UdpCandidateGatherer::new(config.stun_target.as_str());
        let resolver = Self::new(Box::new(gatherer), geolocation, random)
            .with_local_ip_timeout(config.local_ip_timeout);

        if config.offline_lookup {
            debug!("HTTP lookups disabled");
            return Ok(resolver);
        }

        let client = Client::new(config.lookup_timeout)?;
        let geocoder = HttpReverseGeocoder::new(
            client.clone(),
            config.reverse_geocode_url.as_str(),
        );

        Ok(resolver
            .with_providers(default_providers(&client, &config.provider_urls))
            .with_reverse_geocoder(Box::new(geocoder)))
    }

    pub fn with_providers(
        mut self,
        providers: Vec<Box<dyn LookupProvider>>,
    ) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_reverse_geocoder(
        mut self,
        reverse_geocoder: Box<dyn ReverseGeocoder>,
    ) -> Self {
        self.reverse_geocoder = Some(reverse_geocoder);
        self
    }

    #[cfg(test)]
    pub fn with_gatherer(mut self, gatherer: Box<dyn CandidateGatherer>) -> Self {
        self.gatherer = gatherer;
        self
    }

    pub fn with_local_ip_timeout(mut self, timeout: Duration) -> Self {
        self.local_ip_timeout = timeout;
        self
    }

    /// Resolve a complete record. Never fails.
    pub async fn resolve(&mut self, context: &ResolverContext) -> NetworkInfo {
        let local_ip =
            discover_local_ip(&*self.gatherer, self.local_ip_timeout).await;
        debug!("Local address: {}", local_ip);

        let (lookup, source) = self.lookup_location(context).await;
        let hint = context.connection_hint.as_ref();

        let random = self.random.as_mut();
        let download_speed = estimate_download(hint, random);
        let connection_type = connection_label(hint, download_speed, random);

        let info = NetworkInfo {
            public_ip: lookup.ip.unwrap_or_else(|| mock_ip(random)),
            local_ip,
            isp: lookup.isp.unwrap_or_else(|| mock_isp(random)),
            location: Location {
                city: lookup.city.unwrap_or_else(|| UNKNOWN_CITY.to_string()),
                region: lookup
                    .region
                    .unwrap_or_else(|| UNKNOWN_REGION.to_string()),
                country: lookup
                    .country
                    .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
                timezone: lookup
                    .timezone
                    .unwrap_or_else(|| fallback_timezone(context)),
            },
            connection_type,
            network_interface: hint
                .and_then(|h| h.interface_type.clone())
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_LOWER.to_string()),
            download_speed,
            is_online: context.online,
            effective_type: hint
                .and_then(|h| h.effective_type.clone())
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_LOWER.to_string()),
            source,
        };

        if info.is_mock() {
            warn!("Network lookups failed; showing mock network details");
        } else {
            info!(
                "Resolved {} via {}",
                info.location.label(),
                info.source.label()
            );
        }

        info
    }

    /// Re-run resolution and replace `info` in place.
    pub async fn refresh(
        &mut self,
        context: &ResolverContext,
        info: &mut NetworkInfo,
    ) {
        debug!("Refreshing network info");
        *info = self.resolve(context).await;
    }

    async fn lookup_location(
        &self,
        context: &ResolverContext,
    ) -> (GeoLookup, InfoSource) {
        if !context.online {
            debug!("Offline; skipping network lookups");
            return (GeoLookup::default(), InfoSource::Mock);
        }

        // Identity fields from an answer without a city are kept for the
        // fallbacks below.
        let mut partial = GeoLookup::default();

        for provider in &self.providers {
            match provider.lookup().await {
                Ok(lookup) if lookup.has_city() => {
                    debug!("{} answered with a city", provider.name());
                    let source = InfoSource::Lookup {
                        provider: provider.name().to_string(),
                    };
                    return (lookup, source);
                }
                Ok(lookup) => {
                    debug!("{} answered without a city", provider.name());
                    partial = partial.merged_with(lookup);
                }
                Err(e) => {
                    debug!("{} lookup failed: {}", provider.name(), e);
                }
            }
        }

        match self.device_location().await {
            Some(device) => {
                (partial.merged_with(device), InfoSource::DeviceGeolocation)
            }
            None => (partial, InfoSource::Mock),
        }
    }

    async fn device_location(&self) -> Option<GeoLookup> {
        let geocoder = self.reverse_geocoder.as_ref()?;

        let coordinates = match self.geolocation.current_position().await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                debug!("Device geolocation unavailable: {}", e);
                return None;
            }
        };

        match geocoder.reverse(coordinates).await {
            Ok(lookup) if lookup.has_city() => Some(lookup),
            Ok(_) => {
                debug!("Reverse geocoding returned no place name");
                None
            }
            Err(e) => {
                debug!("Reverse geocoding failed: {}", e);
                None
            }
        }
    }
}

fn fallback_timezone(context: &ResolverContext) -> String {
    let timezone = context.timezone.trim();
    if timezone.is_empty() {
        "UTC".to_string()
    } else {
        timezone.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::geolocation::{Coordinates, DeniedGeolocation, FixedGeolocation};
    use crate::network::local_ip::test_support::StaticGatherer;
    use crate::network::local_ip::LOCAL_IP_PLACEHOLDER;
    use crate::network::mock::MOCK_ISPS;
    use crate::network::ConnectionHint;
    use crate::random::{ScriptedRandom, SeededRandom};
    use std::net::Ipv4Addr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn context() -> ResolverContext {
        ResolverContext {
            online: true,
            connection_hint: None,
            timezone: "Europe/Lisbon".to_string(),
        }
    }

    fn config(urls: ProviderUrls, reverse_geocode_url: &str) -> ResolverConfig {
        ResolverConfig {
            lookup_timeout: Duration::from_secs(2),
            provider_urls: urls,
            reverse_geocode_url: reverse_geocode_url.to_string(),
            ..Default::default()
        }
    }

    fn resolver(
        config: &ResolverConfig,
        geolocation: Box<dyn GeolocationSource>,
    ) -> NetworkInfoResolver {
        NetworkInfoResolver::from_config(
            config,
            geolocation,
            Box::new(SeededRandom::new(Some(42))),
        )
        .unwrap()
        .with_gatherer(Box::new(StaticGatherer::new(&[
            "candidate:1 1 udp 2122260223 10.1.2.3 50000 typ host",
        ])))
    }

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_status(server: &MockServer, route: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let ipapi = MockServer::start().await;
        mount_json(
            &ipapi,
            "/json/",
            serde_json::json!({
                "ip": "203.0.113.7",
                "city": "Austin",
                "region": "Texas",
                "country_name": "United States",
                "org": "Example Fiber",
                "timezone": "America/Chicago"
            }),
        )
        .await;

        let urls = ProviderUrls {
            ipapi_co: ipapi.uri(),
            ip_api_com: UNREACHABLE.to_string(),
            ipinfo_io: UNREACHABLE.to_string(),
        };
        let mut resolver =
            resolver(&config(urls, UNREACHABLE), Box::new(DeniedGeolocation));

        let info = resolver.resolve(&context()).await;

        assert_eq!(info.public_ip, "203.0.113.7");
        assert_eq!(info.local_ip, "10.1.2.3");
        assert_eq!(info.isp, "Example Fiber");
        assert_eq!(info.location.city, "Austin");
        assert_eq!(info.location.timezone, "America/Chicago");
        assert_eq!(
            info.source,
            InfoSource::Lookup { provider: "ipapi.co".to_string() }
        );
        assert!(info.is_complete());
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let ipapi = MockServer::start().await;
        mount_status(&ipapi, "/json/", 429).await;

        let ip_api = MockServer::start().await;
        mount_json(
            &ip_api,
            "/json/",
            serde_json::json!({
                "status": "fail",
                "message": "reserved range",
                "query": "198.51.100.23"
            }),
        )
        .await;

        let ipinfo = MockServer::start().await;
        mount_json(
            &ipinfo,
            "/json",
            serde_json::json!({
                "ip": "198.51.100.23",
                "city": "Sydney",
                "region": "New South Wales",
                "country": "AU",
                "org": "AS1221 Telstra"
            }),
        )
        .await;

        let urls = ProviderUrls {
            ipapi_co: ipapi.uri(),
            ip_api_com: ip_api.uri(),
            ipinfo_io: ipinfo.uri(),
        };
        let mut resolver =
            resolver(&config(urls, UNREACHABLE), Box::new(DeniedGeolocation));

        let info = resolver.resolve(&context()).await;

        assert_eq!(info.location.city, "Sydney");
        assert_eq!(info.location.country, "AU");
        // ipinfo.io reported no timezone.
        assert_eq!(info.location.timezone, "Europe/Lisbon");
        assert_eq!(
            info.source,
            InfoSource::Lookup { provider: "ipinfo.io".to_string() }
        );
    }

    #[tokio::test]
    async fn test_device_geolocation_fallback_keeps_partial_identity() {
        let ip_api = MockServer::start().await;
        mount_json(
            &ip_api,
            "/json/",
            serde_json::json!({"query": "198.51.100.99", "isp": "Partial ISP"}),
        )
        .await;

        let geocoder = MockServer::start().await;
        mount_json(
            &geocoder,
            "/data/reverse-geocode-client",
            serde_json::json!({
                "city": "",
                "locality": "Porto",
                "principalSubdivision": "Porto",
                "countryName": "Portugal"
            }),
        )
        .await;

        let urls = ProviderUrls {
            ipapi_co: UNREACHABLE.to_string(),
            ip_api_com: ip_api.uri(),
            ipinfo_io: UNREACHABLE.to_string(),
        };
        let geolocation =
            FixedGeolocation::new(Coordinates::new(41.1579, -8.6291));
        let mut resolver =
            resolver(&config(urls, &geocoder.uri()), Box::new(geolocation));

        let info = resolver.resolve(&context()).await;

        assert_eq!(info.source, InfoSource::DeviceGeolocation);
        assert_eq!(info.location.city, "Porto");
        assert_eq!(info.location.country, "Portugal");
        assert_eq!(info.location.timezone, "Europe/Lisbon");
        assert_eq!(info.public_ip, "198.51.100.99");
        assert_eq!(info.isp, "Partial ISP");
    }

    #[tokio::test]
    async fn test_total_failure_yields_complete_mock_record() {
        let urls = ProviderUrls::all(UNREACHABLE);
        let mut resolver =
            resolver(&config(urls, UNREACHABLE), Box::new(DeniedGeolocation));

        let info = resolver.resolve(&context()).await;

        assert!(info.is_mock());
        assert!(info.is_complete());
        assert!(info.public_ip.parse::<Ipv4Addr>().is_ok());
        assert!(MOCK_ISPS.contains(&info.isp.as_str()));
        assert_eq!(info.location.city, "Unknown City");
        assert_eq!(info.location.region, "Unknown Region");
        assert_eq!(info.location.country, "Unknown Country");
        assert_eq!(info.location.timezone, "Europe/Lisbon");
        assert_eq!(info.network_interface, "unknown");
        assert_eq!(info.effective_type, "unknown");
        assert!((20.0..120.0).contains(&info.download_speed));
    }

    #[tokio::test]
    async fn test_offline_context_makes_no_requests() {
        let ipapi = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&ipapi)
            .await;

        let urls = ProviderUrls::all(&ipapi.uri());
        let mut resolver =
            resolver(&config(urls, &ipapi.uri()), Box::new(DeniedGeolocation));
        let context = ResolverContext { online: false, ..context() };

        let info = resolver.resolve(&context).await;

        assert!(info.is_mock());
        assert!(!info.is_online);
        assert!(info.is_complete());
    }

    #[tokio::test]
    async fn test_offline_lookup_config_has_no_providers() {
        let config = ResolverConfig {
            offline_lookup: true,
            ..Default::default()
        };
        let mut resolver = NetworkInfoResolver::from_config(
            &config,
            Box::new(DeniedGeolocation),
            Box::new(ScriptedRandom::constant(0.5)),
        )
        .unwrap()
        .with_gatherer(Box::new(StaticGatherer::never()))
        .with_local_ip_timeout(Duration::from_millis(10));

        let info = resolver.resolve(&context()).await;

        assert!(info.is_mock());
        assert_eq!(info.local_ip, LOCAL_IP_PLACEHOLDER);
        assert_eq!(info.public_ip, "127.127.127.127");
        assert_eq!(info.download_speed, 70.0);
    }

    #[tokio::test]
    async fn test_hint_drives_classification() {
        let mut resolver = NetworkInfoResolver::new(
            Box::new(StaticGatherer::new(&[])),
            Box::new(DeniedGeolocation),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        let context = ResolverContext {
            connection_hint: Some(ConnectionHint {
                effective_type: Some("4g".to_string()),
                downlink_mbps: Some(9.5),
                interface_type: Some("cellular".to_string()),
            }),
            ..context()
        };

        let info = resolver.resolve(&context).await;

        assert_eq!(info.connection_type, "Mobile 4G");
        assert_eq!(info.effective_type, "4g");
        assert_eq!(info.network_interface, "cellular");
        assert_eq!(info.download_speed, 9.5);
    }

    #[tokio::test]
    async fn test_refresh_replaces_record_in_place() {
        let mut resolver = NetworkInfoResolver::new(
            Box::new(StaticGatherer::new(&[
                "candidate:1 1 udp 1 10.9.8.7 1 typ host",
            ])),
            Box::new(DeniedGeolocation),
            Box::new(SeededRandom::new(Some(1))),
        );
        let mut info = NetworkInfo::placeholder(true);

        resolver.refresh(&context(), &mut info).await;

        assert_eq!(info.local_ip, "10.9.8.7");
        assert_ne!(info.public_ip, "Loading...");
        assert_ne!(info.source, InfoSource::Pending);
    }
}
