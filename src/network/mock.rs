//! Synthesized identity used when every lookup fails.

use crate::random::RandomSource;

pub const MOCK_ISPS: [&str; 9] = [
    "Comcast Corporation",
    "Verizon Communications",
    "AT&T Services",
    "Charter Communications",
    "T-Mobile USA",
    "Cox Communications",
    "Spectrum Internet",
    "Xfinity Internet",
    "Local Internet Provider",
];

/// An IPv4-looking string, each octet `floor(r·255)`.
pub fn mock_ip(random: &mut dyn RandomSource) -> String {
    let octets: Vec<String> = (0..4)
        .map(|_| ((random.next_f64() * 255.0).floor() as u8).to_string())
        .collect();
    octets.join(".")
}

pub fn mock_isp(random: &mut dyn RandomSource) -> String {
    MOCK_ISPS[random.index(MOCK_ISPS.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_mock_ip_octets() {
        let mut random = ScriptedRandom::new(vec![0.0, 0.5, 0.999, 0.1]);
        assert_eq!(mock_ip(&mut random), "0.127.254.25");
    }

    #[test]
    fn test_mock_isp_bounds() {
        let mut random = ScriptedRandom::constant(0.0);
        assert_eq!(mock_isp(&mut random), "Comcast Corporation");

        let mut random = ScriptedRandom::constant(0.999);
        assert_eq!(mock_isp(&mut random), "Local Internet Provider");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: a mock address always parses as IPv4.
        #[test]
        fn mock_ip_is_ipv4(seed in any::<u64>()) {
            let mut random = SeededRandom::new(Some(seed));
            let ip = mock_ip(&mut random);
            prop_assert!(ip.parse::<Ipv4Addr>().is_ok());
        }
    }
}
