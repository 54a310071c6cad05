//! Per-device client configuration, resolved from the `devices` config
//! section by the core assembler.

use std::time::Duration;

use crate::gnmi;

/// Authentication credentials, attached to every RPC as metadata.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// TLS configuration for the device endpoint.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Enable TLS; cleartext HTTP/2 otherwise.
    pub enabled: bool,
    /// Skip certificate verification.
    pub insecure_skip_verify: bool,
    /// Path to CA certificate file.
    pub ca_cert: Option<String>,
    /// Path to client certificate file.
    pub client_cert: Option<String>,
    /// Path to client key file.
    pub client_key: Option<String>,
}

/// Encoding enforced by configuration instead of capability discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedEncoding {
    Json,
    Bytes,
    Proto,
    Ascii,
    JsonIetf,
}

impl ForcedEncoding {
    pub fn to_proto(self) -> gnmi::Encoding {
        match self {
            ForcedEncoding::Json => gnmi::Encoding::Json,
            ForcedEncoding::Bytes => gnmi::Encoding::Bytes,
            ForcedEncoding::Proto => gnmi::Encoding::Proto,
            ForcedEncoding::Ascii => gnmi::Encoding::Ascii,
            ForcedEncoding::JsonIetf => gnmi::Encoding::JsonIetf,
        }
    }

    /// Parses the config-file spelling (`JSON`, `JSON_IETF`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "JSON" => Some(ForcedEncoding::Json),
            "BYTES" => Some(ForcedEncoding::Bytes),
            "PROTO" => Some(ForcedEncoding::Proto),
            "ASCII" => Some(ForcedEncoding::Ascii),
            "JSON_IETF" => Some(ForcedEncoding::JsonIetf),
            _ => None,
        }
    }
}

/// Per-path subscription mode requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubMode {
    #[default]
    Sample,
    OnChange,
}

impl SubMode {
    pub fn to_proto(self) -> gnmi::SubscriptionMode {
        match self {
            SubMode::Sample => gnmi::SubscriptionMode::Sample,
            SubMode::OnChange => gnmi::SubscriptionMode::OnChange,
        }
    }
}

/// Device vendor quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vendor {
    #[default]
    Generic,
    /// Strips YANG module prefixes from incoming path names and
    /// prepends the data model name to subscription paths.
    Huawei,
}

/// Everything a device worker needs to run its session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device name; label value on every metric of this device.
    pub device_name: String,
    /// IP literal or DNS name.
    pub address: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub tls: TlsConfig,
    pub force_encoding: Option<ForcedEncoding>,
    pub scrape_interval: Duration,
    /// Session TTL; the stream is torn down and redialed at expiry.
    pub max_life: Option<Duration>,
    pub mode: SubMode,
    /// `updates_only` on the subscription list; set unless the plugins
    /// run in cache mode.
    pub updates_only: bool,
    /// Ratio of scrape interval to sample interval, clamped to [1,10].
    pub oversampling: i64,
    pub vendor: Vendor,
}

impl ClientConfig {
    /// gRPC endpoint URI for the device. The address may be an IP
    /// literal or a DNS name; IPv6 literals are bracketed.
    pub fn endpoint_uri(&self) -> String {
        let scheme = if self.tls.enabled { "https" } else { "http" };
        match self.address.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V6(_)) => {
                format!("{}://[{}]:{}", scheme, self.address, self.port)
            }
            _ => format!("{}://{}:{}", scheme, self.address, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str, tls: bool) -> ClientConfig {
        ClientConfig {
            device_name: "router01".to_string(),
            address: address.to_string(),
            port: 9339,
            credentials: None,
            tls: TlsConfig {
                enabled: tls,
                ..TlsConfig::default()
            },
            force_encoding: None,
            scrape_interval: Duration::from_secs(10),
            max_life: None,
            mode: SubMode::Sample,
            updates_only: true,
            oversampling: 2,
            vendor: Vendor::Generic,
        }
    }

    #[test]
    fn test_endpoint_uri_ip_literal() {
        assert_eq!(
            config("192.0.2.1", false).endpoint_uri(),
            "http://192.0.2.1:9339"
        );
        assert_eq!(
            config("2001:db8::1", true).endpoint_uri(),
            "https://[2001:db8::1]:9339"
        );
    }

    #[test]
    fn test_endpoint_uri_dns_name() {
        assert_eq!(
            config("core1.example.net", false).endpoint_uri(),
            "http://core1.example.net:9339"
        );
    }

    #[test]
    fn test_forced_encoding_parse() {
        assert_eq!(ForcedEncoding::parse("json"), Some(ForcedEncoding::Json));
        assert_eq!(
            ForcedEncoding::parse("JSON_IETF"),
            Some(ForcedEncoding::JsonIetf)
        );
        assert_eq!(ForcedEncoding::parse("XML"), None);
    }
}
