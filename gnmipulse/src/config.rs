//! YAML configuration surface: loading, template merge, validation and
//! resolution into the per-component configuration structs.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use gnmipulse_client::{
    ClientConfig, Credentials, ForcedEncoding, SubMode, TlsConfig, Vendor,
};
use gnmipulse_exporter::ExporterConfig;
use gnmipulse_plugins::PluginConfig;

const MIN_SCRAPE_INTERVAL: Duration = Duration::from_secs(1);
const MIN_SESSION_TTL: Duration = Duration::from_secs(600);
const DEFAULT_DESC_SANITIZE: &str = "[a-zA-Z0-9_:\\-/]";
const METRIC_NAME_PATTERN: &str = "^[a-zA-Z0-9_]*$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Serde helper for humantime duration strings (`10s`, `10m`).
mod humantime_compat {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};
        use std::time::Duration;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// The `global` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    #[serde(default)]
    pub metric_prefix: String,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_listen_path")]
    pub listen_path: String,
    #[serde(with = "humantime_compat")]
    pub scrape_interval: Duration,
    #[serde(default)]
    pub static_labels: BTreeMap<String, String>,
}

fn default_instance_name() -> String {
    "default".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    9456
}

fn default_listen_path() -> String {
    "/metrics".to_string()
}

/// One `devices` entry. The same shape backs `device_template`: every
/// field a device leaves unset is inherited from the template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub tls_ca: Option<String>,
    pub tls_insecure_skip_verify: Option<bool>,
    pub plugins: Option<Vec<String>>,
    pub options: Option<HashMap<String, String>>,
    pub custom_label: Option<String>,
    pub desc_sanitize: Option<String>,
    pub mode: Option<String>,
    pub use_go_defaults: Option<bool>,
    pub on_change: Option<bool>,
    pub force_encoding: Option<String>,
    pub oversampling: Option<i64>,
    #[serde(default, with = "humantime_compat::option")]
    pub max_life: Option<Duration>,
    pub vendor: Option<String>,
}

impl DeviceEntry {
    /// Fills unset fields from the template.
    fn merged_with(self, template: &DeviceEntry) -> DeviceEntry {
        DeviceEntry {
            name: self.name.or_else(|| template.name.clone()),
            address: self.address.or_else(|| template.address.clone()),
            port: self.port.or(template.port),
            user: self.user.or_else(|| template.user.clone()),
            password: self.password.or_else(|| template.password.clone()),
            tls: self.tls.or(template.tls),
            tls_cert: self.tls_cert.or_else(|| template.tls_cert.clone()),
            tls_key: self.tls_key.or_else(|| template.tls_key.clone()),
            tls_ca: self.tls_ca.or_else(|| template.tls_ca.clone()),
            tls_insecure_skip_verify: self
                .tls_insecure_skip_verify
                .or(template.tls_insecure_skip_verify),
            plugins: self.plugins.or_else(|| template.plugins.clone()),
            options: self.options.or_else(|| template.options.clone()),
            custom_label: self.custom_label.or_else(|| template.custom_label.clone()),
            desc_sanitize: self
                .desc_sanitize
                .or_else(|| template.desc_sanitize.clone()),
            mode: self.mode.or_else(|| template.mode.clone()),
            use_go_defaults: self.use_go_defaults.or(template.use_go_defaults),
            on_change: self.on_change.or(template.on_change),
            force_encoding: self
                .force_encoding
                .or_else(|| template.force_encoding.clone()),
            oversampling: self.oversampling.or(template.oversampling),
            max_life: self.max_life.or(template.max_life),
            vendor: self.vendor.or_else(|| template.vendor.clone()),
        }
    }
}

/// Raw deserialized configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub global: GlobalConfig,
    #[serde(default)]
    pub device_template: DeviceEntry,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// One device resolved against the template: the client configuration
/// plus one plugin configuration per selected plugin.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub client: ClientConfig,
    pub plugins: Vec<PluginConfig>,
}

/// Fully validated configuration, ready for assembly.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub exporter: ExporterConfig,
    pub devices: Vec<ResolvedDevice>,
}

/// Loads and validates the configuration file.
pub fn load(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let config: AppConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
    resolve(config)
}

/// Validates the raw configuration and resolves it into per-component
/// structs.
pub fn resolve(config: AppConfig) -> Result<ResolvedConfig, ConfigError> {
    let metric_name_rx = Regex::new(METRIC_NAME_PATTERN).expect("static regex");

    // Global section
    let global = &config.global;
    if !metric_name_rx.is_match(&global.metric_prefix) {
        return Err(ConfigError::Invalid(format!(
            "'{}' is not a valid metric prefix",
            global.metric_prefix
        )));
    }
    if global.scrape_interval < MIN_SCRAPE_INTERVAL {
        return Err(ConfigError::Invalid(format!(
            "scrape interval must be greater than or equal to {}",
            humantime::format_duration(MIN_SCRAPE_INTERVAL)
        )));
    }
    for key in global.static_labels.keys() {
        if key.is_empty() || !metric_name_rx.is_match(key) {
            return Err(ConfigError::Invalid(format!(
                "'{key}' is not a valid static label name"
            )));
        }
    }

    let exporter = ExporterConfig {
        listen_address: global.listen_address.clone(),
        listen_port: global.listen_port,
        listen_path: global.listen_path.clone(),
        instance_name: global.instance_name.clone(),
        metric_prefix: global.metric_prefix.clone(),
        static_labels: global
            .static_labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };

    // Devices
    if config.devices.is_empty() {
        return Err(ConfigError::Invalid("no devices configured".to_string()));
    }
    let mut seen_names: Vec<String> = Vec::new();
    let mut devices = Vec::with_capacity(config.devices.len());
    for entry in config.devices {
        let entry = entry.merged_with(&config.device_template);
        let device = resolve_device(entry, global)?;
        if seen_names.contains(&device.client.device_name) {
            return Err(ConfigError::Invalid(format!(
                "duplicated device name: {}",
                device.client.device_name
            )));
        }
        seen_names.push(device.client.device_name.clone());
        devices.push(device);
    }

    Ok(ResolvedConfig { exporter, devices })
}

fn resolve_device(entry: DeviceEntry, global: &GlobalConfig) -> Result<ResolvedDevice, ConfigError> {
    let name = entry
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConfigError::Invalid("device section must contain a name".to_string()))?;
    let address = entry.address.filter(|a| !a.is_empty()).ok_or_else(|| {
        ConfigError::Invalid(format!("device {name} must contain an address"))
    })?;
    let port = entry
        .port
        .ok_or_else(|| ConfigError::Invalid(format!("device {name} must contain a port")))?;

    let plugins = entry
        .plugins
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("device {name}: no plugins configured")))?;

    let credentials = match (entry.user, entry.password) {
        (Some(user), Some(password)) if !user.is_empty() => Some(Credentials {
            username: user,
            password,
        }),
        _ => None,
    };

    let force_encoding = match entry.force_encoding.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(ForcedEncoding::parse(raw).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "device {name}: the encoding {raw} is not supported by gNMI"
            ))
        })?),
        None => None,
    };

    let max_life = match entry.max_life {
        Some(ttl) if ttl < MIN_SESSION_TTL => {
            warn!(device = %name, "max_life cannot be less than {}", humantime::format_duration(MIN_SESSION_TTL));
            None
        }
        other => other,
    };

    let vendor = match entry.vendor.as_deref() {
        Some("huawei") => Vendor::Huawei,
        _ => Vendor::Generic,
    };

    let cache_data = entry.mode.as_deref() == Some("cache");
    let mode = if entry.on_change.unwrap_or(false) {
        SubMode::OnChange
    } else {
        SubMode::Sample
    };

    let client = ClientConfig {
        device_name: name.clone(),
        address,
        port,
        credentials,
        tls: TlsConfig {
            enabled: entry.tls.unwrap_or(false),
            insecure_skip_verify: entry.tls_insecure_skip_verify.unwrap_or(false),
            ca_cert: entry.tls_ca.filter(|s| !s.is_empty()),
            client_cert: entry.tls_cert.filter(|s| !s.is_empty()),
            client_key: entry.tls_key.filter(|s| !s.is_empty()),
        },
        force_encoding,
        scrape_interval: global.scrape_interval,
        max_life,
        mode,
        updates_only: !cache_data,
        oversampling: entry.oversampling.unwrap_or(0),
        vendor,
    };

    let desc_sanitize = entry
        .desc_sanitize
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_DESC_SANITIZE.to_string());
    let custom_label = entry.custom_label.unwrap_or_default();
    let options = entry.options.unwrap_or_default();

    let plugin_configs = plugins
        .iter()
        .map(|plugin_name| PluginConfig {
            device_name: name.clone(),
            plugin_name: plugin_name.clone(),
            custom_label: custom_label.clone(),
            desc_sanitize: desc_sanitize.clone(),
            use_defaults: entry.use_go_defaults.unwrap_or(false),
            cache_data,
            scrape_interval: global.scrape_interval,
            options: options.clone(),
        })
        .collect();

    Ok(ResolvedDevice {
        client,
        plugins: plugin_configs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<ResolvedConfig, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        resolve(config)
    }

    const MINIMAL: &str = r#"
global:
  metric_prefix: gnmi
  scrape_interval: 10s
devices:
  - name: router01
    address: 192.0.2.1
    port: 9339
    plugins: [oc_interfaces]
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let resolved = parse(MINIMAL).unwrap();
        assert_eq!(resolved.exporter.instance_name, "default");
        assert_eq!(resolved.exporter.listen_address, "0.0.0.0");
        assert_eq!(resolved.exporter.listen_port, 9456);
        assert_eq!(resolved.exporter.listen_path, "/metrics");

        let device = &resolved.devices[0];
        assert_eq!(device.client.device_name, "router01");
        assert_eq!(device.client.scrape_interval, Duration::from_secs(10));
        assert!(device.client.updates_only);
        assert_eq!(device.client.mode, SubMode::Sample);
        assert_eq!(device.client.vendor, Vendor::Generic);
        assert!(device.client.max_life.is_none());

        let plugin = &device.plugins[0];
        assert_eq!(plugin.plugin_name, "oc_interfaces");
        assert_eq!(plugin.desc_sanitize, DEFAULT_DESC_SANITIZE);
        assert!(!plugin.cache_data);
        assert!(!plugin.use_defaults);
    }

    #[test]
    fn test_template_merge() {
        let yaml = r#"
global:
  metric_prefix: gnmi
  scrape_interval: 10s
device_template:
  port: 9339
  user: admin
  password: secret
  plugins: [oc_interfaces, oc_lldp]
  mode: cache
  options:
    disable_subint: "true"
devices:
  - name: router01
    address: 192.0.2.1
  - name: router02
    address: 192.0.2.2
    port: 57400
    plugins: [oc_lldp]
"#;
        let resolved = parse(yaml).unwrap();
        let r1 = &resolved.devices[0];
        assert_eq!(r1.client.port, 9339);
        assert_eq!(r1.plugins.len(), 2);
        assert!(r1.plugins[0].cache_data);
        assert!(!r1.client.updates_only);
        assert_eq!(
            r1.plugins[0].options.get("disable_subint").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            r1.client.credentials.as_ref().unwrap().username,
            "admin"
        );

        let r2 = &resolved.devices[1];
        assert_eq!(r2.client.port, 57400);
        assert_eq!(r2.plugins.len(), 1);
        assert_eq!(r2.plugins[0].plugin_name, "oc_lldp");
    }

    #[test]
    fn test_invalid_metric_prefix_rejected() {
        let yaml = MINIMAL.replace("metric_prefix: gnmi", "metric_prefix: \"bad-prefix\"");
        assert!(matches!(parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_short_scrape_interval_rejected() {
        let yaml = MINIMAL.replace("scrape_interval: 10s", "scrape_interval: 500ms");
        assert!(matches!(parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_device_names_rejected() {
        let yaml = r#"
global:
  metric_prefix: gnmi
  scrape_interval: 10s
devices:
  - name: router01
    address: 192.0.2.1
    port: 9339
    plugins: [oc_interfaces]
  - name: router01
    address: 192.0.2.2
    port: 9339
    plugins: [oc_interfaces]
"#;
        assert!(matches!(parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_no_devices_rejected() {
        let yaml = r#"
global:
  metric_prefix: gnmi
  scrape_interval: 10s
"#;
        assert!(matches!(parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_device_without_plugins_rejected() {
        let yaml = r#"
global:
  metric_prefix: gnmi
  scrape_interval: 10s
devices:
  - name: router01
    address: 192.0.2.1
    port: 9339
"#;
        assert!(matches!(parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_short_max_life_discarded() {
        let yaml = MINIMAL.replace(
            "plugins: [oc_interfaces]",
            "plugins: [oc_interfaces]\n    max_life: 5m",
        );
        let resolved = parse(&yaml).unwrap();
        assert!(resolved.devices[0].client.max_life.is_none());

        let yaml = MINIMAL.replace(
            "plugins: [oc_interfaces]",
            "plugins: [oc_interfaces]\n    max_life: 30m",
        );
        let resolved = parse(&yaml).unwrap();
        assert_eq!(
            resolved.devices[0].client.max_life,
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn test_invalid_force_encoding_rejected() {
        let yaml = MINIMAL.replace(
            "plugins: [oc_interfaces]",
            "plugins: [oc_interfaces]\n    force_encoding: XML",
        );
        assert!(matches!(parse(&yaml), Err(ConfigError::Invalid(_))));

        let yaml = MINIMAL.replace(
            "plugins: [oc_interfaces]",
            "plugins: [oc_interfaces]\n    force_encoding: json_ietf",
        );
        let resolved = parse(&yaml).unwrap();
        assert_eq!(
            resolved.devices[0].client.force_encoding,
            Some(ForcedEncoding::JsonIetf)
        );
    }

    #[test]
    fn test_invalid_static_label_rejected() {
        let yaml = MINIMAL.replace(
            "scrape_interval: 10s",
            "scrape_interval: 10s\n  static_labels:\n    \"bad-key\": x",
        );
        assert!(matches!(parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_huawei_vendor_and_on_change() {
        let yaml = MINIMAL.replace(
            "plugins: [oc_interfaces]",
            "plugins: [oc_interfaces]\n    vendor: huawei\n    on_change: true",
        );
        let resolved = parse(&yaml).unwrap();
        assert_eq!(resolved.devices[0].client.vendor, Vendor::Huawei);
        assert_eq!(resolved.devices[0].client.mode, SubMode::OnChange);
    }
}
