//! Schema plugins: the decoding and formatting layer between the gNMI
//! client and the exporter.
//!
//! A plugin binds a parser (notifications → schema model) to a
//! formatter (schema model → metric samples). The [`plugin::Plugin`]
//! runtime owns the pair together with a passthrough buffer, serves
//! both the client-facing ingest side and the exporter-facing scrape
//! side, and keeps the two modes of operation (cache vs. passthrough)
//! behind one mutex.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use gnmipulse_client::gnmi::Notification;
use gnmipulse_exporter::{DescriptorSpec, Sample};

pub mod buffer;
pub mod metrics;
pub mod ocinterfaces;
pub mod oclldp;
pub mod parsermon;
pub mod plugin;
pub mod registry;
#[cfg(test)]
pub(crate) mod testutil;
mod values;

pub use plugin::Plugin;
pub use registry::PluginRegistry;

/// Plugin instance configuration, resolved per (device, plugin) by the
/// core assembler.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub device_name: String,
    pub plugin_name: String,
    /// Free-form label value forwarded on every sample.
    pub custom_label: String,
    /// Character class regex; description leaves keep matching
    /// characters only.
    pub desc_sanitize: String,
    /// Emit unset counter leaves as zero.
    pub use_defaults: bool,
    /// Cache mode: parse on arrival, model persists across scrapes.
    /// Passthrough otherwise.
    pub cache_data: bool,
    pub scrape_interval: Duration,
    /// Plugin-specific options from the device config.
    pub options: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin {0} is not registered")]
    UnknownPlugin(String),
    #[error("duplicate plugin registration for {0}")]
    DuplicateRegistration(String),
    #[error("invalid {option} regex: {source}")]
    InvalidRegex {
        option: String,
        source: regex::Error,
    },
    #[error(transparent)]
    Registration(#[from] gnmipulse_exporter::ExporterError),
}

/// Subscription requirements declared by a formatter.
#[derive(Debug, Clone, Default)]
pub struct FormatterPaths {
    /// Paths to subscribe, YANG key filters included.
    pub xpaths: Vec<String>,
    /// YANG models the device must support.
    pub datamodels: Vec<String>,
}

/// Loads received gNMI data into the schema model.
pub trait Parser: Send {
    type Model;

    /// Descriptors of the parser's self-monitoring families.
    fn describe(&self) -> Vec<DescriptorSpec>;
    /// Current self-monitoring readings.
    fn collect(&self) -> Vec<Sample>;
    /// Reflects one notification (deletes, then updates) into the model.
    fn parse_notification(&mut self, nf: &Notification);
    /// The current model.
    fn model(&self) -> &Self::Model;
    /// Drops accumulated model state.
    fn clear_cache(&mut self);
}

/// Builds metric samples from the schema model at scrape time.
///
/// `collect` borrows the parser's model for the duration of the call
/// only; any auxiliary lookup tables live on its stack.
pub trait Formatter: Send {
    type Model;

    /// Descriptors of the families this formatter emits.
    fn describe(&self) -> Vec<DescriptorSpec>;
    /// Paths and models to subscribe on this formatter's behalf.
    fn paths(&self) -> FormatterPaths;
    /// Emits the samples for the current model content.
    fn collect(&self, model: &Self::Model) -> Vec<Sample>;
}

/// Reads a boolean plugin option, accepting the usual config spellings.
pub(crate) fn option_flag(options: &HashMap<String, String>, key: &str) -> bool {
    matches!(
        options.get(key).map(|s| s.as_str()),
        Some("1") | Some("t") | Some("T") | Some("true") | Some("TRUE") | Some("True")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_flag_spellings() {
        let mut options = HashMap::new();
        options.insert("a".to_string(), "true".to_string());
        options.insert("b".to_string(), "1".to_string());
        options.insert("c".to_string(), "false".to_string());
        options.insert("d".to_string(), "yes".to_string());

        assert!(option_flag(&options, "a"));
        assert!(option_flag(&options, "b"));
        assert!(!option_flag(&options, "c"));
        assert!(!option_flag(&options, "d"));
        assert!(!option_flag(&options, "missing"));
    }
}
