//! Maps plugin names to their parser/formatter constructors.

use std::collections::HashMap;
use std::sync::Arc;

use gnmipulse_client::GnmiPlugin;
use gnmipulse_exporter::Exporter;

use crate::ocinterfaces::{self, OcIfFormatter, OcIfParser};
use crate::oclldp::{self, OcLldpFormatter, OcLldpParser};
use crate::plugin::Plugin;
use crate::{PluginConfig, PluginError};

type PluginBuilder = fn(PluginConfig, &Exporter) -> Result<Arc<dyn GnmiPlugin>, PluginError>;

/// The closed set of plugins this build knows about.
pub struct PluginRegistry {
    builders: HashMap<&'static str, PluginBuilder>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            builders: HashMap::new(),
        };
        registry
            .register(ocinterfaces::PLUG_NAME, build_oc_interfaces)
            .expect("built-in plugin registration");
        registry
            .register(oclldp::PLUG_NAME, build_oc_lldp)
            .expect("built-in plugin registration");
        registry
    }

    fn register(&mut self, name: &'static str, builder: PluginBuilder) -> Result<(), PluginError> {
        if self.builders.contains_key(name) {
            return Err(PluginError::DuplicateRegistration(name.to_string()));
        }
        self.builders.insert(name, builder);
        Ok(())
    }

    /// Builds a plugin instance; its metric families register with the
    /// exporter as a side effect.
    pub fn build(
        &self,
        config: PluginConfig,
        exporter: &Exporter,
    ) -> Result<Arc<dyn GnmiPlugin>, PluginError> {
        let builder = self
            .builders
            .get(config.plugin_name.as_str())
            .ok_or_else(|| PluginError::UnknownPlugin(config.plugin_name.clone()))?;
        builder(config, exporter)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_oc_interfaces(
    config: PluginConfig,
    exporter: &Exporter,
) -> Result<Arc<dyn GnmiPlugin>, PluginError> {
    let parser = OcIfParser::new(config.clone())?;
    let formatter = OcIfFormatter::new(config.clone());
    let plugin = Plugin::new(config, parser, formatter, exporter)?;
    Ok(plugin)
}

fn build_oc_lldp(
    config: PluginConfig,
    exporter: &Exporter,
) -> Result<Arc<dyn GnmiPlugin>, PluginError> {
    let parser = OcLldpParser::new(config.clone())?;
    let formatter = OcLldpFormatter::new(config.clone());
    let plugin = Plugin::new(config, parser, formatter, exporter)?;
    Ok(plugin)
}
