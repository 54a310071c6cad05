//! Routes incoming subscribe responses to the plugin that owns them.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::client::ClientError;
use crate::config::Vendor;
use crate::gnmi::{subscribe_response::Response, Notification, SubscribeResponse};
use crate::monitor::ClientMonitor;
use crate::paths::{full_schema_path, strip_module_prefix};

/// Device-side face of a plugin: what the client needs in order to
/// subscribe on its behalf and hand it the notifications it owns.
pub trait GnmiPlugin: Send + Sync {
    fn name(&self) -> &str;
    /// Paths to subscribe, YANG key filters included.
    fn paths_to_subscribe(&self) -> Vec<String>;
    /// YANG models the device must advertise.
    fn data_models(&self) -> Vec<String>;
    fn on_sync(&self, status: bool);
    fn notification(&self, nf: Notification);
}

/// Per-device notification router.
///
/// Plugins register before the worker starts; the routing table maps
/// each subscribed schema path (keys stripped) to its plugin in
/// registration order.
pub struct Router {
    vendor: Vendor,
    monitor: Arc<ClientMonitor>,
    plugins: HashMap<String, Arc<dyn GnmiPlugin>>,
    plugin_order: Vec<Arc<dyn GnmiPlugin>>,
    /// Schema path -> owning plugin, in registration order.
    routes: Vec<(String, Arc<dyn GnmiPlugin>)>,
    /// Raw subscription paths (keys kept) with their data model.
    subscribe_paths: Vec<(String, String)>,
}

impl Router {
    pub fn new(vendor: Vendor, monitor: Arc<ClientMonitor>) -> Self {
        Self {
            vendor,
            monitor,
            plugins: HashMap::new(),
            plugin_order: Vec::new(),
            routes: Vec::new(),
            subscribe_paths: Vec::new(),
        }
    }

    /// Registers a plugin and its subscription paths.
    ///
    /// A path whose schema form is a prefix of an already registered
    /// path (or extends one) would make routing ambiguous and is
    /// rejected. The same plugin may register the same schema path more
    /// than once (key-filtered variants of one subtree).
    pub fn register_plugin(
        &mut self,
        name: &str,
        plugin: Arc<dyn GnmiPlugin>,
    ) -> Result<(), ClientError> {
        if self.plugins.contains_key(name) {
            return Err(ClientError::PluginAlreadyRegistered(name.to_string()));
        }

        let strip_keys = Regex::new(r"\[.*?\]").expect("static regex");
        let data_model = plugin.data_models().first().cloned().unwrap_or_default();

        for raw_path in plugin.paths_to_subscribe() {
            let schema = strip_keys.replace_all(&raw_path, "").to_string();

            let mut already_routed = false;
            for (existing, owner) in &self.routes {
                if *existing == schema && Arc::ptr_eq(owner, &plugin) {
                    already_routed = true;
                    break;
                }
                if existing.starts_with(&schema) || schema.starts_with(existing) {
                    return Err(ClientError::AmbiguousPath {
                        new: schema,
                        existing: existing.clone(),
                    });
                }
            }
            if !already_routed {
                self.routes.push((schema, plugin.clone()));
            }
            self.subscribe_paths.push((raw_path, data_model.clone()));
        }

        self.plugins.insert(name.to_string(), plugin.clone());
        self.plugin_order.push(plugin);
        Ok(())
    }

    /// Raw subscription paths with their data model, in registration
    /// order.
    pub(crate) fn subscription_paths(&self) -> &[(String, String)] {
        &self.subscribe_paths
    }

    /// Deduplicated YANG models required across all plugins.
    pub fn required_models(&self) -> Vec<String> {
        let mut models = Vec::new();
        for plugin in &self.plugin_order {
            for model in plugin.data_models() {
                if !models.contains(&model) {
                    models.push(model);
                }
            }
        }
        models
    }

    pub fn is_empty(&self) -> bool {
        self.plugin_order.is_empty()
    }

    /// Delivers a sync state change to every plugin.
    pub fn broadcast_sync(&self, status: bool) {
        for plugin in &self.plugin_order {
            plugin.on_sync(status);
        }
    }

    /// Examines a subscribe response and hands it to the plugin that
    /// owns it. Unroutable notifications are counted and dropped.
    pub fn route(&self, sr: SubscribeResponse) {
        let Some(response) = sr.response else {
            return;
        };
        match response {
            Response::SyncResponse(status) => {
                if status {
                    self.broadcast_sync(true);
                }
            }
            Response::Error(err) => {
                // Deprecated wire field; surfaced in the log only.
                warn!(code = err.code, message = %err.message, "gNMI error response");
            }
            Response::Update(mut nf) => {
                self.monitor
                    .inc_notification(nf.update.len() as u64, nf.delete.len() as u64);
                if self.vendor == Vendor::Huawei {
                    strip_module_prefix(&mut nf);
                }
                self.route_notification(nf);
            }
        }
    }

    fn route_notification(&self, nf: Notification) {
        let target = nf
            .prefix
            .as_ref()
            .map(|p| p.target.as_str())
            .unwrap_or_default();

        if !target.is_empty() {
            // The device reflects the subscription target name.
            match self.plugins.get(target) {
                Some(plugin) => plugin.notification(nf),
                None => self.monitor.inc_sr_routing_errors(),
            }
            return;
        }

        // No target: match the first update (then delete) whose full
        // schema path falls under a registered subscription path.
        for update in &nf.update {
            let full_path = full_schema_path(nf.prefix.as_ref(), update.path.as_ref());
            for (schema, plugin) in &self.routes {
                if full_path.starts_with(schema.as_str()) {
                    plugin.notification(nf);
                    return;
                }
            }
        }
        for delete in &nf.delete {
            let full_path = full_schema_path(nf.prefix.as_ref(), Some(delete));
            for (schema, plugin) in &self.routes {
                if full_path.starts_with(schema.as_str()) {
                    plugin.notification(nf);
                    return;
                }
            }
        }
        self.monitor.inc_sr_routing_errors();
    }
}
