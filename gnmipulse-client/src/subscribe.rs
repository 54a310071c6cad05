//! Builds the subscription list sent on the Subscribe stream.

use crate::config::{ClientConfig, Vendor};
use crate::gnmi;
use crate::paths::string_to_path;
use crate::router::Router;

/// One subscription entry per (plugin, path), all in a single STREAM
/// subscription list.
pub(crate) fn build_subscription_list(
    config: &ClientConfig,
    router: &Router,
    encoding: gnmi::Encoding,
    oversampling: i64,
) -> gnmi::SubscriptionList {
    let sample_interval = config.scrape_interval.as_nanos() as u64 / oversampling as u64;

    let mut subscriptions = Vec::with_capacity(router.subscription_paths().len());
    for (raw_path, data_model) in router.subscription_paths() {
        // Huawei requires the data model name prepended to paths.
        let path_str = if config.vendor == Vendor::Huawei {
            format!("{}:{}", data_model, &raw_path[1..])
        } else {
            raw_path.clone()
        };

        subscriptions.push(gnmi::Subscription {
            path: Some(string_to_path(&path_str)),
            mode: config.mode.to_proto() as i32,
            sample_interval,
            suppress_redundant: false,
            heartbeat_interval: 0,
        });
    }

    gnmi::SubscriptionList {
        prefix: None,
        subscription: subscriptions,
        qos: None,
        mode: gnmi::subscription_list::Mode::Stream as i32,
        allow_aggregation: false,
        use_models: vec![],
        encoding: encoding as i32,
        updates_only: config.updates_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SubMode, TlsConfig};
    use crate::gnmi::Notification;
    use crate::monitor::ClientMonitor;
    use crate::router::GnmiPlugin;
    use std::sync::Arc;
    use std::time::Duration;

    struct PathsOnly {
        paths: Vec<String>,
    }

    impl GnmiPlugin for PathsOnly {
        fn name(&self) -> &str {
            "oc_interfaces"
        }
        fn paths_to_subscribe(&self) -> Vec<String> {
            self.paths.clone()
        }
        fn data_models(&self) -> Vec<String> {
            vec!["openconfig-interfaces".to_string()]
        }
        fn on_sync(&self, _status: bool) {}
        fn notification(&self, _nf: Notification) {}
    }

    fn config(vendor: Vendor) -> ClientConfig {
        ClientConfig {
            device_name: "router01".to_string(),
            address: "192.0.2.1".to_string(),
            port: 9339,
            credentials: None,
            tls: TlsConfig::default(),
            force_encoding: None,
            scrape_interval: Duration::from_secs(10),
            max_life: None,
            mode: SubMode::Sample,
            updates_only: true,
            oversampling: 2,
            vendor,
        }
    }

    fn router_with_paths(vendor: Vendor, paths: &[&str]) -> Router {
        let mut router = Router::new(vendor, Arc::new(ClientMonitor::new("router01")));
        let plugin = Arc::new(PathsOnly {
            paths: paths.iter().map(|p| p.to_string()).collect(),
        });
        router.register_plugin("oc_interfaces", plugin).unwrap();
        router
    }

    #[test]
    fn test_one_subscription_per_path() {
        let config = config(Vendor::Generic);
        let router = router_with_paths(
            Vendor::Generic,
            &[
                "/interfaces/interface/state",
                "/interfaces/interface/aggregation/state",
            ],
        );

        let list = build_subscription_list(&config, &router, gnmi::Encoding::Proto, 2);
        assert_eq!(list.subscription.len(), 2);
        assert_eq!(list.mode, gnmi::subscription_list::Mode::Stream as i32);
        assert!(!list.allow_aggregation);
        assert!(list.updates_only);
        assert_eq!(list.encoding, gnmi::Encoding::Proto as i32);

        // 10s scrape interval oversampled by 2 -> 5s sample interval.
        let sub = &list.subscription[0];
        assert_eq!(sub.sample_interval, 5_000_000_000);
        assert_eq!(sub.mode, gnmi::SubscriptionMode::Sample as i32);
        assert!(!sub.suppress_redundant);
        assert_eq!(sub.heartbeat_interval, 0);
    }

    #[test]
    fn test_huawei_paths_carry_data_model() {
        let config = config(Vendor::Huawei);
        let router = router_with_paths(Vendor::Huawei, &["/interfaces/interface/state"]);

        let list = build_subscription_list(&config, &router, gnmi::Encoding::Json, 1);
        let path = list.subscription[0].path.as_ref().unwrap();
        assert_eq!(path.elem[0].name, "openconfig-interfaces:interfaces");
    }
}
