//! End-to-end pipeline tests: notifications routed into a plugin, then
//! scraped through the exporter's text exposition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gnmipulse_client::gnmi::{
    subscribe_response::Response, Notification, Path, PathElem, ScalarArray, SubscribeResponse,
    TypedValue, Update,
};
use gnmipulse_client::{ClientMonitor, Router, Vendor};
use gnmipulse_exporter::{Exporter, ExporterConfig};
use gnmipulse_plugins::{PluginConfig, PluginRegistry};

fn exporter() -> Exporter {
    Exporter::new(ExporterConfig {
        listen_address: "127.0.0.1".to_string(),
        listen_port: 0,
        listen_path: "/metrics".to_string(),
        instance_name: "default".to_string(),
        metric_prefix: "gnmi".to_string(),
        static_labels: vec![],
    })
}

fn plugin_config(cache: bool) -> PluginConfig {
    PluginConfig {
        device_name: "router01".to_string(),
        plugin_name: "oc_interfaces".to_string(),
        custom_label: String::new(),
        desc_sanitize: "[a-zA-Z0-9_:\\-/]".to_string(),
        use_defaults: false,
        cache_data: cache,
        scrape_interval: Duration::from_secs(10),
        options: HashMap::new(),
    }
}

fn elem(spec: &str) -> PathElem {
    match spec.split_once('[') {
        Some((name, keys)) => {
            let (k, v) = keys
                .trim_end_matches(']')
                .split_once('=')
                .expect("key=value");
            PathElem {
                name: name.to_string(),
                key: [(k.to_string(), v.to_string())].into_iter().collect(),
            }
        }
        None => PathElem {
            name: spec.to_string(),
            key: Default::default(),
        },
    }
}

fn path(specs: &[&str]) -> Path {
    Path {
        elem: specs.iter().map(|s| elem(s)).collect(),
        ..Default::default()
    }
}

fn string_update(leaf: &str, value: &str) -> Update {
    Update {
        path: Some(path(&[leaf])),
        val: Some(TypedValue {
            value: Some(gnmipulse_client::gnmi::typed_value::Value::StringVal(
                value.to_string(),
            )),
        }),
        ..Default::default()
    }
}

fn uint_update(leaf: &str, value: u64) -> Update {
    Update {
        path: Some(path(&[leaf])),
        val: Some(TypedValue {
            value: Some(gnmipulse_client::gnmi::typed_value::Value::UintVal(value)),
        }),
        ..Default::default()
    }
}

fn notification(prefix: Path, updates: Vec<Update>) -> SubscribeResponse {
    SubscribeResponse {
        response: Some(Response::Update(Notification {
            prefix: Some(prefix),
            update: updates,
            ..Default::default()
        })),
        ..Default::default()
    }
}

fn delete(prefix_specs: &[&str]) -> SubscribeResponse {
    SubscribeResponse {
        response: Some(Response::Update(Notification {
            delete: vec![path(prefix_specs)],
            ..Default::default()
        })),
        ..Default::default()
    }
}

fn if_state_prefix(name: &str) -> Path {
    path(&[
        "interfaces",
        &format!("interface[name={name}]"),
        "state",
    ])
}

/// Exporter + router + oc_interfaces plugin wired like the core does it.
fn pipeline(cache: bool) -> (Exporter, Router) {
    let exporter = exporter();
    let plugin = PluginRegistry::new()
        .build(plugin_config(cache), &exporter)
        .unwrap();
    let monitor = Arc::new(ClientMonitor::new("router01"));
    exporter
        .register(monitor.clone(), &ClientMonitor::descriptors())
        .unwrap();
    let mut router = Router::new(Vendor::Generic, monitor);
    router.register_plugin("oc_interfaces", plugin).unwrap();
    (exporter, router)
}

#[tokio::test]
async fn test_interface_arrival_renders_gauges() {
    let (exporter, router) = pipeline(true);

    router.route(notification(
        if_state_prefix("eth0"),
        vec![
            string_update("name", "eth0"),
            string_update("admin-status", "UP"),
            string_update("oper-status", "UP"),
            uint_update("ifindex", 7),
            string_update("type", "iana-if-type:ethernetCsmacd"),
            uint_update("mtu", 1500),
            string_update("description", "core link #1"),
        ],
    ));

    let body = exporter.render_scrape().await;

    assert!(body.contains("# TYPE gnmi_plugin_oc_if_gauges gauge"));
    for gauge in ["last_change", "last_clear", "mtu", "lag_speed", "lag_min_links"] {
        assert!(
            body.contains(&format!("metric=\"{gauge}\"")),
            "missing gauge {gauge}"
        );
    }
    assert!(body.contains("kind=\"iface\""));
    assert!(body.contains("name=\"eth0\""));
    assert!(body.contains("admin_status=\"UP\""));
    assert!(body.contains("oper_status=\"UP\""));
    assert!(body.contains("if_type=\"ethernetCsmacd\""));
    // Default sanitization strips the space and '#'.
    assert!(body.contains("description=\"corelink1\""));
    assert!(body.contains("metric=\"mtu\"") && body.contains("} 1500"));

    // Self-monitoring families ride along.
    assert!(body.contains("gnmi_plugin_plugin_formatter_gauges"));
    assert!(body.contains("metric=\"collected_series\""));
    assert!(body.contains("gnmi_plugin_plugin_parser_counters"));
    assert!(body.contains("gnmi_gclient_statistics_counters"));
}

#[tokio::test]
async fn test_counters_then_delete_drop_all_series() {
    let (exporter, router) = pipeline(true);

    router.route(notification(
        if_state_prefix("eth0"),
        vec![string_update("admin-status", "UP")],
    ));
    router.route(notification(
        path(&[
            "interfaces",
            "interface[name=eth0]",
            "state",
            "counters",
        ]),
        vec![uint_update("in-octets", 1000), uint_update("out-octets", 2000)],
    ));

    let body = exporter.render_scrape().await;
    assert!(body.contains("gnmi_plugin_oc_if_counters"));
    assert!(body.contains("metric=\"in-octets\"") && body.contains("} 1000"));
    assert!(body.contains("metric=\"out-octets\"") && body.contains("} 2000"));

    router.route(delete(&["interfaces", "interface[name=eth0]"]));

    let body = exporter.render_scrape().await;
    assert!(
        !body.contains("name=\"eth0\""),
        "deleted interface must not be exposed"
    );
}

#[tokio::test]
async fn test_lag_members_reclassified_and_zeroed() {
    let (exporter, router) = pipeline(true);

    let member_list = TypedValue {
        value: Some(gnmipulse_client::gnmi::typed_value::Value::LeaflistVal(
            ScalarArray {
                element: vec![
                    TypedValue {
                        value: Some(gnmipulse_client::gnmi::typed_value::Value::StringVal(
                            "eth0".to_string(),
                        )),
                    },
                    TypedValue {
                        value: Some(gnmipulse_client::gnmi::typed_value::Value::StringVal(
                            "eth1".to_string(),
                        )),
                    },
                ],
            },
        )),
    };
    router.route(notification(
        path(&[
            "interfaces",
            "interface[name=ae0]",
            "aggregation",
            "state",
        ]),
        vec![
            string_update("lag-type", "LACP"),
            Update {
                path: Some(path(&["member"])),
                val: Some(member_list),
                ..Default::default()
            },
        ],
    ));
    for member in ["eth0", "eth1"] {
        router.route(notification(
            if_state_prefix(member),
            vec![
                string_update("admin-status", "UP"),
                string_update("oper-status", "UP"),
            ],
        ));
        router.route(notification(
            path(&[
                "interfaces",
                &format!("interface[name={member}]"),
                "state",
                "counters",
            ]),
            vec![uint_update("in-octets", 1234)],
        ));
    }
    router.route(notification(
        if_state_prefix("ae0"),
        vec![
            string_update("admin-status", "UP"),
            string_update("oper-status", "UP"),
        ],
    ));

    let body = exporter.render_scrape().await;

    assert!(body.contains("kind=\"iface_lag\""));
    assert!(body.contains("lag_type=\"LACP\""));
    for member in ["eth0", "eth1"] {
        assert!(body.contains(&format!(
            "name=\"ae0\",real_name=\"{member}\""
        )));
    }
    assert!(body.contains("kind=\"iface_lag_member\""));
}

#[tokio::test]
async fn test_passthrough_empty_interval_emits_only_self_monitoring() {
    let (exporter, router) = pipeline(false);

    router.route(notification(
        if_state_prefix("eth0"),
        vec![string_update("admin-status", "UP")],
    ));

    let body = exporter.render_scrape().await;
    assert!(body.contains("name=\"eth0\""));

    // No notifications since the previous scrape: per-entity series
    // disappear, self-monitoring stays.
    let body = exporter.render_scrape().await;
    assert!(!body.contains("name=\"eth0\""));
    assert!(body.contains("metric=\"collected_series\""));
    assert!(body.contains("gnmi_plugin_plugin_parser_counters"));
}
