//! Per-device health counters, exposed to the exporter as an ordinary
//! metric source.

use parking_lot::Mutex;

use gnmipulse_exporter::{DescriptorSpec, MetricSource, Sample, SampleSink, ValueKind, SRC_GCLIENT};

/// Capacity of the receive channel between the stream reader and the
/// routing loop.
pub const SR_BUFFER_SIZE: usize = 128;

const METRIC_NAME: &str = "statistics";
const METRIC_HELP: &str = "Gnmi client statistics";
const LABEL_KEYS: &[&str] = &["metric"];

#[derive(Debug, Default)]
struct Counters {
    notifications: u64,
    updates: u64,
    deletes: u64,
    dial_errors: u64,
    capabilities_errors: u64,
    subscribe_errors: u64,
    disconnections: u64,
    sr_routing_errors: u64,
}

impl Counters {
    fn samples(&self) -> [(&'static str, u64); 8] {
        [
            ("gnmi_notifications", self.notifications),
            ("gnmi_updates", self.updates),
            ("gnmi_deletes", self.deletes),
            ("dial_errors", self.dial_errors),
            ("capabilities_errors", self.capabilities_errors),
            ("subscribe_errors", self.subscribe_errors),
            ("disconnections", self.disconnections),
            ("sr_routing_errors", self.sr_routing_errors),
        ]
    }
}

#[derive(Debug, Default)]
struct State {
    counters: Counters,
    /// Peak percent fullness of the receive channel since the last
    /// scrape.
    nf_buf_usage_pc: u64,
}

/// Health counters and gauges of one device worker.
#[derive(Debug)]
pub struct ClientMonitor {
    device_name: String,
    state: Mutex<State>,
}

impl ClientMonitor {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Descriptors for the two statistics families.
    pub fn descriptors() -> Vec<DescriptorSpec> {
        vec![
            DescriptorSpec {
                source: SRC_GCLIENT,
                name: METRIC_NAME,
                help: METRIC_HELP,
                kind: ValueKind::Counter,
                label_keys: LABEL_KEYS,
            },
            DescriptorSpec {
                source: SRC_GCLIENT,
                name: METRIC_NAME,
                help: METRIC_HELP,
                kind: ValueKind::Gauge,
                label_keys: LABEL_KEYS,
            },
        ]
    }

    pub fn inc_notification(&self, updates: u64, deletes: u64) {
        let mut state = self.state.lock();
        state.counters.notifications += 1;
        state.counters.updates += updates;
        state.counters.deletes += deletes;
    }

    pub fn inc_dial_errors(&self) {
        self.state.lock().counters.dial_errors += 1;
    }

    pub fn inc_capabilities_errors(&self) {
        self.state.lock().counters.capabilities_errors += 1;
    }

    pub fn inc_subscribe_errors(&self) {
        self.state.lock().counters.subscribe_errors += 1;
    }

    pub fn inc_disconnections(&self) {
        self.state.lock().counters.disconnections += 1;
    }

    pub fn inc_sr_routing_errors(&self) {
        self.state.lock().counters.sr_routing_errors += 1;
    }

    /// Records the receive channel depth; only the peak since the last
    /// scrape is kept.
    pub fn observe_buf_len(&self, len: usize) {
        let pc = (len * 100 / SR_BUFFER_SIZE) as u64;
        let mut state = self.state.lock();
        if pc > state.nf_buf_usage_pc {
            state.nf_buf_usage_pc = pc;
        }
    }

    fn sample(&self, kind: ValueKind, metric: &'static str, value: u64) -> Sample {
        Sample {
            source: SRC_GCLIENT,
            name: METRIC_NAME,
            device: self.device_name.clone(),
            kind,
            value: value as f64,
            label_values: vec![metric.to_string()],
        }
    }
}

impl MetricSource for ClientMonitor {
    fn get_metrics(&self, tx: &SampleSink) {
        let mut state = self.state.lock();
        for (metric, value) in state.counters.samples() {
            let _ = tx.send(self.sample(ValueKind::Counter, metric, value));
        }
        let _ = tx.send(self.sample(
            ValueKind::Gauge,
            "notification_buf_usage_pc",
            state.nf_buf_usage_pc,
        ));
        // The usage gauge is a per-scrape peak.
        state.nf_buf_usage_pc = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(monitor: &ClientMonitor) -> Vec<Sample> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.get_metrics(&tx);
        drop(tx);
        let mut out = Vec::new();
        while let Ok(s) = rx.try_recv() {
            out.push(s);
        }
        out
    }

    fn value_of(samples: &[Sample], metric: &str) -> f64 {
        samples
            .iter()
            .find(|s| s.label_values[0] == metric)
            .map(|s| s.value)
            .unwrap()
    }

    #[test]
    fn test_counters_accumulate() {
        let monitor = ClientMonitor::new("router01");
        monitor.inc_notification(3, 1);
        monitor.inc_notification(2, 0);
        monitor.inc_dial_errors();
        monitor.inc_sr_routing_errors();

        let samples = drain(&monitor);
        assert_eq!(samples.len(), 9);
        assert_eq!(value_of(&samples, "gnmi_notifications"), 2.0);
        assert_eq!(value_of(&samples, "gnmi_updates"), 5.0);
        assert_eq!(value_of(&samples, "gnmi_deletes"), 1.0);
        assert_eq!(value_of(&samples, "dial_errors"), 1.0);
        assert_eq!(value_of(&samples, "sr_routing_errors"), 1.0);
        assert!(samples.iter().all(|s| s.device == "router01"));
    }

    #[test]
    fn test_buf_usage_tracks_peak_and_resets_on_scrape() {
        let monitor = ClientMonitor::new("router01");
        monitor.observe_buf_len(64);
        monitor.observe_buf_len(32);

        let samples = drain(&monitor);
        assert_eq!(value_of(&samples, "notification_buf_usage_pc"), 50.0);

        // Reset after the scrape.
        let samples = drain(&monitor);
        assert_eq!(value_of(&samples, "notification_buf_usage_pc"), 0.0);
    }
}
