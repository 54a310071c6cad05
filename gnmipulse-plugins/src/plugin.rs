//! The plugin runtime: binds a parser, a formatter and a passthrough
//! buffer, and serves both the ingest and the scrape side.

use std::sync::Arc;

use parking_lot::Mutex;

use gnmipulse_client::gnmi::Notification;
use gnmipulse_client::GnmiPlugin;
use gnmipulse_exporter::{Exporter, MetricSource, SampleSink};

use crate::buffer::UBuffer;
use crate::metrics::{formatter_descriptor, formatter_sample};
use crate::{Formatter, FormatterPaths, Parser, PluginConfig, PluginError};

struct State<P, F> {
    parser: P,
    formatter: F,
    buffer: UBuffer,
    on_sync: bool,
}

/// A plugin instance bound to one device.
///
/// In cache mode notifications are parsed on arrival and the model
/// accumulates across scrapes. In passthrough mode notifications wait
/// in the buffer and are parsed into a fresh model at scrape time.
pub struct Plugin<P, F>
where
    P: Parser,
    F: Formatter<Model = P::Model>,
{
    config: PluginConfig,
    paths: FormatterPaths,
    state: Mutex<State<P, F>>,
}

impl<P, F> Plugin<P, F>
where
    P: Parser + 'static,
    F: Formatter<Model = P::Model> + 'static,
{
    /// Builds the plugin and registers its metric families with the
    /// exporter.
    pub fn new(
        config: PluginConfig,
        parser: P,
        formatter: F,
        exporter: &Exporter,
    ) -> Result<Arc<Self>, PluginError> {
        let paths = formatter.paths();

        let mut descriptors = formatter.describe();
        descriptors.push(formatter_descriptor());
        descriptors.extend(parser.describe());

        let buffer = UBuffer::new(config.scrape_interval);
        let plugin = Arc::new(Self {
            config,
            paths,
            state: Mutex::new(State {
                parser,
                formatter,
                buffer,
                on_sync: false,
            }),
        });
        exporter.register(plugin.clone(), &descriptors)?;
        Ok(plugin)
    }
}

impl<P, F> GnmiPlugin for Plugin<P, F>
where
    P: Parser,
    F: Formatter<Model = P::Model>,
{
    fn name(&self) -> &str {
        &self.config.plugin_name
    }

    fn paths_to_subscribe(&self) -> Vec<String> {
        self.paths.xpaths.clone()
    }

    fn data_models(&self) -> Vec<String> {
        self.paths.datamodels.clone()
    }

    /// A true→false edge means the device went away: cached model state
    /// and buffered notifications are no longer trustworthy.
    fn on_sync(&self, status: bool) {
        let mut state = self.state.lock();
        if state.on_sync && !status {
            state.parser.clear_cache();
            state.buffer.clear();
        }
        state.on_sync = status;
    }

    fn notification(&self, nf: Notification) {
        let mut state = self.state.lock();
        if self.config.cache_data {
            state.parser.parse_notification(&nf);
        } else {
            state.buffer.add(nf);
        }
    }
}

impl<P, F> MetricSource for Plugin<P, F>
where
    P: Parser,
    F: Formatter<Model = P::Model>,
{
    fn get_metrics(&self, tx: &SampleSink) {
        let mut state = self.state.lock();

        // Passthrough: parse everything buffered since the last scrape.
        if !self.config.cache_data {
            for nf in state.buffer.checkout() {
                state.parser.parse_notification(&nf);
            }
        }

        let state = &mut *state;
        let mut collected: u64 = 0;
        for sample in state.formatter.collect(state.parser.model()) {
            collected += 1;
            let _ = tx.send(sample);
        }

        let _ = tx.send(formatter_sample(
            &self.config.device_name,
            &self.config.plugin_name,
            "collected_series",
            collected as f64,
        ));

        for sample in state.parser.collect() {
            let _ = tx.send(sample);
        }

        if !self.config.cache_data {
            state.parser.clear_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::parser_descriptor;
    use gnmipulse_exporter::{DescriptorSpec, ExporterConfig, Sample, ValueKind, SRC_PLUGIN};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Counts parsed notifications in a plain vec standing in for a
    /// schema model.
    #[derive(Default)]
    struct CountingParser {
        timestamps: Vec<i64>,
        cleared: usize,
    }

    impl Parser for CountingParser {
        type Model = Vec<i64>;

        fn describe(&self) -> Vec<DescriptorSpec> {
            vec![parser_descriptor()]
        }
        fn collect(&self) -> Vec<Sample> {
            vec![]
        }
        fn parse_notification(&mut self, nf: &Notification) {
            self.timestamps.push(nf.timestamp);
        }
        fn model(&self) -> &Self::Model {
            &self.timestamps
        }
        fn clear_cache(&mut self) {
            self.timestamps.clear();
            self.cleared += 1;
        }
    }

    struct EchoFormatter;

    impl Formatter for EchoFormatter {
        type Model = Vec<i64>;

        fn describe(&self) -> Vec<DescriptorSpec> {
            vec![DescriptorSpec {
                source: SRC_PLUGIN,
                name: "echo",
                help: "echo",
                kind: ValueKind::Gauge,
                label_keys: &[],
            }]
        }
        fn paths(&self) -> FormatterPaths {
            FormatterPaths {
                xpaths: vec!["/interfaces/interface/state".to_string()],
                datamodels: vec!["openconfig-interfaces".to_string()],
            }
        }
        fn collect(&self, model: &Self::Model) -> Vec<Sample> {
            model
                .iter()
                .map(|ts| Sample {
                    source: SRC_PLUGIN,
                    name: "echo",
                    device: "router01".to_string(),
                    kind: ValueKind::Gauge,
                    value: *ts as f64,
                    label_values: vec![],
                })
                .collect()
        }
    }

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

    fn config(cache: bool) -> PluginConfig {
        PluginConfig {
            device_name: "router01".to_string(),
            plugin_name: "echo".to_string(),
            cache_data: cache,
            scrape_interval: Duration::from_secs(10),
            ..PluginConfig::default()
        }
    }

    fn nf(timestamp: i64) -> Notification {
        Notification {
            timestamp,
            ..Default::default()
        }
    }

    fn scrape(plugin: &dyn MetricSource) -> Vec<Sample> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        plugin.get_metrics(&tx);
        drop(tx);
        let mut out = Vec::new();
        while let Ok(s) = rx.try_recv() {
            out.push(s);
        }
        out
    }

    #[test]
    fn test_cache_mode_model_persists_across_scrapes() {
        let plugin = Plugin::new(config(true), CountingParser::default(), EchoFormatter, &exporter())
            .unwrap();
        plugin.notification(nf(1));
        plugin.notification(nf(2));

        let first = scrape(plugin.as_ref());
        let echoes = |samples: &[Sample]| {
            samples
                .iter()
                .filter(|s| s.name == "echo")
                .count()
        };
        assert_eq!(echoes(&first), 2);

        // Nothing new arrived; the cached model still answers.
        let second = scrape(plugin.as_ref());
        assert_eq!(echoes(&second), 2);
    }

    #[test]
    fn test_passthrough_mode_rebuilds_model_each_scrape() {
        let plugin =
            Plugin::new(config(false), CountingParser::default(), EchoFormatter, &exporter())
                .unwrap();
        plugin.notification(nf(3));
        plugin.notification(nf(1));

        let first = scrape(plugin.as_ref());
        let echo_values: Vec<f64> = first
            .iter()
            .filter(|s| s.name == "echo")
            .map(|s| s.value)
            .collect();
        // Parsed in ascending timestamp order.
        assert_eq!(echo_values, vec![1.0, 3.0]);

        // The model was discarded after the scrape.
        let second = scrape(plugin.as_ref());
        assert!(second.iter().all(|s| s.name != "echo"));
    }

    #[test]
    fn test_collected_series_gauge() {
        let plugin = Plugin::new(config(true), CountingParser::default(), EchoFormatter, &exporter())
            .unwrap();
        plugin.notification(nf(1));

        let samples = scrape(plugin.as_ref());
        let collected = samples
            .iter()
            .find(|s| s.name == "plugin_formatter")
            .unwrap();
        assert_eq!(collected.value, 1.0);
        assert_eq!(collected.label_values, vec!["echo", "collected_series"]);
    }

    #[test]
    fn test_sync_loss_invalidates_cached_state() {
        let plugin = Plugin::new(config(true), CountingParser::default(), EchoFormatter, &exporter())
            .unwrap();
        plugin.on_sync(true);
        plugin.notification(nf(1));

        // Disconnection: cached model is flushed.
        plugin.on_sync(false);
        let samples = scrape(plugin.as_ref());
        assert!(samples.iter().all(|s| s.name != "echo"));

        // A fresh false edge without a prior sync does nothing.
        plugin.on_sync(false);
    }

    #[test]
    fn test_plugin_reports_formatter_paths() {
        let plugin = Plugin::new(config(true), CountingParser::default(), EchoFormatter, &exporter())
            .unwrap();
        assert_eq!(plugin.name(), "echo");
        assert_eq!(
            plugin.paths_to_subscribe(),
            vec!["/interfaces/interface/state"]
        );
        assert_eq!(plugin.data_models(), vec!["openconfig-interfaces"]);
    }
}
