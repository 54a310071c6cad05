//! Metric source registry and scrape engine.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use crate::http;
use crate::sample::{DescriptorSpec, Sample, SampleError};

/// Channel end handed to metric sources during a scrape.
pub type SampleSink = mpsc::UnboundedSender<Sample>;

/// A provider of metric samples. Implemented by plugins and client
/// monitors; called once per scrape from a blocking task.
pub trait MetricSource: Send + Sync {
    fn get_metrics(&self, tx: &SampleSink);
}

/// Exporter configuration, resolved from the `global` config section.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub listen_path: String,
    pub instance_name: String,
    pub metric_prefix: String,
    /// Extra constant labels appended to every series.
    pub static_labels: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("no metric descriptors provided")]
    NoMetrics,
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error("descriptor {0} already registered with a different label schema or help text")]
    DescriptorMismatch(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

struct Descriptor {
    help: String,
    /// Full label key list: `instance_name`, `device`, then the
    /// source-specific keys in declaration order.
    label_keys: Vec<String>,
}

struct Inner {
    config: ExporterConfig,
    descriptors: RwLock<HashMap<String, Descriptor>>,
    sources: RwLock<Vec<Arc<dyn MetricSource>>>,
    /// Serializes concurrent scrape requests.
    scrape_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// The Prometheus exporter. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Exporter {
    inner: Arc<Inner>,
}

impl Exporter {
    pub fn new(config: ExporterConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                descriptors: RwLock::new(HashMap::new()),
                sources: RwLock::new(Vec::new()),
                scrape_lock: Mutex::new(()),
                shutdown_tx,
            }),
        }
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.inner.config
    }

    /// Registers a metric source together with the descriptors of every
    /// family it emits. Must be called before [`Exporter::start`].
    ///
    /// A family already registered by another source is accepted only if
    /// help text and label schema match exactly (the self-monitoring
    /// case); anything else is a startup failure.
    pub fn register(
        &self,
        source: Arc<dyn MetricSource>,
        specs: &[DescriptorSpec],
    ) -> Result<(), ExporterError> {
        if specs.is_empty() {
            return Err(ExporterError::NoMetrics);
        }

        let mut descriptors = self.inner.descriptors.write();
        for spec in specs {
            spec.validate()?;
            let fq_name = spec.fq_name(&self.inner.config.metric_prefix);
            let mut label_keys = vec!["instance_name".to_string(), "device".to_string()];
            label_keys.extend(spec.label_keys.iter().map(|k| k.to_string()));

            match descriptors.get(&fq_name) {
                Some(existing) => {
                    if existing.help != spec.help || existing.label_keys != label_keys {
                        return Err(ExporterError::DescriptorMismatch(fq_name));
                    }
                }
                None => {
                    descriptors.insert(
                        fq_name,
                        Descriptor {
                            help: spec.help.to_string(),
                            label_keys,
                        },
                    );
                }
            }
        }
        drop(descriptors);

        self.inner.sources.write().push(source);
        Ok(())
    }

    /// Binds the HTTP listener and starts serving scrapes. Non-blocking:
    /// the server runs on a spawned task until [`Exporter::close`].
    pub async fn start(&self) -> Result<(), ExporterError> {
        let addr = format!(
            "{}:{}",
            self.inner.config.listen_address, self.inner.config.listen_port
        );
        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|source| ExporterError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
        info!(addr = %addr, path = %self.inner.config.listen_path, "metrics endpoint listening");

        let router = http::create_router(self.clone(), &self.inner.config.listen_path);
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    loop {
                        if shutdown.changed().await.is_err() {
                            break;
                        }
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "metrics HTTP server terminated");
            }
        });
        Ok(())
    }

    /// Stops the HTTP server and detaches all metric sources. Idempotent.
    pub fn close(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        self.inner.sources.write().clear();
    }

    /// Runs one scrape: fans out to every registered source in parallel,
    /// validates the incoming samples and renders the text exposition.
    /// Concurrent scrapes are serialized.
    pub async fn render_scrape(&self) -> String {
        let _guard = self.inner.scrape_lock.lock().await;

        let sources: Vec<Arc<dyn MetricSource>> = self.inner.sources.read().clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<Sample>();
        let mut gatherers = Vec::with_capacity(sources.len());
        for source in sources {
            let tx = tx.clone();
            gatherers.push(tokio::task::spawn_blocking(move || source.get_metrics(&tx)));
        }
        drop(tx);

        // Family name -> rendered series (full label values, value).
        let mut families: BTreeMap<String, Vec<(Vec<String>, f64)>> = BTreeMap::new();
        while let Some(sample) = rx.recv().await {
            if let Err(e) = sample.validate() {
                warn!(error = %e, "dropping malformed sample");
                continue;
            }
            let fq_name = sample.fq_name(&self.inner.config.metric_prefix);
            {
                let descriptors = self.inner.descriptors.read();
                let Some(desc) = descriptors.get(&fq_name) else {
                    warn!(metric = %fq_name, "dropping sample without a registered descriptor");
                    continue;
                };
                if desc.label_keys.len() != sample.label_values.len() + 2 {
                    warn!(metric = %fq_name, "dropping sample with mismatched label cardinality");
                    continue;
                }
            }
            let mut values =
                Vec::with_capacity(sample.label_values.len() + 2);
            values.push(self.inner.config.instance_name.clone());
            values.push(sample.device.clone());
            values.extend(sample.label_values);
            families.entry(fq_name).or_default().push((values, sample.value));
        }
        for gatherer in gatherers {
            let _ = gatherer.await;
        }

        self.render(&families)
    }

    fn render(&self, families: &BTreeMap<String, Vec<(Vec<String>, f64)>>) -> String {
        let descriptors = self.inner.descriptors.read();
        let mut out = String::with_capacity(families.len() * 256);

        for (fq_name, series) in families {
            let Some(desc) = descriptors.get(fq_name) else {
                continue;
            };
            let kind = kind_from_fq_name(fq_name);
            let _ = writeln!(out, "# HELP {} {}", fq_name, escape_help(&desc.help));
            let _ = writeln!(out, "# TYPE {} {}", fq_name, kind);
            for (values, value) in series {
                let _ = writeln!(
                    out,
                    "{}{} {}",
                    fq_name,
                    self.format_labels(&desc.label_keys, values),
                    format_value(*value)
                );
            }
        }
        out
    }

    fn format_labels(&self, keys: &[String], values: &[String]) -> String {
        let static_labels = &self.inner.config.static_labels;
        let mut parts = Vec::with_capacity(keys.len() + static_labels.len());
        for (key, value) in keys.iter().zip(values.iter()) {
            parts.push(format!("{}=\"{}\"", key, escape_label_value(value)));
        }
        for (key, value) in static_labels {
            parts.push(format!("{}=\"{}\"", key, escape_label_value(value)));
        }
        format!("{{{}}}", parts.join(","))
    }
}

/// The value type is encoded in the family name suffix, so rendering
/// does not need to carry it separately per series.
fn kind_from_fq_name(fq_name: &str) -> &'static str {
    if fq_name.ends_with("_counters") {
        "counter"
    } else if fq_name.ends_with("_gauges") {
        "gauge"
    } else {
        "untyped"
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape special characters in help text.
fn escape_help(help: &str) -> String {
    let mut result = String::with_capacity(help.len());
    for c in help.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
