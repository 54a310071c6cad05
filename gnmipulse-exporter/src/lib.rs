//! Prometheus-facing side of gnmipulse.
//!
//! Metric sources (plugins and client monitors) register their metric
//! descriptors once at startup, then answer scrape-time gather calls by
//! streaming samples into a channel. The exporter validates each sample
//! against its descriptor, renders the Prometheus text exposition format
//! and serves it over HTTP.

pub mod exporter;
pub mod http;
pub mod sample;

pub use exporter::{Exporter, ExporterConfig, ExporterError, MetricSource, SampleSink};
pub use sample::{build_fq_name, DescriptorSpec, Sample, ValueKind, SRC_GCLIENT, SRC_PLUGIN};
