//! Metric sample and descriptor types shared by all metric sources.

use thiserror::Error;

/// Source tag carried by plugin-emitted metric families.
pub const SRC_PLUGIN: &str = "plugin";
/// Source tag carried by the gNMI client monitor families.
pub const SRC_GCLIENT: &str = "gclient";

/// Prometheus value type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Counter,
    Gauge,
    Untyped,
}

impl ValueKind {
    /// Family name suffix appended to the fully qualified metric name.
    pub fn suffix(self) -> &'static str {
        match self {
            ValueKind::Counter => "_counters",
            ValueKind::Gauge => "_gauges",
            ValueKind::Untyped => "",
        }
    }

    /// Type keyword used in the `# TYPE` exposition line.
    pub fn exposition_type(self) -> &'static str {
        match self {
            ValueKind::Counter => "counter",
            ValueKind::Gauge => "gauge",
            ValueKind::Untyped => "untyped",
        }
    }
}

/// Errors raised while validating samples and descriptor specs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("metric source tag is required")]
    MissingSource,
    #[error("metric name is required")]
    MissingName,
    #[error("device name is required")]
    MissingDevice,
    #[error("help text is required for {0}")]
    MissingHelp(String),
}

/// A metric family descriptor, provided by a source at registration time.
///
/// `label_keys` lists the source-specific label keys in emission order;
/// the exporter prepends `instance_name` and `device` when building the
/// full descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorSpec {
    pub source: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub kind: ValueKind,
    pub label_keys: &'static [&'static str],
}

impl DescriptorSpec {
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.source.is_empty() {
            return Err(SampleError::MissingSource);
        }
        if self.name.is_empty() {
            return Err(SampleError::MissingName);
        }
        if self.help.is_empty() {
            return Err(SampleError::MissingHelp(self.name.to_string()));
        }
        Ok(())
    }

    /// Fully qualified family name under the given metric prefix.
    pub fn fq_name(&self, prefix: &str) -> String {
        build_fq_name(prefix, self.source, self.name, self.kind)
    }
}

/// One metric sample streamed by a source during a scrape.
///
/// `label_values` must match the order of the source-specific
/// `label_keys` declared by the matching [`DescriptorSpec`].
#[derive(Debug, Clone)]
pub struct Sample {
    pub source: &'static str,
    pub name: &'static str,
    pub device: String,
    pub kind: ValueKind,
    pub value: f64,
    pub label_values: Vec<String>,
}

impl Sample {
    /// Checks the common fields every sample must carry.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.source.is_empty() {
            return Err(SampleError::MissingSource);
        }
        if self.name.is_empty() {
            return Err(SampleError::MissingName);
        }
        if self.device.is_empty() {
            return Err(SampleError::MissingDevice);
        }
        Ok(())
    }

    /// Fully qualified family name under the given metric prefix.
    pub fn fq_name(&self, prefix: &str) -> String {
        build_fq_name(prefix, self.source, self.name, self.kind)
    }
}

/// Builds `<prefix>_<source>_<name>` plus the value-type suffix.
/// An empty prefix is legal and simply omitted.
pub fn build_fq_name(prefix: &str, source: &str, name: &str, kind: ValueKind) -> String {
    let mut fq = String::with_capacity(prefix.len() + source.len() + name.len() + 12);
    if !prefix.is_empty() {
        fq.push_str(prefix);
        fq.push('_');
    }
    fq.push_str(source);
    fq.push('_');
    fq.push_str(name);
    fq.push_str(kind.suffix());
    fq
}
