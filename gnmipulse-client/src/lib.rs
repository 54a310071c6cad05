//! gNMI subscription client for gnmipulse.
//!
//! One [`GnmiClient`] supervises the telemetry session to a single
//! device: dial, capabilities handshake, subscribe, receive loop and
//! reconnect. Received notifications are routed to the plugins
//! registered for the device; per-device health counters are exposed to
//! the exporter as an ordinary metric source.

pub mod client;
pub mod config;
pub mod monitor;
pub mod paths;
pub mod router;
mod subscribe;

// Generated protobuf code, vendored under proto/.
pub mod gnmi_ext {
    tonic::include_proto!("gnmi_ext");
}

pub mod gnmi {
    tonic::include_proto!("gnmi");
}

pub use client::{ClientError, GnmiClient, WorkerState};
pub use config::{ClientConfig, Credentials, ForcedEncoding, SubMode, TlsConfig, Vendor};
pub use monitor::ClientMonitor;
pub use router::{GnmiPlugin, Router};
