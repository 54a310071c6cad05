//! Core assembler: builds the exporter, the device workers and their
//! plugins from the resolved configuration, and runs until shutdown.

use thiserror::Error;
use tracing::{error, info};

use gnmipulse_client::{ClientError, GnmiClient};
use gnmipulse_exporter::{Exporter, ExporterError};
use gnmipulse_plugins::{PluginError, PluginRegistry};

use crate::config::ResolvedConfig;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Exporter(#[from] ExporterError),
}

impl CoreError {
    /// Process exit code: 2 for construction failures, 3 for runtime
    /// failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            CoreError::Exporter(ExporterError::Bind { .. }) => 3,
            _ => 2,
        }
    }
}

pub struct Core {
    config: ResolvedConfig,
}

impl Core {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    /// Builds every component, starts the exporter and the device
    /// workers, then blocks until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), CoreError> {
        let exporter = Exporter::new(self.config.exporter);
        let registry = PluginRegistry::new();

        // Construction: all registrations must land before the exporter
        // starts serving scrapes.
        let mut clients = Vec::with_capacity(self.config.devices.len());
        let mut plugin_count = 0usize;
        for device in self.config.devices {
            let client = GnmiClient::new(device.client, &exporter)?;
            for plugin_config in device.plugins {
                let plugin_name = plugin_config.plugin_name.clone();
                let plugin = registry.build(plugin_config, &exporter)?;
                client.register_plugin(&plugin_name, plugin)?;
                plugin_count += 1;
            }
            clients.push(client);
        }
        info!(
            devices = clients.len(),
            plugins = plugin_count,
            "gNMI clients loaded"
        );

        // Start serving
        exporter.start().await?;
        for client in &mut clients {
            client.start();
        }

        shutdown_signal().await;

        // Stop the exporter first, then unload the devices.
        exporter.close();
        for client in &mut clients {
            client.close().await;
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("received SIGTERM, shutting down...");
        }
    }
}
