//! Monitoraggio del processo server
//!
//! Campiona a intervalli fissi CPU e memoria del processo corrente (via
//! `sysinfo`) e il numero di connessioni WebSocket attive, e li logga.
//! La misura è limitata al processo del server, non alla macchina.

use crate::ws::UserMap;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time;
use tracing::{info, warn};

pub struct MonitorConfig {
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_secs: 120 }
    }
}

/// Avvia il task di monitoraggio in background.
pub fn spawn_monitoring(config: MonitorConfig, users_online: Arc<UserMap>) {
    tokio::spawn(async move {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        let mut interval = time::interval(Duration::from_secs(config.interval_secs));
        interval.tick().await; // primo tick immediato, da scartare

        loop {
            interval.tick().await;
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

            match system.process(pid) {
                Some(process) => {
                    let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
                    info!(
                        cpu_percent = format!("{:.2}", process.cpu_usage()),
                        memory_mb = format!("{:.2}", memory_mb),
                        connected_users = users_online.connected_count(),
                        "Process stats"
                    );
                }
                None => warn!("Server process not found in system table"),
            }
        }
    });
}
