//! System statistics via `sysinfo`
//!
//! Sampling blocks (CPU usage needs two readings a short interval apart), so
//! every collection runs on the blocking pool against one shared `System`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use sysinfo::{Disks, Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use warden_core::{Error, Result};

/// Filesystems that are never worth reporting
const PSEUDO_FILESYSTEMS: &[&str] = &["squashfs", "tmpfs", "devtmpfs"];

#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub platform: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub kernel_arch: String,
    pub uptime: u64,
    pub uptime_human: String,
    pub boot_time: u64,
    pub procs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub cores: usize,
    pub model_name: String,
    pub mhz: u64,
    pub usage_total: f32,
    pub usage_per_cpu: Vec<f32>,
    pub load_avg_1: f64,
    pub load_avg_5: f64,
    pub load_avg_15: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub used_percent: f64,
    pub free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskPartition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskInfo {
    pub partitions: Vec<DiskPartition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac_address: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllMetrics {
    pub timestamp: DateTime<Utc>,
    pub host: HostInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub disk: DiskInfo,
    pub network: NetworkInfo,
}

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    system: Arc<Mutex<System>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    pub async fn host(&self) -> Result<HostInfo> {
        self.blocking(|sys| {
            sys.refresh_processes();
            host_info(sys)
        })
        .await
    }

    pub async fn cpu(&self) -> Result<CpuInfo> {
        self.blocking(cpu_info).await
    }

    pub async fn memory(&self) -> Result<MemoryInfo> {
        self.blocking(memory_info).await
    }

    pub async fn disk(&self) -> Result<DiskInfo> {
        tokio::task::spawn_blocking(disk_info)
            .await
            .map_err(|e| Error::internal(format!("disk collection panicked: {e}")))
    }

    pub async fn network(&self) -> Result<NetworkInfo> {
        tokio::task::spawn_blocking(network_info)
            .await
            .map_err(|e| Error::internal(format!("network collection panicked: {e}")))
    }

    pub async fn all(&self) -> Result<AllMetrics> {
        let (host, cpu, memory) = self
            .blocking(|sys| {
                sys.refresh_processes();
                (host_info(sys), cpu_info(sys), memory_info(sys))
            })
            .await?;

        Ok(AllMetrics {
            timestamp: Utc::now(),
            host,
            cpu,
            memory,
            disk: self.disk().await?,
            network: self.network().await?,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut System) -> T + Send + 'static,
    {
        let system = Arc::clone(&self.system);
        tokio::task::spawn_blocking(move || f(&mut system.lock()))
            .await
            .map_err(|e| Error::internal(format!("metrics collection panicked: {e}")))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn host_info(sys: &System) -> HostInfo {
    let uptime = System::uptime();
    HostInfo {
        hostname: System::host_name().unwrap_or_default(),
        os: std::env::consts::OS.to_string(),
        platform: System::distribution_id(),
        platform_version: System::os_version().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        kernel_arch: std::env::consts::ARCH.to_string(),
        uptime,
        uptime_human: format_uptime(uptime),
        boot_time: System::boot_time(),
        procs: sys.processes().len(),
    }
}

fn cpu_info(sys: &mut System) -> CpuInfo {
    sys.refresh_cpu();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();

    let load = System::load_average();
    let cpus = sys.cpus();
    CpuInfo {
        cores: cpus.len(),
        model_name: cpus.first().map(|c| c.brand().to_string()).unwrap_or_default(),
        mhz: cpus.first().map(sysinfo::Cpu::frequency).unwrap_or_default(),
        usage_total: sys.global_cpu_info().cpu_usage(),
        usage_per_cpu: cpus.iter().map(sysinfo::Cpu::cpu_usage).collect(),
        load_avg_1: load.one,
        load_avg_5: load.five,
        load_avg_15: load.fifteen,
    }
}

fn memory_info(sys: &mut System) -> MemoryInfo {
    sys.refresh_memory();
    MemoryInfo {
        total: sys.total_memory(),
        available: sys.available_memory(),
        used: sys.used_memory(),
        used_percent: percent(sys.used_memory(), sys.total_memory()),
        free: sys.free_memory(),
        swap_total: sys.total_swap(),
        swap_used: sys.used_swap(),
        swap_free: sys.free_swap(),
        swap_percent: percent(sys.used_swap(), sys.total_swap()),
    }
}

fn disk_info() -> DiskInfo {
    let disks = Disks::new_with_refreshed_list();
    let partitions = disks
        .list()
        .iter()
        .filter_map(|disk| {
            let fstype = disk.file_system().to_string_lossy().into_owned();
            if PSEUDO_FILESYSTEMS.contains(&fstype.as_str()) {
                return None;
            }
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            Some(DiskPartition {
                device: disk.name().to_string_lossy().into_owned(),
                mountpoint: disk.mount_point().display().to_string(),
                fstype,
                total,
                used,
                free,
                used_percent: percent(used, total),
            })
        })
        .collect();
    DiskInfo { partitions }
}

fn network_info() -> NetworkInfo {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<NetworkInterface> = networks
        .iter()
        .filter(|(name, _)| name.as_str() != "lo")
        .map(|(name, data)| NetworkInterface {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
            bytes_sent: data.total_transmitted(),
            bytes_recv: data.total_received(),
            packets_sent: data.total_packets_transmitted(),
            packets_recv: data.total_packets_received(),
            errin: data.total_errors_on_received(),
            errout: data.total_errors_on_transmitted(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    NetworkInfo { interfaces }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// `3d 4h 5m`, `4h 5m`, or `5m`
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
