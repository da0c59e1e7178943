//! Hardware and disk probes
//!
//! The profiler only consumes snapshots; these traits are the seam where a
//! platform reader (or a test double) plugs in.

use crate::errors::Result;
use crate::types::hardware::DEFAULT_RAM_GB;
use crate::types::{GpuClass, HardwareSnapshot, StorageClass};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{DiskKind, Disks, System};
use tokio::process::Command;
use tokio::time::timeout;

/// Bound on the display-adapter listing command
const GPU_QUERY_TIMEOUT: Duration = Duration::from_secs(8);

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Source of hardware snapshots
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    /// Capture the snapshot for this run. An error here is fatal to the run.
    async fn snapshot(&self) -> Result<HardwareSnapshot>;
}

/// Free-space reader; failures read as 0
pub trait DiskQuery: Send + Sync {
    fn free_gb(&self, path: &Path) -> u64;
}

/// Default probe backed by `sysinfo` and the platform adapter listing
#[derive(Debug, Clone)]
pub struct SysinfoProbe {
    system_path: PathBuf,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new(default_system_path())
    }
}

impl SysinfoProbe {
    /// Probe whose storage class and free space come from the disk holding `system_path`
    pub fn new(system_path: impl Into<PathBuf>) -> Self {
        Self {
            system_path: system_path.into(),
        }
    }

    pub fn system_path(&self) -> &Path {
        &self.system_path
    }

    fn read_ram_gb() -> u32 {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return DEFAULT_RAM_GB;
        }
        // Round to the nearest GB so 15.9 GiB of usable memory reads as 16
        ((total as f64 / BYTES_PER_GB as f64).round() as u32).max(1)
    }

    fn read_storage_class(&self) -> StorageClass {
        let disks = Disks::new_with_refreshed_list();
        if disks.list().is_empty() {
            return StorageClass::None;
        }
        match disk_for_path(&disks, &self.system_path).map(|disk| disk.kind()) {
            Some(DiskKind::SSD) => StorageClass::Ssd,
            Some(DiskKind::HDD) => StorageClass::Hdd,
            _ => StorageClass::Unknown,
        }
    }

    async fn read_gpu_class() -> GpuClass {
        let Some((program, args)) = gpu_listing_command() else {
            return GpuClass::Unknown;
        };

        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        match timeout(GPU_QUERY_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => GpuClass::classify(&String::from_utf8_lossy(&output.stdout)),
            Ok(Err(e)) => {
                tracing::debug!("Adapter listing unavailable: {}", e);
                GpuClass::Unknown
            }
            Err(_) => {
                tracing::debug!("Adapter listing timed out after {:?}", GPU_QUERY_TIMEOUT);
                GpuClass::Unknown
            }
        }
    }
}

#[async_trait]
impl HardwareProbe for SysinfoProbe {
    async fn snapshot(&self) -> Result<HardwareSnapshot> {
        let cores = num_cpus::get() as u32;
        let ram_gb = Self::read_ram_gb();
        let storage_class = self.read_storage_class();
        let gpu_class = Self::read_gpu_class().await;

        let snapshot = HardwareSnapshot::new(cores, ram_gb, gpu_class, storage_class);
        tracing::info!(summary = %snapshot.summary(), "Hardware snapshot captured");
        Ok(snapshot)
    }
}

impl DiskQuery for SysinfoProbe {
    fn free_gb(&self, path: &Path) -> u64 {
        let disks = Disks::new_with_refreshed_list();
        disk_for_path(&disks, path)
            .map(|disk| disk.available_space() / BYTES_PER_GB)
            .unwrap_or(0)
    }
}

/// Disk whose mount point is the longest prefix of `path`
fn disk_for_path<'a>(disks: &'a Disks, path: &Path) -> Option<&'a sysinfo::Disk> {
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
}

/// Root of the system volume
pub fn default_system_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

fn gpu_listing_command() -> Option<(&'static str, &'static [&'static str])> {
    if cfg!(target_os = "windows") {
        Some(("wmic", &["path", "win32_VideoController", "get", "name"]))
    } else if cfg!(target_os = "linux") {
        Some(("lspci", &[]))
    } else if cfg!(target_os = "macos") {
        Some(("system_profiler", &["SPDisplaysDataType"]))
    } else {
        None
    }
}
