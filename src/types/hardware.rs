//! Hardware snapshot types
//!
//! Raw signals captured once per run by a `HardwareProbe`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Graphics adapter vendor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GpuClass {
    #[default]
    Unknown,
    Nvidia,
    Amd,
    Intel,
}

/// Media type of the system disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    #[default]
    Unknown,
    Ssd,
    Hdd,
    None,
}

impl GpuClass {
    /// Classify a display-adapter listing (any case, any vendor wording)
    pub fn classify(listing: &str) -> Self {
        let text = listing.to_lowercase();
        if text.contains("nvidia") {
            GpuClass::Nvidia
        } else if text.contains("amd") || text.contains("radeon") {
            GpuClass::Amd
        } else if text.contains("intel") {
            GpuClass::Intel
        } else {
            GpuClass::Unknown
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, GpuClass::Unknown)
    }
}

impl fmt::Display for GpuClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuClass::Unknown => write!(f, "unknown"),
            GpuClass::Nvidia => write!(f, "nvidia"),
            GpuClass::Amd => write!(f, "amd"),
            GpuClass::Intel => write!(f, "intel"),
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageClass::Unknown => write!(f, "unknown"),
            StorageClass::Ssd => write!(f, "SSD"),
            StorageClass::Hdd => write!(f, "HDD"),
            StorageClass::None => write!(f, "none"),
        }
    }
}

/// Immutable hardware reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSnapshot {
    /// Logical core count, never below 1
    pub cores: u32,

    /// Installed memory in whole gigabytes
    pub ram_gb: u32,

    pub gpu_class: GpuClass,

    pub storage_class: StorageClass,
}

/// Core count used when the probe cannot read one
pub const DEFAULT_CORES: u32 = 4;

/// Memory size used when the probe cannot read one
pub const DEFAULT_RAM_GB: u32 = 8;

impl Default for HardwareSnapshot {
    fn default() -> Self {
        Self {
            cores: DEFAULT_CORES,
            ram_gb: DEFAULT_RAM_GB,
            gpu_class: GpuClass::Unknown,
            storage_class: StorageClass::Unknown,
        }
    }
}

impl HardwareSnapshot {
    /// Create a snapshot; a zero core count is clamped to 1
    pub fn new(cores: u32, ram_gb: u32, gpu_class: GpuClass, storage_class: StorageClass) -> Self {
        Self {
            cores: cores.max(1),
            ram_gb,
            gpu_class,
            storage_class,
        }
    }

    /// One-line summary, e.g. `8C/16GB | GPU: NVIDIA | SSD`
    pub fn summary(&self) -> String {
        format!(
            "{}C/{}GB | GPU: {} | {}",
            self.cores,
            self.ram_gb,
            self.gpu_class.to_string().to_uppercase(),
            self.storage_class
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_classify() {
        assert_eq!(GpuClass::classify("NVIDIA GeForce RTX 3070"), GpuClass::Nvidia);
        assert_eq!(GpuClass::classify("AMD Radeon RX 6800"), GpuClass::Amd);
        assert_eq!(GpuClass::classify("Radeon Pro 560X"), GpuClass::Amd);
        assert_eq!(GpuClass::classify("Intel(R) UHD Graphics 630"), GpuClass::Intel);
        assert_eq!(GpuClass::classify("Microsoft Basic Display Adapter"), GpuClass::Unknown);
        assert_eq!(GpuClass::classify(""), GpuClass::Unknown);
    }

    #[test]
    fn test_snapshot_clamps_cores() {
        let snap = HardwareSnapshot::new(0, 4, GpuClass::Unknown, StorageClass::Hdd);
        assert_eq!(snap.cores, 1);
    }

    #[test]
    fn test_summary() {
        let snap = HardwareSnapshot::new(8, 16, GpuClass::Nvidia, StorageClass::Ssd);
        assert_eq!(snap.summary(), "8C/16GB | GPU: NVIDIA | SSD");
    }
}
