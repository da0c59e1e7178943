//! System profiler
//!
//! Turns a hardware snapshot plus a free-space reading into a capability
//! tier and an ordered set of focus areas. Pure and deterministic: the same
//! inputs always produce the same `Profile`.

pub mod probe;

pub use probe::{DiskQuery, HardwareProbe, SysinfoProbe};

use crate::types::{HardwareSnapshot, StorageClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse hardware capability class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Essential,
    Balanced,
    Enthusiast,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Essential => write!(f, "Essential"),
            Tier::Balanced => write!(f, "Balanced"),
            Tier::Enthusiast => write!(f, "Enthusiast"),
        }
    }
}

/// Improvement area flagged by the profiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusTag {
    StorageHygiene,
    MemoryPressure,
    CpuScheduling,
    GamingThroughput,
    SystemBalance,
}

impl fmt::Display for FocusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FocusTag::StorageHygiene => "Storage Hygiene",
            FocusTag::MemoryPressure => "Memory Pressure",
            FocusTag::CpuScheduling => "CPU Scheduling",
            FocusTag::GamingThroughput => "Gaming Throughput",
            FocusTag::SystemBalance => "System Balance",
        };
        write!(f, "{}", label)
    }
}

/// Classification result, never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub tier: Tier,
    /// Insertion ordered, never empty, never duplicated
    pub focus: Vec<FocusTag>,
    pub disk_free_gb: u64,
    pub tagline: String,
    /// Weighted score the tier was bucketed from
    pub score: f64,
}

impl Profile {
    /// Focus labels joined for display
    pub fn focus_labels(&self) -> String {
        self.focus
            .iter()
            .map(|tag| tag.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tunable weights and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerSettings {
    pub core_weight: f64,
    pub ram_weight: f64,
    pub ssd_bonus: f64,
    /// Scores at or above this are Enthusiast
    pub enthusiast_threshold: f64,
    /// Scores at or above this (and below enthusiast) are Balanced
    pub balanced_threshold: f64,
    /// Free space strictly below this flags Storage Hygiene
    pub low_disk_gb: u64,
    /// Memory at or below this flags Memory Pressure
    pub low_ram_gb: u32,
    /// Core count at or below this flags CPU Scheduling
    pub low_core_count: u32,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            core_weight: 1.1,
            ram_weight: 0.7,
            ssd_bonus: 8.0,
            enthusiast_threshold: 34.0,
            balanced_threshold: 22.0,
            low_disk_gb: 20,
            low_ram_gb: 8,
            low_core_count: 4,
        }
    }
}

/// Hardware profiler
#[derive(Debug, Clone, Default)]
pub struct SystemProfiler {
    settings: ProfilerSettings,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom weights and thresholds
    pub fn with_settings(mut self, settings: ProfilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ProfilerSettings {
        &self.settings
    }

    /// Weighted capability score
    pub fn tier_score(&self, snapshot: &HardwareSnapshot) -> f64 {
        let bonus = if snapshot.storage_class == StorageClass::Ssd {
            self.settings.ssd_bonus
        } else {
            0.0
        };
        snapshot.cores as f64 * self.settings.core_weight
            + snapshot.ram_gb as f64 * self.settings.ram_weight
            + bonus
    }

    fn tier_for(&self, score: f64) -> Tier {
        if score >= self.settings.enthusiast_threshold {
            Tier::Enthusiast
        } else if score >= self.settings.balanced_threshold {
            Tier::Balanced
        } else {
            Tier::Essential
        }
    }

    fn focus_for(&self, snapshot: &HardwareSnapshot, disk_free_gb: u64) -> Vec<FocusTag> {
        let s = &self.settings;
        let checks = [
            (disk_free_gb < s.low_disk_gb, FocusTag::StorageHygiene),
            (snapshot.ram_gb <= s.low_ram_gb, FocusTag::MemoryPressure),
            (snapshot.cores <= s.low_core_count, FocusTag::CpuScheduling),
            (snapshot.gpu_class.is_known(), FocusTag::GamingThroughput),
        ];

        let mut focus: Vec<FocusTag> = checks
            .iter()
            .filter(|(fires, _)| *fires)
            .map(|(_, tag)| *tag)
            .collect();

        if focus.is_empty() {
            focus.push(FocusTag::SystemBalance);
        }
        focus
    }

    /// Build the profile for one run
    pub fn build_profile(&self, snapshot: &HardwareSnapshot, disk_free_gb: u64) -> Profile {
        let score = self.tier_score(snapshot);
        let tier = self.tier_for(score);
        let focus = self.focus_for(snapshot, disk_free_gb);

        let mut profile = Profile {
            tier,
            focus,
            disk_free_gb,
            tagline: String::new(),
            score,
        };
        profile.tagline = format!(
            "Profile: {} • Focus: {} • Free Disk: {}GB",
            profile.tier,
            profile.focus_labels(),
            disk_free_gb
        );

        tracing::debug!(score, tier = %profile.tier, "Profile built");
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GpuClass;

    fn snap(cores: u32, ram: u32, gpu: GpuClass, storage: StorageClass) -> HardwareSnapshot {
        HardwareSnapshot::new(cores, ram, gpu, storage)
    }

    #[test]
    fn test_tier_buckets() {
        let profiler = SystemProfiler::new();

        // 4*1.1 + 4*0.7 = 7.2
        let low = profiler.build_profile(&snap(4, 4, GpuClass::Unknown, StorageClass::Hdd), 100);
        assert_eq!(low.tier, Tier::Essential);

        // 8*1.1 + 16*0.7 + 8 = 28.0
        let mid = profiler.build_profile(&snap(8, 16, GpuClass::Unknown, StorageClass::Ssd), 100);
        assert_eq!(mid.tier, Tier::Balanced);

        // 16*1.1 + 32*0.7 = 40.0
        let high = profiler.build_profile(&snap(16, 32, GpuClass::Nvidia, StorageClass::Hdd), 100);
        assert_eq!(high.tier, Tier::Enthusiast);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let settings = ProfilerSettings {
            core_weight: 1.0,
            ram_weight: 0.0,
            ssd_bonus: 0.0,
            enthusiast_threshold: 12.0,
            balanced_threshold: 6.0,
            ..Default::default()
        };
        let profiler = SystemProfiler::new().with_settings(settings);
        let at_balanced = snap(6, 0, GpuClass::Unknown, StorageClass::Hdd);
        let at_enthusiast = snap(12, 0, GpuClass::Unknown, StorageClass::Hdd);
        assert_eq!(profiler.build_profile(&at_balanced, 50).tier, Tier::Balanced);
        assert_eq!(profiler.build_profile(&at_enthusiast, 50).tier, Tier::Enthusiast);
    }

    #[test]
    fn test_focus_priority_order() {
        let profiler = SystemProfiler::new();
        let profile = profiler.build_profile(&snap(4, 8, GpuClass::Amd, StorageClass::Hdd), 10);
        assert_eq!(
            profile.focus,
            vec![
                FocusTag::StorageHygiene,
                FocusTag::MemoryPressure,
                FocusTag::CpuScheduling,
                FocusTag::GamingThroughput,
            ]
        );
    }

    #[test]
    fn test_focus_fallback() {
        let profiler = SystemProfiler::new();
        let profile = profiler.build_profile(&snap(12, 32, GpuClass::Unknown, StorageClass::Ssd), 200);
        assert_eq!(profile.focus, vec![FocusTag::SystemBalance]);
    }

    #[test]
    fn test_focus_never_duplicates() {
        let profiler = SystemProfiler::new();
        for cores in [1, 4, 8, 16] {
            for ram in [2, 8, 16, 64] {
                for disk in [0, 19, 20, 500] {
                    let profile =
                        profiler.build_profile(&snap(cores, ram, GpuClass::Intel, StorageClass::Ssd), disk);
                    let mut seen = profile.focus.clone();
                    seen.dedup();
                    assert_eq!(seen.len(), profile.focus.len());
                    assert!(!profile.focus.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_golden_taglines() {
        let profiler = SystemProfiler::new();

        let profile = profiler.build_profile(&snap(8, 16, GpuClass::Nvidia, StorageClass::Ssd), 120);
        assert_eq!(
            profile.tagline,
            "Profile: Balanced • Focus: Gaming Throughput • Free Disk: 120GB"
        );

        let profile = profiler.build_profile(&snap(2, 4, GpuClass::Unknown, StorageClass::Hdd), 15);
        assert_eq!(
            profile.tagline,
            "Profile: Essential • Focus: Storage Hygiene, Memory Pressure, CPU Scheduling • Free Disk: 15GB"
        );

        let profile = profiler.build_profile(&snap(16, 64, GpuClass::Unknown, StorageClass::Ssd), 900);
        assert_eq!(
            profile.tagline,
            "Profile: Enthusiast • Focus: System Balance • Free Disk: 900GB"
        );
    }

    #[test]
    fn test_build_profile_is_pure() {
        let profiler = SystemProfiler::new();
        let input = snap(6, 12, GpuClass::Intel, StorageClass::Ssd);
        let first = profiler.build_profile(&input, 42);
        for _ in 0..10 {
            assert_eq!(profiler.build_profile(&input, 42), first);
        }
    }
}
