//! Default task catalog
//!
//! The stock tune-up run: eighteen tasks in execution order, the last two
//! aggressive-only. Action ids resolve against `default_action_specs`, which
//! ships per-user cleanup roots where the platform has them and empty
//! command lists for the OS-specific tweaks (filled in through configuration).

use crate::actions::{ActionSpec, CommandMode};
use crate::types::Task;
use std::collections::BTreeMap;

/// Action invoked before the pipeline when a restore point is requested
pub const RESTORE_POINT_ACTION: &str = "create_restore_point";

/// Restore point creation is slow on most systems
pub const RESTORE_POINT_TIMEOUT_SEC: u64 = 45;

/// Optimize step used by network diagnostics
pub const NETWORK_RESET_ACTION: &str = "network_safe_reset";

pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::new("Purge temp and residue files", "Cleanup", "clear_temp"),
        Task::new("Clean browser and shader caches", "Cleanup", "clear_browser_and_shader"),
        Task::new("Clear crash dumps and stale logs", "Cleanup", "clear_dumps_logs"),
        Task::new("Clear recycle bin", "Cleanup", "clear_recycle_bin"),
        Task::new("Purge update download cache", "Cleanup", "clear_update_cache"),
        Task::new("Flush DNS resolver cache", "Network", "flush_dns"),
        Task::new("Reset socket and TCP/IP stack", "Network", "reset_network_stack"),
        Task::new("Apply low-latency TCP tuning", "Network", "apply_network_latency_tweaks"),
        Task::new("Optimize storage behavior (TRIM/defrag)", "Storage", "optimize_storage"),
        Task::new("Apply filesystem performance profile", "Storage", "optimize_filesystem"),
        Task::new("Set high/ultimate power plan", "Performance", "set_power_plan"),
        Task::new("Prioritize game multimedia scheduling", "Performance", "tune_mmcss"),
        Task::new("Enable hardware scheduling and game mode", "Performance", "tune_game_stack"),
        Task::new("Reduce visual/UI overhead", "UI", "tune_visuals"),
        Task::new("Disable telemetry-heavy services", "Services", "trim_services"),
        Task::new("Disable startup delay and menu lag", "UX", "tune_shell_latency"),
        Task::new("Disable Nagle algorithm on active NICs", "Advanced", "disable_nagle").unsafe_only(),
        Task::new("Disable dynamic tick for latency", "Advanced", "boot_latency_profile").unsafe_only(),
    ]
}

/// Keep tasks whose phase matches one of `phases` (case-insensitive).
/// An empty filter keeps everything.
pub fn filter_by_phase(tasks: Vec<Task>, phases: &[String]) -> Vec<Task> {
    if phases.is_empty() {
        return tasks;
    }
    tasks
        .into_iter()
        .filter(|t| phases.iter().any(|p| p.eq_ignore_ascii_case(&t.phase)))
        .collect()
}

/// Built-in definitions for every id the catalog and sessions reference
pub fn default_action_specs() -> BTreeMap<String, ActionSpec> {
    let mut specs = BTreeMap::new();

    let (temp_roots, dump_roots) = default_purge_roots();
    specs.insert(
        "clear_temp".to_string(),
        purge_spec(temp_roots, "Removing temp residue from user paths"),
    );
    specs.insert(
        "clear_dumps_logs".to_string(),
        purge_spec(dump_roots, "Cleaning crash dumps"),
    );

    let command_actions = [
        ("clear_browser_and_shader", "Purging browser code caches and shader cache", CommandMode::All),
        ("clear_recycle_bin", "Emptying recycle bin", CommandMode::All),
        ("clear_update_cache", "Deleting old update payloads", CommandMode::All),
        ("flush_dns", "Flushing DNS resolver", CommandMode::All),
        ("reset_network_stack", "Rebuilding socket and TCP defaults", CommandMode::All),
        ("apply_network_latency_tweaks", "Applying DNS cache and throttling tweaks", CommandMode::All),
        ("optimize_storage", "Running storage optimization pass", CommandMode::All),
        ("optimize_filesystem", "Setting filesystem metadata tuning flags", CommandMode::All),
        ("set_power_plan", "Switching to highest available performance plan", CommandMode::FirstSuccess),
        ("tune_mmcss", "Prioritizing game and real-time workloads", CommandMode::All),
        ("tune_game_stack", "Enabling game mode and hardware scheduling", CommandMode::All),
        ("tune_visuals", "Reducing compositor overhead and animations", CommandMode::All),
        ("trim_services", "Disabling telemetry-oriented services", CommandMode::All),
        ("tune_shell_latency", "Removing UX delay, tips and suggestion noise", CommandMode::All),
        ("disable_nagle", "Disabling Nagle algorithm on NIC interfaces", CommandMode::All),
        ("boot_latency_profile", "Applying boot-level latency profile", CommandMode::All),
        (NETWORK_RESET_ACTION, "Flushing DNS and restoring stack defaults", CommandMode::All),
    ];
    for (id, description, mode) in command_actions {
        specs.insert(id.to_string(), ActionSpec::commands(Vec::new(), mode, description));
    }

    specs.insert(
        RESTORE_POINT_ACTION.to_string(),
        ActionSpec::Commands {
            steps: Vec::new(),
            mode: CommandMode::All,
            description: Some("Rollback protection before deep optimizations".to_string()),
            timeout_sec: Some(RESTORE_POINT_TIMEOUT_SEC),
        },
    );

    specs
}

/// Per-user cleanup roots as (temp, crash dumps).
///
/// Only Windows gives each user a private temp directory. Elsewhere the temp
/// directory is shared with other users and live processes, so both lists
/// stay empty until configured.
fn default_purge_roots() -> (Vec<String>, Vec<String>) {
    if cfg!(windows) {
        (
            vec!["{temp}".to_string()],
            vec!["{local_data}/CrashDumps".to_string()],
        )
    } else {
        (Vec::new(), Vec::new())
    }
}

fn purge_spec(paths: Vec<String>, description: &str) -> ActionSpec {
    ActionSpec::Purge {
        paths,
        suffix: None,
        description: Some(description.to_string()),
        timeout_sec: None,
    }
}
