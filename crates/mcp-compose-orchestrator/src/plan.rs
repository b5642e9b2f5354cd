//! Reload planning
//!
//! Compares the manifest (desired) with the engine's workload records
//! (current) by config-hash label and sorts every server into exactly one
//! bucket. Planning is pure; [`crate::Compose::reload`] carries it out.

use std::collections::BTreeMap;

use mcp_compose_core::{branding, Manifest, WorkloadRecord};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadPlan {
    /// Declared but not running
    pub start: Vec<String>,
    /// Running but no longer declared
    pub stop: Vec<String>,
    /// Running with a different config hash
    pub recreate: Vec<String>,
    /// Running with the declared config hash
    pub unchanged: Vec<String>,
}

impl ReloadPlan {
    pub fn is_noop(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty() && self.recreate.is_empty()
    }
}

/// Hash of every server the orchestrator runs as a workload. Servers with an
/// explicit `url` live elsewhere and are not part of the plan.
pub fn desired_hashes(manifest: &Manifest) -> BTreeMap<String, String> {
    manifest
        .servers
        .iter()
        .filter(|(_, config)| config.url.is_none())
        .map(|(name, config)| (name.clone(), config.config_hash()))
        .collect()
}

pub fn plan_reload(desired: &BTreeMap<String, String>, current: &[WorkloadRecord]) -> ReloadPlan {
    let mut plan = ReloadPlan::default();

    let mut running: BTreeMap<&str, &WorkloadRecord> = BTreeMap::new();
    for record in current {
        // auxiliary service containers are managed by their own state machines
        if record.labels.contains_key(branding::LABEL_SERVICE) {
            continue;
        }
        let Some(server) = record.server() else { continue };
        if record.status.is_running() {
            running.insert(server, record);
        }
    }

    for (server, hash) in desired {
        match running.get(server.as_str()) {
            None => plan.start.push(server.clone()),
            Some(record) if record.config_hash() == Some(hash.as_str()) => {
                plan.unchanged.push(server.clone())
            }
            Some(_) => plan.recreate.push(server.clone()),
        }
    }

    for server in running.keys() {
        if !desired.contains_key(*server) {
            plan.stop.push(server.to_string());
        }
    }

    plan
}
