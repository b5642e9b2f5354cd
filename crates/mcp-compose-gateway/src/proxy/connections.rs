//! Per-server request accounting for `/api/connections`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConnections {
    pub total_requests: u64,
    pub errors: u64,
    pub last_request: Option<DateTime<Utc>>,
    pub clients: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub active_clients: usize,
    pub servers: BTreeMap<String, ServerConnections>,
}

#[derive(Default)]
pub struct ConnectionTracker {
    servers: DashMap<String, ServerConnections>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, server: &str, client: &str, ok: bool) {
        let mut entry = self.servers.entry(server.to_string()).or_default();
        entry.total_requests += 1;
        if !ok {
            entry.errors += 1;
        }
        entry.last_request = Some(Utc::now());
        entry.clients.insert(client.to_string());
    }

    pub fn snapshot(&self) -> ConnectionsSnapshot {
        let servers: BTreeMap<String, ServerConnections> = self
            .servers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let clients: BTreeSet<&String> = servers.values().flat_map(|s| s.clients.iter()).collect();
        ConnectionsSnapshot {
            total_requests: servers.values().map(|s| s.total_requests).sum(),
            total_errors: servers.values().map(|s| s.errors).sum(),
            active_clients: clients.len(),
            servers,
        }
    }
}
