//! Naming and default constants shared by every crate.

/// Prefix for every container the orchestrator manages (`<prefix>-<server>`).
pub const CONTAINER_PREFIX: &str = "mcp-compose";

/// Display name used in page titles and the MCP client info.
pub const DISPLAY_NAME: &str = "MCP Compose";

/// Default overlay network joining all workloads.
pub const DEFAULT_NETWORK: &str = "mcp-net";

/// Default network driver.
pub const DEFAULT_NETWORK_DRIVER: &str = "bridge";

/// Default proxy listen port.
pub const DEFAULT_PROXY_PORT: u16 = 9876;

/// Default dashboard listen port.
pub const DEFAULT_DASHBOARD_PORT: u16 = 3111;

/// MCP protocol version sent on `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name sent on `initialize`.
pub const MCP_CLIENT_NAME: &str = "mcp-compose-inspector";

/// Log file prefix for the rolling file appender.
pub const LOG_PREFIX: &str = "mcp-compose";

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "mcp-compose.toml";

/// Label carrying the server name on every managed container.
pub const LABEL_SERVER: &str = "mcp-compose.server";

/// Label carrying the hash of the server configuration that produced a container.
pub const LABEL_CONFIG_HASH: &str = "mcp-compose.config-hash";

/// Label marking auxiliary service containers.
pub const LABEL_SERVICE: &str = "mcp-compose.service";

/// Canonical workload name for a server.
pub fn container_name(server: &str) -> String {
    format!("{}-{}", CONTAINER_PREFIX, server)
}

/// Reverse of [`container_name`]. Returns `None` for names outside the prefix.
pub fn server_from_container(container: &str) -> Option<&str> {
    container
        .strip_prefix(CONTAINER_PREFIX)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|s| !s.is_empty())
}

/// Deterministic tag for images built from a local context.
pub fn built_image_tag(server: &str) -> String {
    format!("{}-built-{}:latest", CONTAINER_PREFIX, server.to_lowercase())
}
