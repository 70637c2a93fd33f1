//! ToolCatalog: MCP server enumeration, name mangling, and the 20-tool cap (§4.4, §6).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::error::EngineError;
use super::ports::McpClient;

/// Hard cap on the number of tools exposed to the LLM in one turn.
pub const MAX_MCP_TOOLS: usize = 20;

/// One MCP-backed tool definition, named in the wire-safe `server__tool` form.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Configuration for one MCP server entry in an assistant's tool list.
#[derive(Clone, Debug)]
pub struct McpServerConfig {
    pub server_id: String,
    pub allow_list: Option<Vec<String>>,
}

/// Formats `(server_id, tool_name)` into the wire name `<server>__<tool>`.
/// `server_id` dots are replaced with underscores; server_ids must not
/// themselves contain an underscore, and both parts must be non-empty.
pub fn format_tool_name(server_id: &str, tool_name: &str) -> Result<String, EngineError> {
    if server_id.is_empty() || tool_name.is_empty() {
        return Err(EngineError::McpError(
            "server_id and tool_name must be non-empty".into(),
        ));
    }
    let clean_server = server_id.replace('.', "_");
    Ok(format!("{}__{}", clean_server, tool_name))
}

/// Splits a wire tool name back into `(server_id, tool_name)`. `parse` does
/// not restore dots in `server_id` that were collapsed by `format` — callers
/// that need the original dotted id must look it up via the registered
/// server config, since the underscore collapse is lossy for server ids
/// that mix `.` and `_` themselves (not produced by `format_tool_name`).
pub fn parse_tool_name(formatted: &str) -> Result<(String, String), EngineError> {
    let parts: Vec<&str> = formatted.splitn(2, "__").collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(EngineError::McpError(format!(
            "malformed tool name: {}",
            formatted
        )));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Up to 3 example `{input, output, description}` tuples for one tool.
#[derive(Clone, Debug)]
pub struct ToolSample {
    pub input: Value,
    pub output: Value,
    pub description: Option<String>,
}

/// Builds the tool catalog for one turn: lists each configured server's
/// tools, applies its allow-list, formats names, and caps the total at
/// [`MAX_MCP_TOOLS`]. Errors from an individual server are logged and
/// skipped — catalog build is best-effort, never fatal.
pub struct ToolCatalog;

impl ToolCatalog {
    pub async fn build(
        servers: &[McpServerConfig],
        client_for: impl Fn(&str) -> Option<Arc<dyn McpClient>>,
    ) -> Vec<ToolSpec> {
        let mut out = Vec::new();
        'servers: for server in servers {
            if out.len() >= MAX_MCP_TOOLS {
                break;
            }
            let Some(client) = client_for(&server.server_id) else {
                warn!(server = %server.server_id, "no mcp client registered, skipping");
                continue;
            };
            let tools = match client.list_tools(None).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(server = %server.server_id, error = %e, "mcp list_tools failed, skipping server");
                    continue;
                }
            };
            let allow: Option<HashSet<&str>> = server
                .allow_list
                .as_ref()
                .map(|l| l.iter().map(String::as_str).collect());
            for tool in tools {
                if let Some(allow) = &allow {
                    if !allow.contains(tool.name.as_str()) {
                        continue;
                    }
                }
                let Ok(name) = format_tool_name(&server.server_id, &tool.name) else {
                    continue;
                };
                out.push(ToolSpec {
                    name,
                    description: tool.description,
                    input_schema: tool.input_schema,
                });
                if out.len() >= MAX_MCP_TOOLS {
                    break 'servers;
                }
            }
        }
        out
    }

    /// Builds the "MCP Tool Usage Examples" system-prompt appendix from each
    /// tool's sample lookup, skipping tools with no samples. Returns `None`
    /// when no tool produced any sample.
    pub async fn build_samples_appendix(
        tools: &[ToolSpec],
        servers: &[McpServerConfig],
        client_for: impl Fn(&str) -> Option<Arc<dyn McpClient>>,
    ) -> Option<String> {
        let mut sections = Vec::new();
        for tool in tools {
            let Ok((server_id, tool_name)) = parse_tool_name(&tool.name) else {
                continue;
            };
            let resolved_server = servers
                .iter()
                .find(|s| format_tool_name(&s.server_id, &tool_name).ok().as_deref() == Some(tool.name.as_str()))
                .map(|s| s.server_id.clone())
                .unwrap_or(server_id);
            let Some(client) = client_for(&resolved_server) else {
                continue;
            };
            let Ok(samples) = client.list_samples(&resolved_server, &tool_name).await else {
                continue;
            };
            if samples.is_empty() {
                continue;
            }
            let mut section = format!("### {}\n", tool.name);
            for sample in samples.iter().take(3) {
                section.push_str(&format!(
                    "- input: {}\n  output: {}\n",
                    sample.input, sample.output
                ));
            }
            sections.push(section);
        }
        if sections.is_empty() {
            None
        } else {
            Some(format!(
                "## MCP Tool Usage Examples\n\n{}",
                sections.join("\n")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: round-trip `("github.enterprise","search_repos")`.
    #[test]
    fn tool_name_round_trips() {
        let formatted = format_tool_name("github.enterprise", "search_repos").unwrap();
        assert_eq!(formatted, "github_enterprise__search_repos");
        let (server, tool) = parse_tool_name(&formatted).unwrap();
        assert_eq!(server, "github_enterprise");
        assert_eq!(tool, "search_repos");
    }

    #[test]
    fn format_rejects_empty_parts() {
        assert!(format_tool_name("", "tool").is_err());
        assert!(format_tool_name("server", "").is_err());
    }

    #[test]
    fn parse_rejects_malformed_names() {
        assert!(parse_tool_name("no-separator").is_err());
        assert!(parse_tool_name("__missing_server").is_err());
        assert!(parse_tool_name("missing_tool__").is_err());
    }

    #[test]
    fn parse_splits_on_first_double_underscore_only() {
        let (server, tool) = parse_tool_name("server__tool__with__underscores").unwrap();
        assert_eq!(server, "server");
        assert_eq!(tool, "tool__with__underscores");
    }
}
