//! Inbound session configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Options the host environment hands us at session start, either as CLI
/// flags or as LSP `initializationOptions` (camelCase JSON). Options sent by
/// the client replace the CLI-provided set wholesale.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowOptions {
    /// Explicit path to the flow binary. Must be absolute; when set, no
    /// other resolution strategy is consulted.
    pub path_to_flow: Option<PathBuf>,
    /// Download a matching flow release when nothing usable is installed.
    pub auto_download_flow: bool,
    /// Probe `node_modules/.bin/flow` under the project root.
    pub try_flow_bin: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            path_to_flow: None,
            auto_download_flow: true,
            try_flow_bin: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FlowOptions::default();
        assert!(options.path_to_flow.is_none());
        assert!(options.auto_download_flow);
        assert!(!options.try_flow_bin);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: FlowOptions = serde_json::from_value(serde_json::json!({
            "pathToFlow": "/usr/local/bin/flow",
            "autoDownloadFlow": false,
            "tryFlowBin": true
        }))
        .unwrap();
        assert_eq!(options.path_to_flow, Some(PathBuf::from("/usr/local/bin/flow")));
        assert!(!options.auto_download_flow);
        assert!(options.try_flow_bin);
    }

    #[test]
    fn test_deserialize_partial_fills_defaults() {
        let options: FlowOptions =
            serde_json::from_value(serde_json::json!({ "tryFlowBin": true })).unwrap();
        assert!(options.path_to_flow.is_none());
        assert!(options.auto_download_flow);
        assert!(options.try_flow_bin);
    }

    #[test]
    fn test_deserialize_empty_object() {
        let options: FlowOptions = serde_json::from_str("{}").unwrap();
        assert!(options.auto_download_flow);
    }
}
