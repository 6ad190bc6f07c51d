// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::Path;

use crate::config::NodeConfig;
use crate::errors::ConfigError;
use crate::model::Dataflow;

/// Load a Dataflow definition from a YAML file.
///
/// Only the document shape is checked here; topology, processor types and
/// properties are validated by the compiler.
pub fn load_dataflow<P: AsRef<Path>>(path: P) -> Result<Dataflow, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_dataflow(path, &content)
}

pub fn parse_dataflow(path: &Path, content: &str) -> Result<Dataflow, ConfigError> {
    serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load node configuration from a TOML file.
pub fn load_node_config<P: AsRef<Path>>(path: P) -> Result<NodeConfig, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_node_config(path, &content)
}

pub fn parse_node_config(path: &Path, content: &str) -> Result<NodeConfig, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_dataflow_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
id: collect-test
name: Collect
processors:
  - id: ingest
    name: Ingest
    type: INGEST
    phase: 0
    properties:
      type: INLINE
      data: "I'm Data!"
  - id: collect
    name: Collect
    type: COLLECT
    phase: 1
    inputs: [ingest]
    properties:
      type: FOLDER
      location: /tmp/testoutput
"#
        )
        .unwrap();

        let dataflow = load_dataflow(file.path()).unwrap();
        assert_eq!(dataflow.id, "collect-test");
        assert_eq!(dataflow.processors.len(), 2);
    }

    #[test]
    fn malformed_yaml_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id: [unterminated").unwrap();
        match load_dataflow(file.path()) {
            Err(ConfigError::Yaml { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected Yaml error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_dataflow("/no/such/dataflow.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn empty_node_config_uses_defaults() {
        let config = parse_node_config(Path::new("node.toml"), "").unwrap();
        assert_eq!(config.messaging.get_namespace(), "public/default");
        assert_eq!(config.messaging.get_worker_group(), "processors");
        assert_eq!(config.dispatch.get_max_attempts(), 3);
        assert_eq!(config.status.get_max_conflict_retries(), 5);
        assert_eq!(config.worker.get_instances(), 2);
        assert!(config.worker.get_pool_size() >= 1);
        assert_eq!(config.logging.get_filter(), "info");
    }

    #[test]
    fn node_config_overrides() {
        let toml = r#"
[messaging]
namespace = "tenant/flows"

[dispatch]
max_attempts = 7

[worker]
pool_size = 3

[script.fuel]
default = 200000000
maximum = 300000000

[logging]
filter = "debug"
"#;
        let config = parse_node_config(Path::new("node.toml"), toml).unwrap();
        assert_eq!(config.messaging.get_namespace(), "tenant/flows");
        assert_eq!(config.dispatch.get_max_attempts(), 7);
        assert_eq!(config.worker.get_pool_size(), 3);
        assert_eq!(config.script.fuel.get_default(), 200_000_000);
        assert_eq!(config.script.fuel.get_maximum(), 300_000_000);
        assert_eq!(config.logging.get_filter(), "debug");
    }

    #[test]
    fn unknown_toml_types_are_rejected() {
        let err = parse_node_config(Path::new("node.toml"), "[dispatch]\nmax_attempts = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn shipped_configs_load_and_compile() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");
        let dataflow = load_dataflow(root.join("ingest-transform-collect.yaml")).unwrap();
        let plan = crate::compiler::compile(&dataflow).unwrap();
        assert_eq!(plan.phases.len(), 3);

        let config = load_node_config(root.join("node.toml")).unwrap();
        assert_eq!(config.worker.get_instances(), 2);
    }
}
