//! Configuration artifact for downstream clients.
//!
//! The artifact is a flat `KEY=VALUE` file listing the addresses a client
//! needs. It is overwritten atomically on every run that reaches emission.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    ComponentName, ComponentRegistry,
    error::{DeployError, Result},
    fs::FsHandler,
};

/// Maps an artifact key to the component whose address it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub key: String,
    pub component: ComponentName,
}

impl ArtifactEntry {
    pub fn new(key: impl Into<String>, component: impl Into<ComponentName>) -> Self {
        Self {
            key: key.into(),
            component: component.into(),
        }
    }
}

/// Emitted key/address pairs, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigArtifact {
    entries: Vec<(String, Address)>,
}

impl ConfigArtifact {
    pub fn entries(&self) -> &[(String, Address)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<Address> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, address)| *address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `KEY=VALUE` lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, address) in &self.entries {
            let _ = writeln!(out, "{key}={address}");
        }
        out
    }

    /// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .with_context(|| format!("Line {} is not KEY=VALUE: `{}`", lineno + 1, line))?;
            let address = Address::from_str(value.trim())
                .with_context(|| format!("Invalid address for {}: `{}`", key, value))?;
            entries.push((key.trim().to_string(), address));
        }
        Ok(Self { entries })
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config artifact from {}", path.display()))?;
        Self::parse(&content)
    }
}

/// Writes the configuration artifact from the registry.
#[derive(Debug, Clone)]
pub struct ConfigEmitter {
    pub path: PathBuf,
    pub entries: Vec<ArtifactEntry>,
}

impl ConfigEmitter {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<ArtifactEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Collect the configured addresses from `registry` and write them.
    ///
    /// Any previous artifact is replaced. A failed write leaves the previous
    /// file intact and does not touch the registry. Every failure, including an
    /// entry whose component has no address, is an `EmitFailed`.
    pub fn emit(&self, registry: &ComponentRegistry) -> Result<ConfigArtifact> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                registry
                    .require_address(&entry.component, &entry.key)
                    .map(|address| (entry.key.clone(), address))
                    .map_err(|err| DeployError::EmitFailed {
                        path: self.path.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::NotFound, err.to_string()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let artifact = ConfigArtifact { entries };

        FsHandler::write_atomic(&self.path, artifact.render().as_bytes()).map_err(|source| {
            DeployError::EmitFailed {
                path: self.path.clone(),
                source,
            }
        })?;

        tracing::info!(
            path = %self.path.display(),
            entries = artifact.len(),
            "Configuration artifact written"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentSpec;
    use tempdir::TempDir;

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new("development");
        registry.record_deployment(&ComponentSpec::new("CollateralToken"), Address::repeat_byte(1));
        registry.record_deployment(&ComponentSpec::new("Perpetual"), Address::repeat_byte(2));
        registry.record_deployment(&ComponentSpec::new("Amm"), Address::repeat_byte(3));
        registry.record_deployment(&ComponentSpec::new("PriceFeeder"), Address::repeat_byte(4));
        registry
    }

    fn emitter(path: PathBuf) -> ConfigEmitter {
        ConfigEmitter::new(
            path,
            vec![
                ArtifactEntry::new("REACT_APP_COLLATERAL_TOKEN_ADDRESS", "CollateralToken"),
                ArtifactEntry::new("REACT_APP_PERPETUAL_ADDRESS", "Perpetual"),
                ArtifactEntry::new("REACT_APP_AMM_ADDRESS", "Amm"),
            ],
        )
    }

    #[test]
    fn test_emit_writes_exactly_the_configured_entries() {
        let dir = TempDir::new("artifact").unwrap();
        let path = dir.path().join("frontend/.env");

        let artifact = emitter(path.clone()).emit(&registry()).unwrap();
        assert_eq!(artifact.len(), 3);
        assert_eq!(
            artifact.get("REACT_APP_AMM_ADDRESS"),
            Some(Address::repeat_byte(3))
        );

        let on_disk = ConfigArtifact::load_from_file(&path).unwrap();
        assert_eq!(on_disk, artifact);
        assert!(on_disk.get("PRICE_FEEDER").is_none());
    }

    #[test]
    fn test_emit_overwrites_previous_artifact() {
        let dir = TempDir::new("artifact").unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "STALE=0x0000000000000000000000000000000000000001\n").unwrap();

        let mut registry = registry();
        registry.record_deployment(&ComponentSpec::new("Amm"), Address::repeat_byte(9));
        emitter(path.clone()).emit(&registry).unwrap();

        let on_disk = ConfigArtifact::load_from_file(&path).unwrap();
        assert!(on_disk.get("STALE").is_none());
        assert_eq!(
            on_disk.get("REACT_APP_AMM_ADDRESS"),
            Some(Address::repeat_byte(9))
        );
    }

    #[test]
    fn test_unwritable_target_fails_with_emit_error() {
        let dir = TempDir::new("artifact").unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = emitter(blocker.join(".env")).emit(&registry()).unwrap_err();
        assert!(matches!(err, DeployError::EmitFailed { .. }));
    }

    #[test]
    fn test_missing_component_fails_with_emit_error() {
        let dir = TempDir::new("artifact").unwrap();
        let path = dir.path().join(".env");
        let mut registry = ComponentRegistry::new("development");
        registry.record_deployment(&ComponentSpec::new("CollateralToken"), Address::repeat_byte(1));

        let err = emitter(path.clone()).emit(&registry).unwrap_err();
        assert!(matches!(err, DeployError::EmitFailed { .. }));
        assert!(!err.is_fatal());
        assert!(!path.exists());
    }

    #[test]
    fn test_render_and_parse() {
        let artifact = ConfigArtifact::parse(
            "# generated\n\nA=0x0101010101010101010101010101010101010101\n",
        )
        .unwrap();
        assert_eq!(artifact.len(), 1);
        assert_eq!(
            artifact.render(),
            format!("A={}\n", Address::repeat_byte(1))
        );
        assert!(ConfigArtifact::parse("no-equals-sign").is_err());
    }
}
