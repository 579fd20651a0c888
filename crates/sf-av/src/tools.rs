//! External tool detection.
//!
//! The [`ToolRegistry`] resolves the locations of the two CLI tools the
//! streaming server shells out to (ffmpeg for segmenting, ffprobe for
//! probing) and hands them to the rest of the workspace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, if the tool ran.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools, preferring config overrides that exist on disk and
    /// falling back to a `PATH` search. Missing tools are left out.
    pub fn discover(tools_config: &sf_core::config::ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path missing; searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit paths, bypassing discovery.
    pub fn with_paths(paths: impl IntoIterator<Item = (&'static str, PathBuf)>) -> Self {
        Self {
            tools: paths
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
        }
    }

    /// Path of the given tool, or [`sf_core::Error::Spawn`] if it was not
    /// found during discovery.
    pub fn require(&self, name: &str) -> sf_core::Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| sf_core::Error::spawn(name, "not found; is it installed and in PATH?"))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::config::ToolsConfig;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // Nothing is guaranteed to be installed; the call must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_is_spawn_error() {
        let registry = ToolRegistry::default();
        let err = registry.require("ffmpeg").unwrap_err();
        assert!(matches!(err, sf_core::Error::Spawn { .. }));
    }

    #[test]
    fn explicit_paths_are_returned() {
        let registry = ToolRegistry::with_paths([("ffmpeg", PathBuf::from("/opt/ff/ffmpeg"))]);
        assert_eq!(registry.require("ffmpeg").unwrap(), Path::new("/opt/ff/ffmpeg"));
        assert!(registry.require("ffprobe").is_err());
    }

    #[test]
    fn check_all_lists_known_tools() {
        let infos = ToolRegistry::default().check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn missing_override_falls_back_to_path_search() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/definitely/not/here/ffmpeg")),
            ffprobe_path: None,
        };
        let registry = ToolRegistry::discover(&cfg);
        if let Ok(p) = registry.require("ffmpeg") {
            assert_ne!(p, Path::new("/definitely/not/here/ffmpeg"));
        }
    }
}
