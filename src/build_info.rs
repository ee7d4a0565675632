//! Build info collaborator
//!
//! Enriches metadata entries with the toolchain that produced an artifact.
//! The toolchain variant reads onecc-style `.cfg` build configurations next to
//! the artifact: steps enabled under `[onecc]` name sections whose
//! `output_path` is the artifact and whose `input_path` is its source.

use crate::config::ToolchainConfig;
use crate::store::{BuildInfo, MetadataEntry};
use crate::tree::path::{parent_key, relative_key};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

const BUILD_CONFIG_EXT: &str = "cfg";
const STEP_TABLE: &str = "onecc";

/// Source of build information for tracked files.
pub trait BuildInfoSource: Send + Sync {
    /// Return `entry` enriched with build info for the file at `key`.
    ///
    /// Must not fail: lookups that go wrong leave the entry as it was.
    fn get(&self, entry: MetadataEntry, key: &str) -> MetadataEntry;
}

/// Attaches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBuildInfo;

impl BuildInfoSource for NoBuildInfo {
    fn get(&self, entry: MetadataEntry, _key: &str) -> MetadataEntry {
        entry
    }
}

/// Build info from a configured toolchain and the workspace's `.cfg` files.
#[derive(Debug, Clone)]
pub struct ToolchainBuildInfo {
    toolchain: ToolchainConfig,
    workspace_root: PathBuf,
}

/// One enabled step of a build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub name: String,
    pub input: String,
    pub output: String,
}

impl ToolchainBuildInfo {
    pub fn new(toolchain: ToolchainConfig, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            workspace_root: workspace_root.into(),
        }
    }

    /// Find the build step producing `key` among `.cfg` files in its directory.
    fn find_producer(&self, key: &str) -> Option<(String, BuildStep)> {
        let dir_key = parent_key(key);
        let dir = self.workspace_root.join(dir_key);
        let mut cfgs: Vec<PathBuf> = std::fs::read_dir(&dir)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(BUILD_CONFIG_EXT))
            .collect();
        cfgs.sort();

        for cfg in cfgs {
            let raw = match std::fs::read_to_string(&cfg) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(path = %cfg.display(), error = %e, "Skipping unreadable build config");
                    continue;
                }
            };
            let steps = parse_build_steps(&raw, &self.workspace_root, &dir);
            if let Some(step) = steps.into_iter().find(|s| s.output == key) {
                return Some((raw, step));
            }
        }
        None
    }
}

impl BuildInfoSource for ToolchainBuildInfo {
    fn get(&self, mut entry: MetadataEntry, key: &str) -> MetadataEntry {
        // A compile log belongs to the artifact it was written for.
        if let Some(artifact) = key.strip_suffix(".log").filter(|a| a.ends_with(".circle")) {
            if let Some((raw, _)) = self.find_producer(artifact) {
                entry.build_info = Some(BuildInfo {
                    toolchain_name: self.toolchain.name.clone(),
                    toolchain_version: self.toolchain.version.clone(),
                    build_config: Some(raw),
                    input: Some(artifact.to_string()),
                });
            }
            return entry;
        }

        if let Some((raw, step)) = self.find_producer(key) {
            debug!(path = %key, step = %step.name, input = %step.input, "Attaching build info");
            entry.build_info = Some(BuildInfo {
                toolchain_name: self.toolchain.name.clone(),
                toolchain_version: self.toolchain.version.clone(),
                build_config: Some(raw),
                input: Some(step.input),
            });
        }
        entry
    }
}

/// Parse the enabled steps of an onecc-style INI build configuration.
///
/// Paths are resolved against `cfg_dir` and returned as workspace keys; steps
/// whose input or output falls outside the workspace, or whose input equals
/// the output, are dropped.
pub fn parse_build_steps(raw: &str, workspace_root: &Path, cfg_dir: &Path) -> Vec<BuildStep> {
    let parsed = match Config::builder()
        .add_source(File::from_str(raw, FileFormat::Ini))
        .build()
    {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Build config is not valid INI");
            return Vec::new();
        }
    };

    let Ok(enabled) = parsed.get_table(STEP_TABLE) else {
        return Vec::new();
    };
    let mut names: Vec<String> = enabled
        .into_iter()
        .filter(|(_, v)| {
            v.clone()
                .into_string()
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        })
        .map(|(name, _)| name)
        .collect();
    names.sort();

    let resolve = |value: &str| relative_key(workspace_root, &cfg_dir.join(value.trim()));

    let mut steps = Vec::new();
    for name in names {
        let Ok(section) = parsed.get_table(&name) else {
            continue;
        };
        let get = |field: &str| section.get(field).and_then(|v| v.clone().into_string().ok());
        let (Some(input), Some(output)) = (get("input_path"), get("output_path")) else {
            continue;
        };
        let (Some(input), Some(output)) = (resolve(&input), resolve(&output)) else {
            continue;
        };
        if input != output {
            steps.push(BuildStep {
                name,
                input,
                output,
            });
        }
    }
    steps
}
