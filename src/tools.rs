// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External tool resolution.
//!
//! Localbrew never hard codes absolute tool paths like `/usr/bin/sudo`.
//! Instead, each external dependency has a name, and is resolved once at
//! startup either from an explicit path in the settings file, or by searching
//! `PATH`. Tools that cannot be found are simply absent. Stages that need an
//! absent tool fail with [`ToolError::Missing`] only when they actually need
//! it, while probing stages (OS version, developer tools) skip themselves.

use crate::{
    syscall::{Invocation, Syscall},
    version::Version,
};

use nix::unistd::{access, AccessFlags};
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};
use tracing::{debug, warn};

/// Oldest version-control client that can fetch over HTTPS.
pub const MINIMUM_GIT_VERSION: [u64; 3] = [1, 7, 10];

static GIT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"git version (\d+\.\d+\.\d+)").expect("valid git version regex"));

/// Named external dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Sudo,
    Chmod,
    Chown,
    Chgrp,
    Mkdir,
    SwVers,
    XcodeSelect,
    Xcrun,
    Cc,
    Curl,
    Tar,
}

impl Tool {
    pub const ALL: [Tool; 11] = [
        Tool::Sudo,
        Tool::Chmod,
        Tool::Chown,
        Tool::Chgrp,
        Tool::Mkdir,
        Tool::SwVers,
        Tool::XcodeSelect,
        Tool::Xcrun,
        Tool::Cc,
        Tool::Curl,
        Tool::Tar,
    ];

    /// Executable name searched for on `PATH`.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Sudo => "sudo",
            Tool::Chmod => "chmod",
            Tool::Chown => "chown",
            Tool::Chgrp => "chgrp",
            Tool::Mkdir => "mkdir",
            Tool::SwVers => "sw_vers",
            Tool::XcodeSelect => "xcode-select",
            Tool::Xcrun => "xcrun",
            Tool::Cc => "cc",
            Tool::Curl => "curl",
            Tool::Tar => "tar",
        }
    }
}

impl Display for Tool {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = ToolError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == data)
            .ok_or_else(|| ToolError::Unknown(data.to_string()))
    }
}

/// Resolved paths of external tools.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tools {
    resolved: BTreeMap<Tool, PathBuf>,
}

impl Tools {
    /// Resolve every known tool.
    ///
    /// Explicit overrides win over `PATH` lookup. Overrides naming an unknown
    /// tool are reported and ignored.
    pub fn resolve(overrides: &BTreeMap<String, PathBuf>) -> Self {
        let mut resolved = BTreeMap::new();
        for (name, path) in overrides {
            match name.parse::<Tool>() {
                Ok(tool) => {
                    resolved.insert(tool, path.clone());
                }
                Err(_) => warn!("ignoring path for unknown tool {name:?}"),
            }
        }

        for tool in Tool::ALL {
            if resolved.contains_key(&tool) {
                continue;
            }

            match which::which(tool.name()) {
                Ok(path) => {
                    debug!("resolved {tool} to {}", path.display());
                    resolved.insert(tool, path);
                }
                Err(_) => debug!("{tool} not found on PATH"),
            }
        }

        Self { resolved }
    }

    /// Path to tool if it was resolved.
    pub fn get(&self, tool: Tool) -> Option<&Path> {
        self.resolved.get(&tool).map(PathBuf::as_path)
    }

    /// Path to tool that the caller cannot work without.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Missing`] if tool was not resolved.
    pub fn require(&self, tool: Tool) -> Result<&Path> {
        self.get(tool).ok_or(ToolError::Missing(tool))
    }
}

impl FromIterator<(Tool, PathBuf)> for Tools {
    fn from_iter<I: IntoIterator<Item = (Tool, PathBuf)>>(iter: I) -> Self {
        Self {
            resolved: iter.into_iter().collect(),
        }
    }
}

/// Find a usable version-control client.
///
/// The candidate is the `GIT` override if it names an executable file, then
/// `git` on `PATH`, then whatever the developer tools runner reports. Only
/// the first candidate found is considered. It is rejected if its reported
/// version is unknown, or older than [`MINIMUM_GIT_VERSION`].
///
/// No usable client is not an error. The caller falls back to the archive
/// pipeline instead.
pub fn discover_git(
    git_override: Option<PathBuf>,
    tools: &Tools,
    syscall: &impl Syscall,
) -> Option<PathBuf> {
    let candidate = match git_override.filter(|path| is_executable(path)) {
        Some(path) => path,
        None => which::which("git")
            .ok()
            .or_else(|| find_with_xcrun(tools, syscall))?,
    };

    let captured = syscall
        .capture(&Invocation::new(&candidate).arg("--version"))
        .ok()?;
    let Some(version) = git_version(&captured.stdout) else {
        debug!("cannot determine version of {}", candidate.display());
        return None;
    };

    if version < Version::new(MINIMUM_GIT_VERSION) {
        debug!("{} is too old at version {version}", candidate.display());
        return None;
    }

    debug!("using {} at version {version}", candidate.display());
    Some(candidate)
}

/// Extract version from output of `git --version`.
pub fn git_version(output: &str) -> Option<Version> {
    GIT_VERSION
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|version| version.as_str().parse().ok())
}

fn find_with_xcrun(tools: &Tools, syscall: &impl Syscall) -> Option<PathBuf> {
    let xcrun = tools.get(Tool::Xcrun)?;
    let captured = syscall
        .capture(&Invocation::new(xcrun).args(["-find", "git"]))
        .ok()?;
    let path = PathBuf::from(captured.stdout.trim());

    (captured.success && !captured.stdout.trim().is_empty() && is_executable(&path)).then_some(path)
}

/// Check that path is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

/// Tool resolution error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Required tool was not found.
    #[error("required tool {0:?} cannot be found, set its path in the [tools] table")]
    Missing(Tool),

    /// Name does not belong to any known tool.
    #[error("unknown tool {0:?}")]
    Unknown(String),
}

/// Friendly result alias :3
pub type Result<T, E = ToolError> = std::result::Result<T, E>;
