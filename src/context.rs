// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run context.
//!
//! Facts about the host that more than one stage needs are gathered exactly
//! once during setup, and handed to every stage through [`Context`]. This
//! covers the invoking identity, the operating system version, and the
//! resolved tool paths. The version-control client is not part of it, since
//! the toolchain stage may install one after setup.

use crate::{
    config::Settings,
    syscall::{Invocation, Syscall},
    tools::{Tool, ToolError, Tools},
    version::Version,
};

use nix::unistd::{Gid, Group, Uid, User};
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, info, instrument, warn};

static OS_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("valid os version regex"));

/// Who is running localbrew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Real user id of the process.
    pub uid: Uid,

    /// Login name of the user.
    pub user: String,

    /// Group that should own the installation.
    pub gid: Gid,

    /// Name of the group that should own the installation.
    pub group: String,
}

impl Identity {
    /// Detect identity of current process.
    ///
    /// Falls back to the user's primary group if the requested administrative
    /// group does not exist on this host.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::UnknownUser`] if current user has no entry in
    ///   the user database.
    /// - Return [`ContextError::Lookup`] if user or group database cannot be
    ///   queried.
    pub fn detect(group: &str) -> Result<Self> {
        let uid = Uid::current();
        let user = User::from_uid(uid)?.ok_or(ContextError::UnknownUser(uid))?;

        let (gid, group) = match Group::from_name(group)? {
            Some(found) => (found.gid, found.name),
            None => {
                let primary = Group::from_gid(user.gid)?
                    .map(|found| found.name)
                    .unwrap_or_else(|| user.gid.to_string());
                warn!("group {group:?} does not exist, using {primary:?} instead");
                (user.gid, primary)
            }
        };

        Ok(Self {
            uid,
            user: user.name,
            gid,
            group,
        })
    }
}

/// Flags that influence the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    /// Fetch full history instead of a single commit.
    pub full_history: bool,

    /// Do not ask the operator before changing permissions.
    pub assume_yes: bool,

    /// Explicit version-control client to use.
    pub git_override: Option<PathBuf>,
}

/// Everything a stage needs to know about the host.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub tools: Tools,
    pub identity: Identity,
    pub os_version: Option<Version>,
    pub git_override: Option<PathBuf>,
    pub full_history: bool,
    pub assume_yes: bool,
}

impl Context {
    /// Gather run context from host.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError`] if identity cannot be determined.
    #[instrument(skip_all, level = "debug")]
    pub fn detect(settings: Settings, options: Options, syscall: &impl Syscall) -> Result<Self> {
        let tools = Tools::resolve(&settings.tools);
        let identity = Identity::detect(&settings.group)?;
        let os_version = os_version(&tools, syscall);
        debug!("os version {os_version:?}");

        Ok(Self {
            settings,
            tools,
            identity,
            os_version,
            git_override: options.git_override,
            full_history: options.full_history,
            assume_yes: options.assume_yes,
        })
    }

    /// Installation root.
    pub fn root(&self) -> &Path {
        self.settings.prefix.as_path()
    }

    /// Package manager executable inside installation root.
    pub fn package_manager(&self) -> PathBuf {
        self.root().join("bin").join("brew")
    }

    /// Wrap invocation with privilege elevation tool, and echo it.
    ///
    /// The elevation tool may prompt for a password, so the operator sees the
    /// exact command first.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Missing`] if no elevation tool was resolved.
    pub fn elevate(&self, invocation: Invocation) -> Result<Invocation, ToolError> {
        let elevated = invocation.elevate(self.tools.require(Tool::Sudo)?);
        info!("==> {elevated}");
        Ok(elevated)
    }

    /// Check whether host runs at least target OS version.
    ///
    /// Unknown OS versions never satisfy the check.
    pub fn os_at_least(&self, version: &Version) -> bool {
        self.os_version
            .as_ref()
            .is_some_and(|current| current >= version)
    }
}

/// Query operating system product version.
///
/// Returns nothing if the query tool is absent, fails, or prints something
/// without a dotted version number.
pub fn os_version(tools: &Tools, syscall: &impl Syscall) -> Option<Version> {
    let sw_vers = tools.get(Tool::SwVers)?;
    let captured = syscall
        .capture(&Invocation::new(sw_vers).arg("-productVersion"))
        .ok()?;
    if !captured.success {
        return None;
    }

    parse_os_version(&captured.stdout)
}

/// Extract first dotted version number from product version output.
pub fn parse_os_version(output: &str) -> Option<Version> {
    OS_VERSION
        .find(output)
        .and_then(|found| found.as_str().parse().ok())
}

/// Run context error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Current user has no entry in user database.
    #[error("cannot find user entry for uid {0}")]
    UnknownUser(Uid),

    /// User or group database lookup failed.
    #[error(transparent)]
    Lookup(#[from] nix::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ContextError> = std::result::Result<T, E>;
