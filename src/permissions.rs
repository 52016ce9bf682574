// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Permission normalization.
//!
//! The package manager expects its installation root, and the conventional
//! directories below it, to be writable by the user and the administrative
//! group. It also expects a system wide cache directory with the same
//! properties.
//!
//! Normalization happens in two steps. First, a [`PermissionPlan`] is built
//! purely from filesystem metadata. The plan can be reported to the operator
//! before anything happens. Second, the plan is applied with one process
//! invocation per kind of change, no matter how many directories the change
//! covers, so the operator gets as few elevation prompts as possible.
//!
//! Directories that already have the right mode, owner, and group never show
//! up in a plan. Thus, normalizing a compliant tree runs nothing at all.

use crate::{
    context::{Context, Identity},
    syscall::{Invocation, Syscall},
    tools::Tool,
};

use nix::unistd::{access, AccessFlags};
use std::{
    fs::metadata,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Directories below installation root that the package manager writes to.
pub const TARGET_DIRECTORIES: [&str; 24] = [
    ".",
    "bin",
    "etc",
    "include",
    "lib",
    "lib/pkgconfig",
    "Library",
    "sbin",
    "share",
    "var",
    "var/log",
    "share/locale",
    "share/man",
    "share/man/man1",
    "share/man/man2",
    "share/man/man3",
    "share/man/man4",
    "share/man/man5",
    "share/man/man6",
    "share/man/man7",
    "share/man/man8",
    "share/info",
    "share/doc",
    "share/aclocal",
];

const GROUP_WRITE_MODE: &str = "g+rwx";

/// Permission state of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDirectory {
    pub path: PathBuf,
    pub needs_group_write: bool,
    pub needs_owner_change: bool,
    pub needs_group_change: bool,
}

impl TargetDirectory {
    /// Inspect existing directory.
    ///
    /// Returns nothing if path is not a directory.
    pub fn inspect(path: impl Into<PathBuf>, identity: &Identity) -> Option<Self> {
        let path = path.into();
        let meta = metadata(&path).ok()?;
        if !meta.is_dir() {
            return None;
        }

        let group_writable = meta.mode() & 0o020 != 0;
        let user_rwx = access(&path, AccessFlags::R_OK | AccessFlags::W_OK | AccessFlags::X_OK).is_ok();

        Some(Self {
            needs_group_write: !(group_writable && user_rwx),
            needs_owner_change: meta.uid() != identity.uid.as_raw(),
            needs_group_change: meta.gid() != identity.gid.as_raw(),
            path,
        })
    }

    /// Directory that does not exist yet, and thus needs everything.
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            needs_group_write: true,
            needs_owner_change: true,
            needs_group_change: true,
        }
    }
}

/// Changes needed to normalize an installation root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PermissionPlan {
    /// Installation root.
    pub root: PathBuf,

    /// Installation root must be created first.
    pub create_root: bool,

    /// Directories lacking group write or user access.
    pub group_writable: Vec<PathBuf>,

    /// Directories from `group_writable` not owned by current user.
    pub owner: Vec<PathBuf>,

    /// Directories from `group_writable` not owned by administrative group.
    pub group: Vec<PathBuf>,
}

impl PermissionPlan {
    /// Inspect installation root and its conventional subdirectories.
    ///
    /// Owner and group changes are only planned for directories that also
    /// lack group write or user access.
    pub fn inspect(root: impl AsRef<Path>, identity: &Identity) -> Self {
        let root = root.as_ref();
        let targets = TARGET_DIRECTORIES
            .iter()
            .filter_map(|dir| TargetDirectory::inspect(root.join(dir), identity))
            .filter(|target| target.needs_group_write)
            .collect::<Vec<_>>();

        Self {
            root: root.to_path_buf(),
            create_root: !root.is_dir(),
            group_writable: targets.iter().map(|target| target.path.clone()).collect(),
            owner: targets
                .iter()
                .filter(|target| target.needs_owner_change)
                .map(|target| target.path.clone())
                .collect(),
            group: targets
                .iter()
                .filter(|target| target.needs_group_change)
                .map(|target| target.path.clone())
                .collect(),
        }
    }

    /// Check if plan changes nothing.
    pub fn is_empty(&self) -> bool {
        !self.create_root
            && self.group_writable.is_empty()
            && self.owner.is_empty()
            && self.group.is_empty()
    }

    /// Tell operator what is about to change.
    pub fn report(&self, identity: &Identity) {
        if !self.group_writable.is_empty() {
            info!(
                "==> The following directories will be made group writable:\n{}",
                list(&self.group_writable)
            );
        }

        if !self.owner.is_empty() {
            info!(
                "==> The following directories will have their owner set to {}:\n{}",
                identity.user,
                list(&self.owner)
            );
        }

        if !self.group.is_empty() {
            info!(
                "==> The following directories will have their group set to {}:\n{}",
                identity.group,
                list(&self.group)
            );
        }

        if self.create_root {
            info!("==> The following directory will be created:\n{}", self.root.display());
        }
    }

    /// Apply plan.
    ///
    /// A missing installation root is created, made group writable, and
    /// given to the current user and administrative group. Otherwise, each
    /// kind of change runs once over all directories that need it. Changes
    /// covering a directory owned by someone else are elevated.
    ///
    /// # Errors
    ///
    /// - Return [`PermissionError::Tool`] if a needed tool is missing.
    /// - Return [`PermissionError::Syscall`] on the first failed change. No
    ///   further changes are attempted.
    #[instrument(skip(self, context, syscall), level = "debug")]
    pub fn apply(&self, context: &Context, syscall: &impl Syscall) -> Result<()> {
        let tools = &context.tools;
        let identity = &context.identity;

        if self.create_root {
            syscall.run(&Invocation::new(tools.require(Tool::Mkdir)?).arg("-p").arg(&self.root))?;
            syscall.run(
                &Invocation::new(tools.require(Tool::Chmod)?)
                    .arg(GROUP_WRITE_MODE)
                    .arg(&self.root),
            )?;
            syscall.run(
                &Invocation::new(tools.require(Tool::Chown)?)
                    .arg(format!("{}:{}", identity.user, identity.group))
                    .arg(&self.root),
            )?;

            return Ok(());
        }

        if !self.group_writable.is_empty() {
            let chmod = Invocation::new(tools.require(Tool::Chmod)?)
                .arg(GROUP_WRITE_MODE)
                .args(&self.group_writable);
            self.run_maybe_elevated(context, syscall, chmod, &self.group_writable)?;
        }

        if !self.owner.is_empty() {
            let chown = Invocation::new(tools.require(Tool::Chown)?)
                .arg(&identity.user)
                .args(&self.owner);
            syscall.run(&context.elevate(chown)?)?;
        }

        if !self.group.is_empty() {
            let chgrp = Invocation::new(tools.require(Tool::Chgrp)?)
                .arg(&identity.group)
                .args(&self.group);
            self.run_maybe_elevated(context, syscall, chgrp, &self.group)?;
        }

        Ok(())
    }

    fn run_maybe_elevated(
        &self,
        context: &Context,
        syscall: &impl Syscall,
        invocation: Invocation,
        paths: &[PathBuf],
    ) -> Result<()> {
        if paths.iter().any(|path| self.owner.contains(path)) {
            syscall.run(&context.elevate(invocation)?)?;
        } else {
            syscall.run(&invocation)?;
        }

        Ok(())
    }
}

/// Inspect cache directory.
///
/// Returns nothing if the cache already complies. A missing cache needs
/// every fix.
pub fn inspect_cache(context: &Context) -> Option<TargetDirectory> {
    let cache = context.settings.cache.as_path();
    let target = TargetDirectory::inspect(cache, &context.identity)
        .unwrap_or_else(|| TargetDirectory::missing(cache));

    (target.needs_group_write || target.needs_owner_change || target.needs_group_change)
        .then_some(target)
}

/// Make sure cache directory exists, and is group writable and owned by the
/// current user and administrative group.
///
/// The cache lives outside the user's home, so every corrective action is
/// elevated. Each one runs only if the directory does not comply yet.
///
/// # Errors
///
/// - Return [`PermissionError::Tool`] if a needed tool is missing.
/// - Return [`PermissionError::Syscall`] on the first failed change.
#[instrument(skip(context, syscall), level = "debug")]
pub fn ensure_cache(context: &Context, syscall: &impl Syscall) -> Result<()> {
    let tools = &context.tools;
    let identity = &context.identity;
    let cache = context.settings.cache.as_path();

    if !cache.is_dir() {
        let mkdir = Invocation::new(tools.require(Tool::Mkdir)?).arg("-p").arg(cache);
        syscall.run(&context.elevate(mkdir)?)?;
    }

    let Some(target) = inspect_cache(context) else {
        return Ok(());
    };

    if target.needs_group_write {
        let chmod = Invocation::new(tools.require(Tool::Chmod)?)
            .arg(GROUP_WRITE_MODE)
            .arg(cache);
        syscall.run(&context.elevate(chmod)?)?;
    }

    if target.needs_owner_change {
        let chown = Invocation::new(tools.require(Tool::Chown)?)
            .arg(&identity.user)
            .arg(cache);
        syscall.run(&context.elevate(chown)?)?;
    }

    if target.needs_group_change {
        let chgrp = Invocation::new(tools.require(Tool::Chgrp)?)
            .arg(&identity.group)
            .arg(cache);
        syscall.run(&context.elevate(chgrp)?)?;
    }

    Ok(())
}

fn list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Permission normalization error types.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// Needed tool is missing.
    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    /// Change failed.
    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = PermissionError> = std::result::Result<T, E>;
