// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap driver.
//!
//! Runs every stage in order. Each stage must succeed before the next one
//! starts, and the first failure ends the run. Nothing is rolled back.
//! Recovery is re-running localbrew, which is safe because every stage
//! converges.
//!
//! Stages:
//!
//! 1. Refuse superuser.
//! 2. Check compiler license.
//! 3. Normalize permissions of installation root and cache.
//! 4. Ensure developer toolchain.
//! 5. Discover version-control client, and acquire source tree.
//! 6. Install manifest packages.
//!
//! Stages 2 through 5 are skipped if the installation root already holds a
//! fetched source tree.

use crate::{
    config::read_manifest,
    context::Context,
    packages::install_all,
    permissions::{ensure_cache, inspect_cache, PermissionPlan},
    preflight::{check_license, is_bootstrapped, refuse_superuser},
    source::{acquire, Acquisition},
    syscall::Syscall,
    terminal::Operator,
    toolchain,
    tools::discover_git,
};

use tracing::{debug, info, instrument};

/// Run every stage.
///
/// # Errors
///
/// - Return [`BootstrapError`] from the first stage that fails.
#[instrument(skip_all, level = "debug")]
pub fn bootstrap(
    context: &Context,
    syscall: &impl Syscall,
    operator: &impl Operator,
) -> Result<()> {
    refuse_superuser(&context.identity)?;

    let root = context.root();
    if is_bootstrapped(root) {
        info!("{} already holds a source tree, skipping bootstrap", root.display());
    } else {
        check_license(&context.tools, syscall)?;

        let plan = PermissionPlan::inspect(root, &context.identity);
        plan.report(&context.identity);
        let cache = inspect_cache(context);
        if let Some(cache) = &cache {
            info!(
                "==> The following cache directory will be made group writable and owned by {}:{}:\n{}",
                context.identity.user,
                context.identity.group,
                cache.path.display()
            );
        }
        if (!plan.is_empty() || cache.is_some()) && !context.assume_yes {
            operator.confirm()?;
        }
        plan.apply(context, syscall)?;
        ensure_cache(context, syscall)?;

        toolchain::ensure(context, syscall, operator)?;

        // INVARIANT: Discover after toolchain stage, which may install a client.
        let git = discover_git(context.git_override.clone(), &context.tools, syscall);
        match acquire(context, git.as_deref(), syscall)? {
            Acquisition::Git(commit) => debug!("source tree at {commit}"),
            Acquisition::Archive => debug!("source tree from archive"),
        }
        info!("==> Installation successful!");

        toolchain::advise(context, syscall);
    }

    let manifest = read_manifest(&context.settings.manifest)?;
    install_all(&context.package_manager(), &manifest, syscall)?;

    Ok(())
}

/// All possible stage failures.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Preflight(#[from] crate::preflight::PreflightError),

    #[error(transparent)]
    Permission(#[from] crate::permissions::PermissionError),

    #[error(transparent)]
    Toolchain(#[from] crate::toolchain::ToolchainError),

    #[error(transparent)]
    Source(#[from] crate::source::SourceError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),

    #[error(transparent)]
    Terminal(#[from] crate::terminal::TerminalError),
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
