// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source tree acquisition.
//!
//! The package manager runs straight out of its own source tree, so
//! installing it means getting that tree into the installation root. There
//! are two ways to do this.
//!
//! # Version Control
//!
//! When a usable version-control client exists, the tree is fetched in four
//! separate steps instead of one clone: initialize, configure the remote,
//! fetch one branch, and hard reset to it. Every step converges. Re-running
//! over a tree left behind by an earlier, partial run ends up at exactly the
//! same checkout as a fresh run. A clone would refuse to run in a non-empty
//! directory, and adding a remote would fail if one already exists.
//!
//! The fetch is shallow unless full history was requested. A shallow tip has
//! no parents, so the tracking branch is force updated rather than fast
//! forwarded.
//!
//! # Archive
//!
//! Without a usable client, a tarball of the branch is streamed over TLS
//! straight into the archive extractor. The top-level directory of the
//! tarball is stripped, and failure to restore modification times on
//! directories owned by someone else is tolerated. A failed download fails
//! the whole pipeline, even if extraction happened to succeed.

use crate::{
    context::Context,
    syscall::{Invocation, Syscall},
    tools::Tool,
};

use git2::{Oid, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::Path, time::Duration};
use tracing::{info, instrument};

/// How the source tree was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Fetched through version control, and checked out at target commit.
    Git(Oid),

    /// Extracted from tarball.
    Archive,
}

/// Put the package manager's source tree into the installation root.
///
/// Uses target version-control client if given, and the archive pipeline
/// otherwise.
///
/// # Errors
///
/// - Return [`SourceError::Tool`] if archive tools are needed but missing.
/// - Return [`SourceError::Syscall`] if any step fails.
/// - Return [`SourceError::Git2`] if checkout cannot be inspected.
/// - Return [`SourceError::Diverged`] if checkout does not match the fetched
///   branch.
#[instrument(skip_all, level = "debug")]
pub fn acquire(
    context: &Context,
    git: Option<&Path>,
    syscall: &impl Syscall,
) -> Result<Acquisition> {
    info!("==> Downloading and installing Homebrew...");
    match git {
        Some(git) => {
            for step in git_steps(git, context) {
                syscall.run(&step)?;
            }

            let commit = verify_checkout(context.root(), &context.settings.branch)?;
            Ok(Acquisition::Git(commit))
        }
        None => {
            let (fetch, extract) = archive_pipeline(context)?;
            let spinner = spinner(context.settings.tarball_url())?;
            let result = syscall.pipe(&fetch, &extract);
            spinner.finish_and_clear();
            result?;

            Ok(Acquisition::Archive)
        }
    }
}

/// Version-control steps that converge installation root to target branch.
pub fn git_steps(git: &Path, context: &Context) -> Vec<Invocation> {
    let root = context.root();
    let branch = &context.settings.branch;
    let step = |args: &[&str]| Invocation::new(git).args(args).current_dir(root);

    let mut fetch = step(&["fetch", "origin"])
        .arg(format!("+{branch}:refs/remotes/origin/{branch}"))
        .arg("-n");
    if !context.full_history {
        fetch = fetch.arg("--depth=1");
    }

    vec![
        step(&["init", "-q"]),
        step(&["config", "remote.origin.url"]).arg(&context.settings.repository),
        step(&["config", "remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*"]),
        fetch,
        step(&["reset", "--hard"]).arg(format!("origin/{branch}")),
    ]
}

/// Download and extraction halves of the archive pipeline.
///
/// # Errors
///
/// - Return [`SourceError::Tool`] if download or extraction tool is missing.
pub fn archive_pipeline(context: &Context) -> Result<(Invocation, Invocation)> {
    let root = context.root();
    let fetch = Invocation::new(context.tools.require(Tool::Curl)?)
        .arg("-fsSL")
        .arg(context.settings.tarball_url())
        .current_dir(root);
    let extract = Invocation::new(context.tools.require(Tool::Tar)?)
        .args(["xz", "-m", "--strip-components=1"])
        .current_dir(root);

    Ok((fetch, extract))
}

/// Make sure the checkout sits exactly at the fetched branch.
///
/// # Errors
///
/// - Return [`SourceError::Git2`] if repository or references cannot be read.
/// - Return [`SourceError::Diverged`] if `HEAD` and the tracking branch point
///   at different commits.
pub fn verify_checkout(root: &Path, branch: &str) -> Result<Oid> {
    let repository = Repository::open(root)?;
    let head = repository.head()?.peel_to_commit()?.id();
    let tracking = repository
        .find_reference(&format!("refs/remotes/origin/{branch}"))?
        .peel_to_commit()?
        .id();

    if head != tracking {
        return Err(SourceError::Diverged { head, tracking });
    }

    let short = head.to_string().chars().take(7).collect::<String>();
    info!("checked out {branch} at {short}");
    Ok(head)
}

fn spinner(message: String) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template("{elapsed_precise:.green}  {spinner:.yellow}  {msg}")?;
    let bar = ProgressBar::new_spinner().with_style(style).with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

/// Source acquisition error types.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Needed tool is missing.
    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    /// Acquisition step failed.
    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),

    /// Checkout does not match fetched branch.
    #[error("checkout at {head} does not match fetched commit {tracking}")]
    Diverged { head: Oid, tracking: Oid },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SourceError> = std::result::Result<T, E>;
