// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Developer toolchain checks.
//!
//! Since 10.9, the system ships a stub that installs the command line
//! developer tools on demand. Localbrew triggers that installer when the
//! tools are missing, then waits for the operator to say it finished. The
//! installer runs in its own window, so there is nothing to poll.

use crate::{
    context::Context,
    syscall::{Invocation, Syscall},
    terminal::Operator,
    tools::Tool,
    version::Version,
};

use regex::Regex;
use std::{path::Path, sync::LazyLock};
use tracing::{debug, info, instrument};

/// First OS version whose developer tools install on demand.
pub const ON_DEMAND_TOOLS: [u64; 2] = [10, 9];

/// Oldest compiler build that handles the package manager's formulae.
pub const MINIMUM_CLANG_BUILD: u64 = 425;

static CLANG_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"clang-(\d{2,})").expect("valid clang build regex"));

/// Make sure command line developer tools are installed.
///
/// Does nothing on hosts older than [`ON_DEMAND_TOOLS`], or where the OS
/// version or developer tools selector is unknown.
///
/// # Errors
///
/// - Return [`ToolchainError::Tool`] if elevation tool is missing.
/// - Return [`ToolchainError::Syscall`] if installer cannot be triggered.
/// - Return [`ToolchainError::Terminal`] if operator cannot be waited on.
#[instrument(skip_all, level = "debug")]
pub fn ensure(context: &Context, syscall: &impl Syscall, operator: &impl Operator) -> Result<()> {
    if !context.os_at_least(&Version::new(ON_DEMAND_TOOLS)) {
        debug!("developer tools do not install on demand here");
        return Ok(());
    }

    let Some(xcode_select) = context.tools.get(Tool::XcodeSelect) else {
        debug!("no {} on this host", Tool::XcodeSelect);
        return Ok(());
    };

    let captured = syscall.capture(&Invocation::new(xcode_select).arg("-print-path"))?;
    let developer_dir = if captured.success {
        captured.stdout.trim()
    } else {
        ""
    };

    if !developer_dir.is_empty() && Path::new(developer_dir).join("usr/bin/git").exists() {
        debug!("developer tools found at {developer_dir}");
        return Ok(());
    }

    info!("==> Installing the Command Line Tools (expect a GUI popup):");
    let install = Invocation::new(xcode_select).arg("--install");
    syscall.run(&context.elevate(install)?)?;
    operator.pause("Press any key when the installation has completed.")?;

    Ok(())
}

/// Point operator at a compiler if the installed one will not do.
///
/// Between 10.6 and 10.9 the compiler comes separately, and old builds are
/// advised against. Elsewhere, the operator is told to install Xcode when no
/// compiler is found at all.
pub fn advise(context: &Context, syscall: &impl Syscall) {
    let Some(version) = &context.os_version else {
        return;
    };

    if *version > Version::new([10, 6]) && *version < Version::new(ON_DEMAND_TOOLS) {
        let build = context
            .tools
            .get(Tool::Cc)
            .and_then(|cc| syscall.capture(&Invocation::new(cc).arg("--version")).ok())
            .and_then(|captured| clang_build(&captured.combined()))
            .unwrap_or(0);

        if build < MINIMUM_CLANG_BUILD {
            info!("Install the Command Line Tools for Xcode: https://developer.apple.com/downloads");
        }
    } else if context.tools.get(Tool::Cc).is_none() {
        info!("Install Xcode: https://developer.apple.com/xcode");
    }
}

/// Extract clang build number from compiler version output.
pub fn clang_build(output: &str) -> Option<u64> {
    CLANG_BUILD
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|build| build.as_str().parse().ok())
}

/// Developer toolchain error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),

    #[error(transparent)]
    Terminal(#[from] crate::terminal::TerminalError),
}

/// Friendly result alias :3
pub type Result<T, E = ToolchainError> = std::result::Result<T, E>;
