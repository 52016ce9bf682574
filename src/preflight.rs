// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Preconditions checked before anything is touched.

use crate::{
    context::Identity,
    syscall::{Invocation, Syscall},
    tools::{Tool, Tools},
};

use glob::Pattern;
use std::path::Path;
use tracing::debug;

/// Refuse to run with superuser privileges.
///
/// Localbrew elevates only the operations that need it, so starting out as
/// the superuser would leave every file it creates owned by the wrong user.
///
/// # Errors
///
/// - Return [`PreflightError::Superuser`] if identity is the superuser.
pub fn refuse_superuser(identity: &Identity) -> Result<()> {
    if identity.uid.is_root() {
        return Err(PreflightError::Superuser);
    }

    Ok(())
}

/// Make sure the compiler license was accepted.
///
/// The compiler refuses to work until its license is accepted, and says so
/// on standard error while exiting non-zero. Hosts without the developer
/// tools runner are not checked.
///
/// # Errors
///
/// - Return [`PreflightError::LicenseNotAccepted`] if compiler reports an
///   unaccepted license.
/// - Return [`PreflightError::Syscall`] if compiler cannot be started.
pub fn check_license(tools: &Tools, syscall: &impl Syscall) -> Result<()> {
    let Some(xcrun) = tools.get(Tool::Xcrun) else {
        debug!("no {} on this host, skip license check", Tool::Xcrun);
        return Ok(());
    };

    let captured = syscall.capture(&Invocation::new(xcrun).arg("clang"))?;
    if !captured.success && captured.combined().contains("license") {
        return Err(PreflightError::LicenseNotAccepted);
    }

    Ok(())
}

/// Check if installation root already holds a fetched source tree.
pub fn is_bootstrapped(root: &Path) -> bool {
    let pattern = format!(
        "{}/.git/*",
        Pattern::escape(root.to_string_lossy().as_ref())
    );

    match glob::glob(&pattern) {
        Ok(mut entries) => entries.any(|entry| entry.is_ok()),
        Err(error) => {
            debug!("bad bootstrap probe pattern {pattern:?}: {error}");
            false
        }
    }
}

/// Precondition failure types.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    /// Running as superuser.
    #[error("Don't run this as root!")]
    Superuser,

    /// Compiler license has not been accepted.
    #[error(
        "You have not agreed to the Xcode license.\n\
         Before running the installer again please agree to the license by opening\n\
         Xcode.app or running:\n    sudo xcodebuild -license"
    )]
    LicenseNotAccepted,

    /// Compiler probe could not be started.
    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = PreflightError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::testing,
        syscall::{testing::Recorder, Captured},
    };
    use nix::unistd::Uid;

    #[test]
    fn superuser_is_refused() {
        let mut identity = testing::context(Default::default(), Tools::default()).identity;
        assert!(refuse_superuser(&identity).is_ok());

        identity.uid = Uid::from_raw(0);
        assert!(matches!(
            refuse_superuser(&identity),
            Err(PreflightError::Superuser)
        ));
    }

    #[test]
    fn unaccepted_license_is_detected() {
        let syscall = Recorder::new().respond(
            "/usr/bin/xcrun clang",
            Captured::failure("Agreeing to the Xcode/iOS license requires admin privileges"),
        );
        assert!(matches!(
            check_license(&testing::tools(), &syscall),
            Err(PreflightError::LicenseNotAccepted)
        ));
    }

    #[test]
    fn license_mention_with_success_is_fine() {
        let syscall = Recorder::new().respond(
            "/usr/bin/xcrun clang",
            Captured::success("see license for details"),
        );
        assert!(check_license(&testing::tools(), &syscall).is_ok());

        let syscall = Recorder::new().respond(
            "/usr/bin/xcrun clang",
            Captured::failure("clang: error: no input files"),
        );
        assert!(check_license(&testing::tools(), &syscall).is_ok());
        assert!(check_license(&Tools::default(), &syscall).is_ok());
    }

    #[test]
    fn bootstrap_probe_looks_for_git_metadata() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        assert!(!is_bootstrapped(root.path()));

        std::fs::create_dir(root.path().join(".git"))?;
        assert!(!is_bootstrapped(root.path()));

        std::fs::write(root.path().join(".git").join("HEAD"), "ref: refs/heads/master\n")?;
        assert!(is_bootstrapped(root.path()));

        Ok(())
    }
}
