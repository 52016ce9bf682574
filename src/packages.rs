// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package installation.
//!
//! Each package in the manifest is reinstalled through the package manager
//! once, in declaration order. Option names from the manifest become long
//! flags, so `["HEAD", "devel"]` turns into `--HEAD --devel`.

use crate::{
    config::{Manifest, PackageRequirement},
    syscall::{Invocation, Syscall},
};

use std::{ffi::OsString, path::Path};
use tracing::{info, instrument};

/// Arguments handed to the package manager for one package.
pub fn reinstall_args(requirement: &PackageRequirement) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["reinstall".into(), requirement.name.clone().into()];
    args.extend(
        requirement
            .options
            .iter()
            .map(|option| OsString::from(format!("--{option}"))),
    );

    args
}

/// Reinstall every package in manifest.
///
/// # Errors
///
/// - Return [`crate::syscall::SyscallError`] for the first package that
///   fails. Later packages are not attempted.
#[instrument(skip(manifest, syscall), level = "debug")]
pub fn install_all(
    package_manager: &Path,
    manifest: &Manifest,
    syscall: &impl Syscall,
) -> crate::syscall::Result<()> {
    if manifest.require.is_empty() {
        info!("==> No packages to install");
        return Ok(());
    }

    let total = manifest.require.len();
    for (index, requirement) in manifest.require.iter().enumerate() {
        info!("==> [{}/{total}] {}", index + 1, requirement.name);
        syscall.run(&Invocation::new(package_manager).args(reinstall_args(requirement)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Requirements,
        syscall::{testing::Recorder, SyscallError},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn options_become_long_flags_in_order() {
        let args = reinstall_args(&PackageRequirement::new("foo", ["HEAD", "devel"]));
        assert_eq!(args, vec!["reinstall", "foo", "--HEAD", "--devel"]);

        let args = reinstall_args(&PackageRequirement::new("bar", Vec::<String>::new()));
        assert_eq!(args, vec!["reinstall", "bar"]);
    }

    #[test]
    fn packages_install_in_declaration_order() -> anyhow::Result<()> {
        let manifest: Manifest =
            r#"{ "require": { "zsh": [], "foo": ["HEAD", "devel"] } }"#.parse()?;
        let syscall = Recorder::new();

        install_all(Path::new("/opt/brew/bin/brew"), &manifest, &syscall)?;
        assert_eq!(
            syscall.calls(),
            vec![
                "/opt/brew/bin/brew reinstall zsh",
                "/opt/brew/bin/brew reinstall foo --HEAD --devel",
            ]
        );

        Ok(())
    }

    #[test]
    fn empty_manifest_installs_nothing() -> anyhow::Result<()> {
        let manifest: Manifest = r#"{ "require": {} }"#.parse()?;
        let syscall = Recorder::new();

        install_all(Path::new("brew"), &manifest, &syscall)?;
        assert_eq!(syscall.calls(), Vec::<String>::new());

        Ok(())
    }

    #[test]
    fn first_failure_stops_the_batch() {
        let manifest = Manifest {
            require: Requirements::new([
                PackageRequirement::new("git", Vec::<String>::new()),
                PackageRequirement::new("broken", Vec::<String>::new()),
                PackageRequirement::new("vim", Vec::<String>::new()),
            ]),
        };
        let syscall = Recorder::new().fail_on("broken");

        let result = install_all(Path::new("brew"), &manifest, &syscall);
        assert!(matches!(result, Err(SyscallError::Failed { .. })));
        assert_eq!(syscall.calls().len(), 2);
    }
}
