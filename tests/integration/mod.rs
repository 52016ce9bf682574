// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{archive_tools, context, RepoFixture};

use anyhow::Result;
use git2::Repository;
use localbrew::{
    source::{acquire, Acquisition, SourceError},
    syscall::System,
    tools::{discover_git, Tools},
};
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Every tracked file below root, excluding version-control metadata.
fn snapshot(root: &Path) -> Result<BTreeMap<PathBuf, String>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.file_name().is_some_and(|name| name == ".git") {
                continue;
            }

            if path.is_dir() {
                pending.push(path);
            } else {
                files.insert(path.strip_prefix(root)?.to_path_buf(), fs::read_to_string(&path)?);
            }
        }
    }

    Ok(files)
}

fn head(root: &Path) -> Result<git2::Oid> {
    Ok(Repository::open(root)?.head()?.peel_to_commit()?.id())
}

#[test]
fn git_acquisition_converges_across_runs() -> Result<()> {
    let Some(git) = discover_git(None, &Tools::default(), &System) else {
        return Ok(());
    };

    let sandbox = tempfile::tempdir()?;
    let upstream = RepoFixture::new(sandbox.path().join("upstream"))?;
    upstream.stage_and_commit("README.md", "# brew\n")?;
    let tip = upstream.stage_and_commit("bin/brew", "#!/bin/sh\necho brew\n")?;

    let root = sandbox.path().join("root");
    fs::create_dir_all(&root)?;
    let context = context(&root, upstream.url(), Tools::default());
    let git = Some(git.as_path());

    let first = acquire(&context, git, &System)?;
    let files = snapshot(&root)?;
    assert_eq!(first, Acquisition::Git(tip));
    assert_eq!(files.get(Path::new("bin/brew")).map(String::as_str), Some("#!/bin/sh\necho brew\n"));

    let second = acquire(&context, git, &System)?;
    assert_eq!(second, first);
    assert_eq!(snapshot(&root)?, files);
    assert_eq!(head(&root)?, tip);

    Ok(())
}

#[test]
fn git_acquisition_restores_modified_tree() -> Result<()> {
    let Some(git) = discover_git(None, &Tools::default(), &System) else {
        return Ok(());
    };

    let sandbox = tempfile::tempdir()?;
    let upstream = RepoFixture::new(sandbox.path().join("upstream"))?;
    upstream.stage_and_commit("README.md", "# brew\n")?;

    let root = sandbox.path().join("root");
    fs::create_dir_all(&root)?;
    let context = context(&root, upstream.url(), Tools::default());
    let git = Some(git.as_path());

    acquire(&context, git, &System)?;
    let files = snapshot(&root)?;
    fs::write(root.join("README.md"), "local edits\n")?;

    acquire(&context, git, &System)?;
    assert_eq!(snapshot(&root)?, files);

    Ok(())
}

#[test]
fn git_acquisition_picks_up_new_upstream_commits() -> Result<()> {
    let Some(git) = discover_git(None, &Tools::default(), &System) else {
        return Ok(());
    };

    let sandbox = tempfile::tempdir()?;
    let upstream = RepoFixture::new(sandbox.path().join("upstream"))?;
    upstream.stage_and_commit("README.md", "# brew\n")?;

    let root = sandbox.path().join("root");
    fs::create_dir_all(&root)?;
    let context = context(&root, upstream.url(), Tools::default());
    let git = Some(git.as_path());

    acquire(&context, git, &System)?;
    let tip = upstream.stage_and_commit("Library/formula.rb", "class Formula; end\n")?;

    assert_eq!(acquire(&context, git, &System)?, Acquisition::Git(tip));
    assert_eq!(
        fs::read_to_string(root.join("Library/formula.rb"))?,
        "class Formula; end\n"
    );

    Ok(())
}

#[test]
fn archive_pipeline_fails_on_either_side() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let root = sandbox.path();

    let failed_fetch = context(root, "https://localhost/brew", archive_tools("false", "true"));
    assert!(matches!(
        acquire(&failed_fetch, None, &System),
        Err(SourceError::Syscall(_))
    ));

    let failed_extract = context(root, "https://localhost/brew", archive_tools("true", "false"));
    assert!(matches!(
        acquire(&failed_extract, None, &System),
        Err(SourceError::Syscall(_))
    ));

    let succeeded = context(root, "https://localhost/brew", archive_tools("true", "true"));
    assert_eq!(acquire(&succeeded, None, &System)?, Acquisition::Archive);

    Ok(())
}
