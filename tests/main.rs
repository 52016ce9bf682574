// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use git2::{IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions};
use localbrew::{
    config::Settings,
    context::Identity,
    tools::{Tool, Tools},
    Context,
};
use nix::unistd::{Gid, Uid};
use std::path::{Path, PathBuf};

/// Upstream repository that localbrew fetches from.
pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub(crate) fn url(&self) -> String {
        let workdir = self.repo.workdir().unwrap_or(self.repo.path());
        format!("file://{}", workdir.display())
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<Oid> {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.as_ref().len() as u32,
            id: self.repo.blob(contents.as_ref().as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename
                .as_ref()
                .as_os_str()
                .to_string_lossy()
                .into_owned()
                .into_bytes(),
        };

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_ref().as_bytes())?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }
}

/// Context that fetches from target upstream into target root.
pub(crate) fn context(root: &Path, repository: impl Into<String>, tools: Tools) -> Context {
    Context {
        settings: Settings {
            prefix: root.to_path_buf(),
            repository: repository.into(),
            ..Settings::default()
        },
        tools,
        identity: Identity {
            uid: Uid::current(),
            user: "tester".into(),
            gid: Gid::current(),
            group: "tester".into(),
        },
        os_version: None,
        git_override: None,
        full_history: false,
        assume_yes: true,
    }
}

/// Archive tools replaced by programs with known exit status.
pub(crate) fn archive_tools(fetch: &str, extract: &str) -> Tools {
    Tools::from_iter([
        (Tool::Curl, PathBuf::from(fetch)),
        (Tool::Tar, PathBuf::from(extract)),
    ])
}
