// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use localbrew::{
    bootstrap,
    config::{read_settings, Settings},
    path::default_settings_file,
    shutdown,
    syscall::System,
    terminal::Console,
    Context, CredentialGuard, Options,
};

use anyhow::Result;
use clap::Parser;
use std::{env, path::PathBuf, process::exit};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bootstrap a local package manager prefix, and install declared packages.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "localbrew [options]",
    version
)]
struct Cli {
    /// Fetch full history instead of a shallow clone.
    #[arg(long)]
    pub full: bool,

    /// Installation root to bootstrap.
    #[arg(short, long, value_name = "path")]
    pub prefix: Option<PathBuf>,

    /// Package manifest to install from.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Settings file to use instead of the default one.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Change permissions without asking first.
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            full_history: self.full || env::var_os("HOMEBREW_DEVELOPER").is_some(),
            assume_yes: self.yes,
            git_override: env::var_os("GIT").map(PathBuf::from),
        }
    }

    fn run(self) -> Result<()> {
        let options = self.options();
        let mut settings = load_settings(self.config)?;
        if let Some(prefix) = self.prefix {
            settings.prefix = prefix;
        }
        if let Some(manifest) = self.manifest {
            settings.manifest = manifest;
        }

        let syscall = System;
        let context = Context::detect(settings, options, &syscall)?;
        shutdown::install(&context)?;

        // INVARIANT: Guard drops on every path out of this scope, before exit.
        let _guard = CredentialGuard::new(&context, &syscall);
        bootstrap(&context, &syscall, &Console)?;

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_settings(explicit: Option<PathBuf>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Ok(read_settings(path)?);
    }

    let path = default_settings_file()?;
    if !path.is_file() {
        debug!("no settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    Ok(read_settings(path)?)
}
