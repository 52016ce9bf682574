// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap a local package manager installation.
//!
//! Localbrew prepares an installation root for the package manager, makes
//! sure the root and the system cache are writable by the user and the
//! administrative group, makes sure a developer toolchain exists, fetches the
//! package manager's source tree, and finally installs every package listed
//! in a manifest.
//!
//! The whole run is one linear sequence of [stages](bootstrap). Every stage
//! converges, so a failed run is recovered by simply running again.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod packages;
pub mod path;
pub mod permissions;
pub mod preflight;
pub mod shutdown;
pub mod source;
pub mod syscall;
pub mod terminal;
pub mod toolchain;
pub mod tools;
pub mod version;

pub use bootstrap::{bootstrap, BootstrapError};
pub use context::{Context, Options};
pub use shutdown::CredentialGuard;
