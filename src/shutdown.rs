// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Credential invalidation on exit.
//!
//! Elevated stages leave the elevation tool's credential cache warm. It must
//! be invalidated however localbrew exits:
//!
//! - Normal return or error: [`CredentialGuard`] drops.
//! - Interrupt or termination signal: [`watch_termination`] invalidates and
//!   exits with the conventional `128 + signal` status.
//! - Panic: [`invalidate_on_panic`] hooks in before the process aborts.

use crate::{
    context::Context,
    syscall::{Invocation, Syscall, System},
    tools::Tool,
};

use std::{
    panic,
    path::{Path, PathBuf},
    process, thread,
};
use tokio::{
    runtime::Builder,
    signal::unix::{signal, SignalKind},
};
use tracing::{debug, warn};

/// Exit status after an interrupt signal.
pub const INTERRUPTED: i32 = 130;

/// Exit status after a termination signal.
pub const TERMINATED: i32 = 143;

/// Make the elevation tool forget cached credentials.
///
/// Failure is logged and otherwise ignored, because this only ever runs on
/// the way out.
pub fn invalidate_credentials(elevator: &Path, syscall: &impl Syscall) {
    if let Err(error) = syscall.run(&Invocation::new(elevator).arg("-k")) {
        debug!("failed to invalidate elevation credentials: {error}");
    }
}

/// Install every exit hook for the elevation tool of target context.
///
/// # Errors
///
/// - Return [`std::io::Error`] if signal handlers cannot be registered.
pub fn install(context: &Context) -> std::io::Result<()> {
    let elevator = elevator(context);
    invalidate_on_panic(elevator.clone());
    watch_termination(elevator)
}

/// Invalidate credentials, then exit, on interrupt or termination.
///
/// Signals are waited on by a background thread, so the main thread stays
/// fully synchronous.
///
/// # Errors
///
/// - Return [`std::io::Error`] if signal handlers cannot be registered.
pub fn watch_termination(elevator: Option<PathBuf>) -> std::io::Result<()> {
    let runtime = Builder::new_current_thread().enable_all().build()?;

    // INVARIANT: Register handlers before returning, so no signal slips by.
    let (mut interrupt, mut terminate) = {
        let _guard = runtime.enter();
        (
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
        )
    };

    thread::spawn(move || {
        let status = runtime.block_on(async {
            tokio::select! {
                _ = interrupt.recv() => INTERRUPTED,
                _ = terminate.recv() => TERMINATED,
            }
        });

        warn!("interrupted, invalidating elevation credentials");
        if let Some(elevator) = &elevator {
            invalidate_credentials(elevator, &System);
        }
        process::exit(status);
    });

    Ok(())
}

/// Invalidate credentials before the default panic hook runs.
pub fn invalidate_on_panic(elevator: Option<PathBuf>) {
    let default = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(elevator) = &elevator {
            invalidate_credentials(elevator, &System);
        }
        default(info);
    }));
}

/// Invalidate cached elevation credentials when dropped.
pub struct CredentialGuard<'a, S>
where
    S: Syscall,
{
    elevator: Option<PathBuf>,
    syscall: &'a S,
}

impl<'a, S> CredentialGuard<'a, S>
where
    S: Syscall,
{
    /// Construct new guard for the elevation tool of target context.
    pub fn new(context: &Context, syscall: &'a S) -> Self {
        Self {
            elevator: elevator(context),
            syscall,
        }
    }
}

impl<S> Drop for CredentialGuard<'_, S>
where
    S: Syscall,
{
    fn drop(&mut self) {
        if let Some(elevator) = &self.elevator {
            invalidate_credentials(elevator, self.syscall);
        }
    }
}

fn elevator(context: &Context) -> Option<PathBuf> {
    context.tools.get(Tool::Sudo).map(PathBuf::from)
}
