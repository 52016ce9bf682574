// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator interaction.
//!
//! Localbrew blocks on the operator in two places: before it changes any
//! permissions, and while the developer tools installer runs in its own
//! window. Both read exactly one keypress from a terminal in raw mode. There
//! is no timeout.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::{info, warn};

/// Terminal held in raw mode.
///
/// Raw mode is restored when this guard drops, whichever way the holder
/// leaves its scope.
#[derive(Debug)]
pub struct RawMode {
    _private: (),
}

impl RawMode {
    /// Put terminal into raw mode.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if terminal mode cannot be changed.
    pub fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(error) = disable_raw_mode() {
            warn!("failed to restore terminal mode: {error}");
        }
    }
}

/// Block until a single key is pressed.
///
/// # Errors
///
/// - Return [`std::io::Error`] if terminal cannot be read.
pub fn read_key() -> std::io::Result<KeyEvent> {
    let _raw = RawMode::enable()?;
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

/// Check if key counts as RETURN.
///
/// Some terminals send a line feed instead of a carriage return, which raw
/// mode reports as Ctrl-J.
pub fn is_return(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Enter => true,
        KeyCode::Char('j') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Manual synchronization with whoever runs localbrew.
pub trait Operator {
    /// Wait for any key.
    fn pause(&self, message: &str) -> Result<()>;

    /// Continue on RETURN, abort on any other key.
    fn confirm(&self) -> Result<()>;
}

/// Operator sitting at the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Operator for Console {
    fn pause(&self, message: &str) -> Result<()> {
        info!("{message}");
        read_key()?;
        Ok(())
    }

    fn confirm(&self) -> Result<()> {
        info!("Press RETURN to continue or any other key to abort");
        let key = read_key()?;
        if !is_return(&key) {
            return Err(TerminalError::Aborted);
        }

        Ok(())
    }
}

/// Operator interaction error types.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    /// Operator declined to continue.
    #[error("aborted by operator")]
    Aborted,

    /// Terminal cannot be read from or configured.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = TerminalError> = std::result::Result<T, E>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_keys() {
        assert!(is_return(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(is_return(&KeyEvent::new(
            KeyCode::Char('j'),
            KeyModifiers::CONTROL
        )));
        assert!(!is_return(&KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE)));
        assert!(!is_return(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
    }
}
