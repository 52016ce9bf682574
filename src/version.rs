// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotted version numbers.
//!
//! Both the operating system gate and the version-control client gate compare
//! versions like "10.9" or "1.7.10". Comparison happens component by component
//! as integers, never as strings, so "10.10" orders after "10.9". The shorter
//! of two versions is padded with zeros, so "10.9" and "10.9.0" are equal.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Version made of non-negative integer components.
#[derive(Debug, Default, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Construct version from raw components.
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    fn part(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();
        if data.is_empty() {
            return Err(VersionError::Empty);
        }

        let parts = data
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| VersionError::Component {
                    component: part.to_string(),
                    version: data.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|index| self.part(index).cmp(&other.part(index)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let parts = self
            .parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        fmt.write_str(parts.join(".").as_str())
    }
}

/// Version parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// Nothing to parse.
    #[error("version string is empty")]
    Empty,

    /// Component is not a non-negative integer.
    #[error("invalid component {component:?} in version {version:?}")]
    Component { component: String, version: String },
}
