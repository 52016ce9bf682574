// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Localbrew reads two documents. The __settings__ file is TOML and describes
//! where things go: the installation root, the cache directory, the upstream
//! repository, and explicit paths to external tools. The __manifest__ is JSON
//! and lists the packages to install once the package manager is in place.
//!
//! Both documents are parsed through [`FromStr`]. Reading them from disk is
//! handled by [`read_settings`] and [`read_manifest`].

use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

#[cfg(target_os = "macos")]
const DEFAULT_CACHE: &str = "/Library/Caches/Homebrew";

#[cfg(not(target_os = "macos"))]
const DEFAULT_CACHE: &str = "/var/cache/localbrew";

/// Settings layout.
///
/// Every key is optional. Missing keys take their default value. All path
/// values go through shell expansion, so `~/brew` or `$HOME/brew` work as
/// expected.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Installation root that receives the package manager source tree.
    pub prefix: PathBuf,

    /// System wide download cache of the package manager.
    pub cache: PathBuf,

    /// Upstream repository URL of the package manager.
    pub repository: String,

    /// Branch to fetch from upstream repository.
    pub branch: String,

    /// Administrative group that should own the installation.
    pub group: String,

    /// Path to package manifest.
    pub manifest: PathBuf,

    /// Explicit tool paths keyed by tool name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(".localbrew"),
            cache: PathBuf::from(DEFAULT_CACHE),
            repository: "https://github.com/Homebrew/homebrew".into(),
            branch: "master".into(),
            group: "admin".into(),
            manifest: PathBuf::from("localbrew.json"),
            tools: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// URL of tarball for configured branch.
    pub fn tarball_url(&self) -> String {
        format!(
            "{}/tarball/{}",
            self.repository.trim_end_matches('/'),
            self.branch
        )
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.prefix = expand(&settings.prefix)?;
        settings.cache = expand(&settings.cache)?;
        settings.manifest = expand(&settings.manifest)?;
        for path in settings.tools.values_mut() {
            *path = expand(path)?;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Package manifest layout.
///
/// ```json
/// { "require": { "git": [], "vim": ["HEAD", "with-lua"] } }
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Manifest {
    /// Packages to install in declaration order.
    pub require: Requirements,
}

impl FromStr for Manifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ConfigError::Manifest)
    }
}

/// Ordered listing of package requirements.
///
/// JSON objects are unordered by definition, but the manifest is consumed in
/// the order it was written. Thus, the listing is deserialized entry by entry
/// instead of through a map type.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Requirements(Vec<PackageRequirement>);

impl Requirements {
    pub fn new(requirements: impl IntoIterator<Item = PackageRequirement>) -> Self {
        Self(requirements.into_iter().collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageRequirement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Requirements {
    type Item = &'a PackageRequirement;
    type IntoIter = std::slice::Iter<'a, PackageRequirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'de> Deserialize<'de> for Requirements {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RequirementsVisitor;

        impl<'de> Visitor<'de> for RequirementsVisitor {
            type Value = Requirements;

            fn expecting(&self, fmt: &mut Formatter<'_>) -> FmtResult {
                fmt.write_str("a map of package names to option lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut requirements = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, options)) = map.next_entry::<String, Vec<String>>()? {
                    requirements.push(PackageRequirement { name, options });
                }

                Ok(Requirements(requirements))
            }
        }

        deserializer.deserialize_map(RequirementsVisitor)
    }
}

/// Package to install with its option tokens.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PackageRequirement {
    /// Name of package.
    pub name: String,

    /// Option names without leading dashes, in declaration order.
    pub options: Vec<String>,
}

impl PackageRequirement {
    pub fn new(
        name: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read settings file at target path.
///
/// # Errors
///
/// - Return [`ConfigError::Read`] if file cannot be read.
/// - Return [`ConfigError::Deserialize`] if file is not valid settings.
/// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
pub fn read_settings(path: impl AsRef<Path>) -> Result<Settings> {
    read(path.as_ref())?.parse()
}

/// Read package manifest at target path.
///
/// # Errors
///
/// - Return [`ConfigError::Read`] if file cannot be read.
/// - Return [`ConfigError::Manifest`] if file is not a valid manifest.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Manifest> {
    read(path.as_ref())?.parse()
}

fn read(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| ConfigError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to deserialize package manifest.
    #[error("invalid package manifest: {0}")]
    Manifest(#[source] serde_json::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
