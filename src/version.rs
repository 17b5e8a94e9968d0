//! 3ds Max version detection and compatibility rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 3ds Max 2015, the first release the engine runs on.
pub const MIN_SUPPORTED_RELEASE: u32 = 17000;

/// Newest release year the engine has been tested against. Later releases
/// get an advisory.
pub const DEFAULT_MAX_TESTED_YEAR: u32 = 2020;

/// `GET_MAX_RELEASE` from the 3ds Max SDK.
pub fn release_from_version_id(version_id: u32) -> u32 {
    (version_id >> 16) & 0xffff
}

/// Maps a release number to its marketing year, e.g. 17000 -> 2015.
pub fn year_from_release(release: u32) -> u32 {
    2000 + release.div_ceil(1000) - 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxVersion {
    pub version_id: u32,
    pub release: u32,
    pub year: u32,
}

impl MaxVersion {
    pub fn from_version_id(version_id: u32) -> Self {
        let release = release_from_version_id(version_id);
        Self {
            version_id,
            release,
            year: year_from_release(release),
        }
    }

    pub fn from_release(release: u32) -> Self {
        Self::from_version_id(release << 16)
    }

    pub fn compatibility(&self, max_tested_year: u32) -> Compatibility {
        if self.release < MIN_SUPPORTED_RELEASE {
            Compatibility::Unsupported
        } else if self.year > max_tested_year {
            Compatibility::Untested
        } else {
            Compatibility::Supported
        }
    }

    pub fn at_least_year(&self, year: u32) -> bool {
        self.year >= year
    }
}

impl fmt::Display for MaxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "3ds Max {} (release {})", self.year, self.release)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Supported,
    /// Older than [`MIN_SUPPORTED_RELEASE`]. The engine warns and carries on
    /// unsupported.
    Unsupported,
    /// Newer than the last tested year.
    Untested,
}

/// Optional host APIs that only exist from some release onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PanelDocking,
    MenuPostLoadNotification,
    WidgetAttach,
}

impl Capability {
    /// First release year that ships the API.
    pub fn min_year(&self) -> u32 {
        match self {
            Capability::PanelDocking => 2017,
            Capability::MenuPostLoadNotification => 2016,
            Capability::WidgetAttach => 2017,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::PanelDocking => "panel docking",
            Capability::MenuPostLoadNotification => "post-load menu notifications",
            Capability::WidgetAttach => "direct widget attachment",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
