// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Build and platform information.
//!
//! Commit, build date and compiler are stamped in by `build.rs`; the
//! platform is the one the binary runs on.

use serde::Serialize;
use std::fmt;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit the binary was built from, or `unknown`
pub const GIT_COMMIT: &str = env!("LBAAS_GIT_COMMIT");

/// RFC 3339 build timestamp
pub const BUILD_DATE: &str = env!("LBAAS_BUILD_DATE");

/// `rustc --version` of the compiler that built the binary
pub const RUSTC_VERSION: &str = env!("LBAAS_RUSTC_VERSION");

/// Text printed by `--version`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("LBAAS_GIT_COMMIT"),
    ", built ",
    env!("LBAAS_BUILD_DATE"),
    ", ",
    env!("LBAAS_RUSTC_VERSION"),
    ")"
);

/// Everything known about this build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_date: &'static str,
    pub rustc_version: &'static str,
    /// `os/arch`, e.g. `linux/x86_64`
    pub platform: String,
}

impl BuildInfo {
    #[must_use]
    pub fn get() -> Self {
        Self {
            version: VERSION,
            git_commit: GIT_COMMIT,
            build_date: BUILD_DATE,
            rustc_version: RUSTC_VERSION,
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (commit {}, built {}, {}, {})",
            self.version, self.git_commit, self.build_date, self.rustc_version, self.platform
        )
    }
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod version_tests;
