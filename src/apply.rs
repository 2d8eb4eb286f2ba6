/*
 * This file is part of Uni-Curved.
 *
 * Copyright (C) 2026 Uni-Curved contributors
 *
 * Uni-Curved is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Uni-Curved is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Uni-Curved. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Well-known install locations of the `uni-sync` binary, checked before
/// falling back to a `$PATH` search.
const SYSTEM_PATHS: &[&str] = &[
    "/usr/local/sbin/uni-sync",
    "/usr/bin/uni-sync",
    "/usr/sbin/uni-sync",
];

/// Pushes the on-disk configuration out to the controllers.
#[cfg_attr(test, automock)]
pub trait FanApplier {
    /// Fire-and-forget: the command's outcome is not inspected.
    fn apply(&self);
}

/// Production applier: re-runs the external `uni-sync` binary, which
/// reads `uni-sync.json` itself and programs the hardware.
pub struct UniSyncCommand {
    binary: PathBuf,
}

impl UniSyncCommand {
    /// Resolve the binary from the known locations, then `$PATH`. Falls
    /// back to the bare name so a late install still gets picked up.
    pub fn locate() -> Self {
        for candidate in SYSTEM_PATHS {
            if Path::new(candidate).exists() {
                return Self { binary: PathBuf::from(candidate) };
            }
        }
        if let Some(found) = search_path("uni-sync") {
            return Self { binary: found };
        }
        warn!("uni-sync binary not found yet, will invoke by name");
        Self { binary: PathBuf::from("uni-sync") }
    }

    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl FanApplier for UniSyncCommand {
    fn apply(&self) {
        debug!(command = %self.binary.display(), "invoking apply command");
        // Waiting reaps the child; the status itself is ignored
        match Command::new(&self.binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => debug!(?status, "apply command finished"),
            Err(e) => warn!(error = %e, "could not run apply command"),
        }
    }
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
}
