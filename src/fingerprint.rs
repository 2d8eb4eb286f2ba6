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

use sha2::{Digest, Sha256};

/// Identity of one observation of the configuration document.
///
/// `Missing` is distinct from every digest, so both disappearance and
/// reappearance of the file register as changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fingerprint {
    Missing,
    Content([u8; 32]),
}

impl Fingerprint {
    pub fn of(bytes: Option<&[u8]>) -> Self {
        match bytes {
            None => Fingerprint::Missing,
            Some(b) => {
                let mut hasher = Sha256::new();
                hasher.update(b);
                Fingerprint::Content(hasher.finalize().into())
            }
        }
    }
}

/// Detects external edits by comparing content fingerprints across ticks.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<Fingerprint>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current contents as the baseline without reporting a change.
    /// Used at startup and after the loop's own writes.
    pub fn prime(&mut self, bytes: Option<&[u8]>) {
        self.last = Some(Fingerprint::of(bytes));
    }

    /// Compare the contents against the last observation and remember them.
    /// Returns true when they differ. The very first observation only
    /// establishes the baseline.
    pub fn observe(&mut self, bytes: Option<&[u8]>) -> bool {
        let current = Fingerprint::of(bytes);
        let changed = self.last.map_or(false, |last| last != current);
        self.last = Some(current);
        changed
    }
}
