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

//! Temperature-driven fan control for Lian Li Uni-Sync controllers.
//!
//! The daemon watches `/etc/uni-sync/uni-sync.json` for external edits,
//! samples system temperatures, maps them to target speeds through
//! per-channel piecewise-linear curves in `fan_curves.json`, and invokes
//! the `uni-sync` binary to push updated speeds to the hardware.

pub mod apply;
pub mod config;
pub mod curve;
pub mod daemon;
pub mod fingerprint;
pub mod sensors;
pub mod service;

#[cfg(test)]
pub mod test_utils;
