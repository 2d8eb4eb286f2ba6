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

//! Shared fixtures for unit tests.

use tempfile::TempDir;

use crate::config::{Channel, ChannelMode, Controller, FanConfig, Store};

/// Store rooted in a fresh temp directory. Keep the `TempDir` alive for
/// the duration of the test.
pub fn temp_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("create temp dir");
    let store = Store::at_dir(dir.path());
    (dir, store)
}

/// Two controllers: the first all-Manual (channel 0 typically curve
/// driven, channel 1 fixed at 50), the second with a PWM channel.
pub fn sample_config() -> FanConfig {
    FanConfig {
        configs: vec![
            Controller {
                device_id: "VID:3314/PID:41219/SN:123456".to_string(),
                sync_rgb: false,
                channels: vec![
                    Channel { mode: ChannelMode::Manual, speed: 30 },
                    Channel { mode: ChannelMode::Manual, speed: 50 },
                ],
            },
            Controller {
                device_id: "VID:3314/PID:41220/SN:654321".to_string(),
                sync_rgb: true,
                channels: vec![Channel { mode: ChannelMode::Pwm, speed: 0 }],
            },
        ],
    }
}
