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

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

#[cfg(test)]
use mockall::automock;

const THERMAL_DIR: &str = "/sys/class/thermal";

/// Wall-clock budget for one vendor tool invocation. A wedged tool must
/// not stall the control loop past one tick.
const VENDOR_TOOL_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of the temperature driving curve evaluation.
#[cfg_attr(test, automock)]
pub trait TemperatureSource {
    /// Hottest temperature in degrees Celsius across all readable
    /// sources, or `None` when nothing produced a reading.
    fn read(&self) -> Option<f64>;
}

/// Production reader: kernel thermal zones plus the NVIDIA vendor tool.
pub struct SensorReader {
    thermal_zones: Vec<PathBuf>,
    use_nvidia_smi: bool,
}

impl SensorReader {
    pub fn system() -> Self {
        Self {
            thermal_zones: discover_thermal_zones(Path::new(THERMAL_DIR)),
            use_nvidia_smi: true,
        }
    }

    #[cfg(test)]
    fn with_zones(thermal_zones: Vec<PathBuf>) -> Self {
        Self { thermal_zones, use_nvidia_smi: false }
    }
}

impl TemperatureSource for SensorReader {
    fn read(&self) -> Option<f64> {
        let mut hottest: Option<f64> = None;
        for zone in &self.thermal_zones {
            if let Some(t) = read_thermal_zone(zone) {
                hottest = Some(hottest.map_or(t, |h| h.max(t)));
            }
        }
        if self.use_nvidia_smi {
            if let Some(t) = read_nvidia_smi() {
                hottest = Some(hottest.map_or(t, |h| h.max(t)));
            }
        }
        hottest
    }
}

fn discover_thermal_zones(dir: &Path) -> Vec<PathBuf> {
    let mut zones = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return zones;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("thermal_zone") {
            zones.push(entry.path().join("temp"));
        }
    }
    zones.sort();
    zones
}

/// Thermal zone files report millidegrees Celsius.
fn read_thermal_zone(path: &Path) -> Option<f64> {
    let raw = fs::read_to_string(path).ok()?;
    let millidegrees: i64 = raw.trim().parse().ok()?;
    Some(millidegrees as f64 / 1000.0)
}

fn read_nvidia_smi() -> Option<f64> {
    let mut cmd = Command::new("nvidia-smi");
    cmd.args(["--query-gpu=temperature.gpu", "--format=csv,noheader"]);
    let output = run_with_timeout(cmd, VENDOR_TOOL_TIMEOUT)?;
    if !output.status.success() {
        debug!(status = ?output.status, "nvidia-smi exited unsuccessfully");
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // One line per GPU; take the hottest
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
}

/// Run a command with a bounded wait, killing the child on timeout.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Option<std::process::Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().ok(),
            Ok(None) => {
                if Instant::now() >= deadline {
                    debug!("vendor tool timed out, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                debug!(error = %e, "failed to poll vendor tool");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }
}
