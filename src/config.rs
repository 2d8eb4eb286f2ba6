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

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_DIR: &str = "/etc/uni-sync";
pub const CONFIG_FILE: &str = "uni-sync.json";
pub const CURVES_FILE: &str = "fan_curves.json";

/// Wire-format channel mode of `uni-sync.json`. The external `uni-sync`
/// binary parses these exact strings, so no third variant is added here;
/// curve control is expressed as `Manual` plus a curve table entry and
/// surfaced through [`ChannelState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    Manual,
    #[serde(rename = "PWM")]
    Pwm,
}

fn default_mode() -> ChannelMode {
    ChannelMode::Manual
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default = "default_mode")]
    pub mode: ChannelMode,
    #[serde(default)]
    pub speed: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub device_id: String,
    pub sync_rgb: bool,
    pub channels: Vec<Channel>,
}

/// The shared configuration document, owned jointly with the `uni-sync`
/// binary and the curve editor. Unknown fields are preserved by neither
/// side in practice; this models the full document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    pub configs: Vec<Controller>,
}

/// One control point, serialized as a `[temperature, speed]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, u8)", into = "(f64, u8)")]
pub struct CurvePoint {
    pub temp: f64,
    pub speed: u8,
}

impl From<(f64, u8)> for CurvePoint {
    fn from((temp, speed): (f64, u8)) -> Self {
        Self { temp, speed }
    }
}

impl From<CurvePoint> for (f64, u8) {
    fn from(p: CurvePoint) -> Self {
        (p.temp, p.speed)
    }
}

/// Curve document: `"<controller>-<channel>"` key to control points.
pub type CurveTable = BTreeMap<String, Vec<CurvePoint>>;

/// Composite key addressing one channel of one controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelKey {
    pub controller: usize,
    pub channel: usize,
}

impl FromStr for ChannelKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (controller, channel) = s.split_once('-').ok_or(())?;
        Ok(Self {
            controller: controller.parse().map_err(|_| ())?,
            channel: channel.parse().map_err(|_| ())?,
        })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.controller, self.channel)
    }
}

/// Effective control state of a channel once both documents are joined.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelState<'a> {
    /// Fixed speed, no curve entry.
    Manual(u8),
    /// Under hardware PWM control; never written by the daemon.
    Pwm,
    /// Manual on the wire, speed driven by these curve points.
    Curve(&'a [CurvePoint]),
}

impl FanConfig {
    pub fn channel(&self, key: ChannelKey) -> Option<&Channel> {
        self.configs.get(key.controller)?.channels.get(key.channel)
    }

    pub fn channel_mut(&mut self, key: ChannelKey) -> Option<&mut Channel> {
        self.configs
            .get_mut(key.controller)?
            .channels
            .get_mut(key.channel)
    }

    /// Join this document with the curve table. `None` when the key does
    /// not address an existing channel (stale curve entries stay inert).
    pub fn channel_state<'a>(
        &self,
        key: ChannelKey,
        curves: &'a CurveTable,
    ) -> Option<ChannelState<'a>> {
        let ch = self.channel(key)?;
        Some(match ch.mode {
            ChannelMode::Pwm => ChannelState::Pwm,
            ChannelMode::Manual => match curves.get(&key.to_string()) {
                Some(points) => ChannelState::Curve(points.as_slice()),
                None => ChannelState::Manual(ch.speed),
            },
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Paths of the two shared documents. Production code uses
/// [`Store::default`]; tests point it at a temp directory.
#[derive(Clone, Debug)]
pub struct Store {
    config_path: PathBuf,
    curves_path: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        Self::at_dir(Path::new(CONFIG_DIR))
    }
}

impl Store {
    pub fn at_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE),
            curves_path: dir.join(CURVES_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn curves_path(&self) -> &Path {
        &self.curves_path
    }

    /// Raw configuration bytes for fingerprinting. `None` when the file
    /// is missing or unreadable.
    pub fn read_config_bytes(&self) -> Option<Vec<u8>> {
        fs::read(&self.config_path).ok()
    }

    pub fn load_config(&self) -> Result<FanConfig, StoreError> {
        let raw = fs::read_to_string(&self.config_path)?;
        let cfg = serde_json::from_str(&strip_json_comments(&raw))?;
        Ok(cfg)
    }

    pub fn save_config(&self, cfg: &FanConfig) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&self.config_path, json.as_bytes())?;
        Ok(())
    }

    pub fn load_curves(&self) -> Result<CurveTable, StoreError> {
        let raw = fs::read_to_string(&self.curves_path)?;
        let table = serde_json::from_str(&strip_json_comments(&raw))?;
        Ok(table)
    }

    pub fn save_curves(&self, table: &CurveTable) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(table)?;
        write_atomic(&self.curves_path, json.as_bytes())?;
        Ok(())
    }

    /// Create an empty curve document if none exists yet. Existing
    /// content is never touched.
    pub fn ensure_curves_file(&self) -> Result<(), StoreError> {
        if !self.curves_path.exists() {
            write_atomic(&self.curves_path, b"{}")?;
        }
        Ok(())
    }
}

/// Write the whole document to a temp file in the same directory and
/// rename it into place, so concurrent readers see either the old or the
/// new content, never a partial write.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    // Best-effort 0644, same as the other collaborators expect
    let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644));
    fs::rename(&tmp, path)
}

/// Strip `//` and `/* */` comments so hand-annotated documents still
/// parse. Content inside string literals is left untouched.
fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == '/' && chars.peek() == Some(&'/') {
            for next in chars.by_ref() {
                if next == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = '\0';
            for next in chars.by_ref() {
                if prev == '*' && next == '/' {
                    break;
                }
                prev = next;
            }
        } else {
            out.push(c);
        }
    }
    out
}
