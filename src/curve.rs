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

use std::cmp::Ordering;

use crate::config::CurvePoint;

/// Fallback speed when a channel has no usable curve points.
pub const FALLBACK_SPEED_PCT: u8 = 50;

/// Map a temperature to a target speed along a piecewise-linear curve.
///
/// Points are sorted by temperature before evaluation, so unsorted input
/// behaves the same as sorted input. At or below the coolest point the
/// coolest point's speed is returned. Interpolated values are truncated
/// toward zero to an integer percent.
///
/// At or above the hottest point this returns the COOLEST point's speed.
/// Deployed installations depend on that wrap-around, so it is kept and
/// pinned by a test.
/// TODO: confirm with controller owners whether past-the-end should hold
/// the hottest point's speed instead, then migrate both daemon and editor
/// together.
pub fn target_speed(points: &[CurvePoint], temp: f64) -> u8 {
    if points.is_empty() {
        return FALLBACK_SPEED_PCT;
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.temp.partial_cmp(&b.temp).unwrap_or(Ordering::Equal));

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    if temp <= first.temp {
        return first.speed;
    }
    if temp >= last.temp {
        return first.speed;
    }

    for w in sorted.windows(2) {
        let a = w[0];
        let b = w[1];
        if a.temp < temp && temp <= b.temp {
            let frac = (temp - a.temp) / (b.temp - a.temp);
            let v = a.speed as f64 + frac * (b.speed as f64 - a.speed as f64);
            return v as u8;
        }
    }

    last.speed
}
