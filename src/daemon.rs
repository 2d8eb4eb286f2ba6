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

//! The control loop. Single-threaded and synchronous: one tick wakes
//! once per second, handles at most one trigger, and goes back to sleep.
//! Every fallible step is logged and swallowed here so a bad read or a
//! vanished file never takes the daemon down.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::apply::FanApplier;
use crate::config::{ChannelKey, ChannelState, Store};
use crate::curve;
use crate::fingerprint::ChangeDetector;
use crate::sensors::TemperatureSource;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const CURVE_REFRESH_PERIOD: Duration = Duration::from_secs(3);

/// What a single tick did. Exposed so tests can assert trigger selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No trigger fired.
    Idle,
    /// External edit detected; configuration re-applied as-is.
    ExternalApply,
    /// Curve refresh ran; `updated` channels got a new speed.
    CurveRefresh { updated: usize },
}

pub struct Daemon {
    store: Store,
    sensor: Box<dyn TemperatureSource>,
    applier: Box<dyn FanApplier>,
    detector: ChangeDetector,
    last_refresh: Option<Instant>,
}

impl Daemon {
    pub fn new(
        store: Store,
        sensor: Box<dyn TemperatureSource>,
        applier: Box<dyn FanApplier>,
    ) -> Self {
        Self {
            store,
            sensor,
            applier,
            detector: ChangeDetector::new(),
            last_refresh: None,
        }
    }

    /// Prepare on-disk state and baseline the fingerprint so pre-existing
    /// content does not count as an external edit.
    pub fn startup(&mut self) {
        if let Err(e) = self.store.ensure_curves_file() {
            warn!(error = %e, "could not create curve document");
        }
        let bytes = self.store.read_config_bytes();
        self.detector.prime(bytes.as_deref());
    }

    pub fn run(mut self) -> ! {
        info!(
            config = %self.store.config_path().display(),
            curves = %self.store.curves_path().display(),
            "control loop starting"
        );
        self.startup();
        loop {
            let outcome = self.tick(Instant::now());
            if outcome != TickOutcome::Idle {
                debug!(?outcome, "tick complete");
            }
            thread::sleep(TICK_INTERVAL);
        }
    }

    /// One tick. The immediate-apply trigger has priority and excludes
    /// curve work for this tick; curve refresh runs on its own cadence.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let bytes = self.store.read_config_bytes();
        if self.detector.observe(bytes.as_deref()) {
            info!("configuration edited externally, re-applying");
            self.applier.apply();
            return TickOutcome::ExternalApply;
        }

        let due = self
            .last_refresh
            .map_or(true, |t| now.duration_since(t) >= CURVE_REFRESH_PERIOD);
        if !due {
            return TickOutcome::Idle;
        }
        self.last_refresh = Some(now);
        TickOutcome::CurveRefresh { updated: self.refresh_curves() }
    }

    /// Re-evaluate every curve-driven channel at the current temperature
    /// and persist + apply once if anything changed. Returns the number
    /// of channels whose speed changed.
    fn refresh_curves(&mut self) -> usize {
        let curves = match self.store.load_curves() {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "curve document unavailable, skipping refresh");
                return 0;
            }
        };
        if curves.is_empty() {
            return 0;
        }
        let mut cfg = match self.store.load_config() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "configuration unreadable, skipping refresh");
                return 0;
            }
        };
        let Some(temp) = self.sensor.read() else {
            warn!("no temperature reading, skipping refresh");
            return 0;
        };

        let mut updated = 0;
        for raw_key in curves.keys() {
            let Ok(key) = raw_key.parse::<ChannelKey>() else {
                debug!(key = %raw_key, "ignoring malformed channel key");
                continue;
            };
            // Stale indices and PWM channels are skipped, never a fault
            let Some(ChannelState::Curve(points)) = cfg.channel_state(key, &curves) else {
                continue;
            };
            let target = curve::target_speed(points, temp);
            if let Some(ch) = cfg.channel_mut(key) {
                if ch.speed != target {
                    debug!(key = %key, old = ch.speed, new = target, temp, "channel speed updated");
                    ch.speed = target;
                    updated += 1;
                }
            }
        }

        if updated > 0 {
            match self.store.save_config(&cfg) {
                Ok(()) => {
                    self.applier.apply();
                    // Our own write must not register as an external edit
                    let bytes = self.store.read_config_bytes();
                    self.detector.prime(bytes.as_deref());
                    info!(updated, temp, "curve targets applied");
                }
                Err(e) => warn!(error = %e, "could not persist configuration"),
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::MockFanApplier;
    use crate::config::{ChannelMode, CurvePoint, CurveTable};
    use crate::sensors::MockTemperatureSource;
    use crate::test_utils::{sample_config, temp_store};
    use std::fs;

    fn curve_table(key: &str, pairs: &[(f64, u8)]) -> CurveTable {
        let mut table = CurveTable::new();
        table.insert(
            key.to_string(),
            pairs.iter().map(|&(temp, speed)| CurvePoint { temp, speed }).collect(),
        );
        table
    }

    fn daemon_with(
        store: Store,
        sensor: MockTemperatureSource,
        applier: MockFanApplier,
    ) -> Daemon {
        Daemon::new(store, Box::new(sensor), Box::new(applier))
    }

    #[test]
    fn test_three_ticks_write_and_apply_once() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(3).returning(|| Some(40.0));
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(1).return_const(());

        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();

        let t0 = Instant::now();
        assert_eq!(d.tick(t0), TickOutcome::CurveRefresh { updated: 1 });
        // Temperature is steady, so later refreshes compute the same
        // target and must not write or apply again
        assert_eq!(
            d.tick(t0 + CURVE_REFRESH_PERIOD),
            TickOutcome::CurveRefresh { updated: 0 }
        );
        assert_eq!(
            d.tick(t0 + 2 * CURVE_REFRESH_PERIOD),
            TickOutcome::CurveRefresh { updated: 0 }
        );

        // (20,10)..(60,80) at 40 degrees interpolates to 45
        let cfg = store.load_config().unwrap();
        assert_eq!(cfg.configs[0].channels[0].speed, 45);
    }

    #[test]
    fn test_refresh_waits_for_its_period() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(1).returning(|| Some(40.0));
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(1).return_const(());

        let mut d = daemon_with(store, sensor, applier);
        d.startup();

        let t0 = Instant::now();
        assert_eq!(d.tick(t0), TickOutcome::CurveRefresh { updated: 1 });
        assert_eq!(d.tick(t0 + TICK_INTERVAL), TickOutcome::Idle);
        assert_eq!(d.tick(t0 + 2 * TICK_INTERVAL), TickOutcome::Idle);
    }

    #[test]
    fn test_external_edit_preempts_curve_refresh() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        // The sensor must never be consulted on an external-edit tick
        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(0);
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(1).return_const(());

        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();

        let mut edited = sample_config();
        edited.configs[0].channels[1].speed = 77;
        store.save_config(&edited).unwrap();

        assert_eq!(d.tick(Instant::now()), TickOutcome::ExternalApply);
        // The edit is applied as-is, not overwritten by curve output
        assert_eq!(store.load_config().unwrap().configs[0].channels[1].speed, 77);
    }

    #[test]
    fn test_own_write_is_not_an_external_edit() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(2).returning(|| Some(40.0));
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(1).return_const(());

        let mut d = daemon_with(store, sensor, applier);
        d.startup();

        let t0 = Instant::now();
        assert_eq!(d.tick(t0), TickOutcome::CurveRefresh { updated: 1 });
        // Were the loop's own write fingerprinted as external, this tick
        // would be ExternalApply
        assert_eq!(
            d.tick(t0 + CURVE_REFRESH_PERIOD),
            TickOutcome::CurveRefresh { updated: 0 }
        );
    }

    #[test]
    fn test_pwm_channels_are_never_written() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        // Controller 1 channel 0 is PWM in the sample config
        store
            .save_curves(&curve_table("1-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(1).returning(|| Some(40.0));
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(0);

        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();

        assert_eq!(d.tick(Instant::now()), TickOutcome::CurveRefresh { updated: 0 });
        let cfg = store.load_config().unwrap();
        assert_eq!(cfg.configs[1].channels[0].mode, ChannelMode::Pwm);
        assert_eq!(cfg.configs[1].channels[0].speed, 0);
    }

    #[test]
    fn test_stale_and_malformed_keys_are_skipped() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        let mut table = curve_table("9-9", &[(20.0, 10), (60.0, 80)]);
        table.insert("not-a-key".into(), vec![CurvePoint { temp: 20.0, speed: 10 }]);
        store.save_curves(&table).unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(1).returning(|| Some(40.0));
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(0);

        let mut d = daemon_with(store, sensor, applier);
        d.startup();
        assert_eq!(d.tick(Instant::now()), TickOutcome::CurveRefresh { updated: 0 });
    }

    #[test]
    fn test_no_temperature_skips_refresh() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(1).returning(|| None);
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(0);

        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();
        assert_eq!(d.tick(Instant::now()), TickOutcome::CurveRefresh { updated: 0 });
        // Prior speeds survive untouched
        assert_eq!(store.load_config().unwrap(), sample_config());
    }

    #[test]
    fn test_malformed_config_triggers_apply_then_recovers() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(0);
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(1).return_const(());

        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();

        // A half-written external edit still changes the fingerprint
        fs::write(store.config_path(), b"{broken").unwrap();
        let t0 = Instant::now();
        assert_eq!(d.tick(t0), TickOutcome::ExternalApply);
        // Next due tick: parse fails, cycle is skipped, loop stays alive
        assert_eq!(
            d.tick(t0 + CURVE_REFRESH_PERIOD),
            TickOutcome::CurveRefresh { updated: 0 }
        );
    }

    #[test]
    fn test_missing_config_file_is_quiet() {
        let (_dir, store) = temp_store();
        // Curves exist but the configuration was never created
        store
            .save_curves(&curve_table("0-0", &[(20.0, 10), (60.0, 80)]))
            .unwrap();

        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read().times(0);
        let mut applier = MockFanApplier::new();
        applier.expect_apply().times(0);

        let mut d = daemon_with(store, sensor, applier);
        d.startup();
        assert_eq!(d.tick(Instant::now()), TickOutcome::CurveRefresh { updated: 0 });
    }

    #[test]
    fn test_startup_creates_curve_document() {
        let (_dir, store) = temp_store();
        store.save_config(&sample_config()).unwrap();

        let sensor = MockTemperatureSource::new();
        let applier = MockFanApplier::new();
        let mut d = daemon_with(store.clone(), sensor, applier);
        d.startup();

        assert!(store.curves_path().exists());
        assert!(store.load_curves().unwrap().is_empty());
    }
}
