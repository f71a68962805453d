//! Scenario replay
//!
//! Drives an [`Engine`] from a [`Scenario`] the way a device would: sensor
//! events are delivered when their time comes, and the engine is ticked at
//! the scenario's frame interval. Time is either simulated (as fast as
//! possible) or taken from a tokio interval.
//!
//! Output is one JSON object per line:
//!
//! | `record`         | When |
//! |------------------|------|
//! | `frame`          | placements changed during a tick |
//! | `reloaded`       | the engine serviced a reload |
//! | `locationSearch` | still no usable location fix |
//! | `capability`     | motion or location could not be started |

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use geolens_core::engine::{Engine, EngineEvent, LocationSource, MotionSource};
use geolens_core::location::{GeoLocation, LocationFix};
use geolens_core::orientation::{CompassReading, InterfaceOrientation, MotionSample};
use geolens_core::projector::ReloadKind;
use geolens_core::{Capability, GeolensError, TargetId};
use serde::Serialize;

use crate::scenario::{Scenario, ScenarioEvent, ViewportSpec};
use crate::surface::{LabelFactory, RecordingSurface};

/// Holds the latest motion sample; the engine reads it every tick
#[derive(Debug, Default)]
pub struct ScriptedMotion {
    available: bool,
    current: Option<MotionSample>,
}

impl MotionSource for ScriptedMotion {
    fn is_available(&self) -> bool {
        self.available
    }

    fn sample(&mut self) -> Option<MotionSample> {
        self.current
    }
}

#[derive(Debug, Default)]
pub struct ScriptedLocation {
    available: bool,
    running: bool,
}

impl LocationSource for ScriptedLocation {
    fn start_updates(&mut self) -> Result<(), GeolensError> {
        if !self.available {
            return Err(GeolensError::CapabilityUnavailable(
                Capability::Location,
                "disabled by scenario".to_string(),
            ));
        }
        self.running = true;
        Ok(())
    }

    fn stop_updates(&mut self) {
        self.running = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub id: TargetId,
    pub title: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub hidden: bool,
    pub distance: f64,
    pub azimuth: f64,
    pub level: usize,
}

/// One output line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "camelCase")]
pub enum Record {
    #[serde(rename_all = "camelCase")]
    Frame {
        t: u64,
        heading: f64,
        pitch: f64,
        markers: Vec<MarkerRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Reloaded {
        t: u64,
        kind: ReloadKind,
        recomputed: bool,
        active: usize,
    },
    #[serde(rename_all = "camelCase")]
    LocationSearch {
        t: u64,
        elapsed_ms: u64,
        fix_received: bool,
    },
    Capability { t: u64, error: String },
}

pub struct Replay {
    scenario: Scenario,
    engine: Engine,
    motion: ScriptedMotion,
    location: ScriptedLocation,
    factory: LabelFactory,
    surface: RecordingSurface,
    orientation: InterfaceOrientation,
    next_event: usize,
}

impl Replay {
    pub fn new(scenario: Scenario) -> anyhow::Result<Self> {
        let mut engine = Engine::new(scenario.config.clone()).context("Invalid engine configuration")?;
        let mut factory = LabelFactory::new();

        engine.set_interface_orientation(scenario.orientation);
        apply_viewport(&mut engine, &scenario.viewport)?;
        engine.set_targets(scenario.initial_targets(), &mut factory);

        Ok(Replay {
            motion: ScriptedMotion {
                available: scenario.motion_available,
                current: None,
            },
            location: ScriptedLocation {
                available: scenario.location_available,
                running: false,
            },
            orientation: scenario.orientation,
            engine,
            factory,
            surface: RecordingSurface::new(),
            next_event: 0,
            scenario,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn surface(&self) -> &RecordingSurface {
        &self.surface
    }

    pub fn factory(&self) -> &LabelFactory {
        &self.factory
    }

    pub fn tick_ms(&self) -> u64 {
        self.scenario.tick_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.scenario.duration_ms()
    }

    /// Start the engine. A missing capability is reported as a record, not
    /// an error, so the replay can still show what happens without it.
    pub fn start(&mut self, now_ms: u64) -> Vec<Record> {
        match self.engine.start(now_ms, &self.motion, &mut self.location) {
            Ok(()) => Vec::new(),
            Err(err) => {
                log::warn!("Engine did not start: {}", err);
                vec![Record::Capability {
                    t: now_ms,
                    error: err.to_string(),
                }]
            }
        }
    }

    fn apply(&mut self, event: ScenarioEvent, now_ms: u64) -> anyhow::Result<()> {
        if let Some(sample) = event.motion_sample(self.orientation) {
            self.motion.current = Some(sample);
            return Ok(());
        }
        match event {
            ScenarioEvent::Fix {
                latitude,
                longitude,
                accuracy,
                age_ms,
            } => {
                let fix = LocationFix::new(
                    GeoLocation::new(latitude, longitude),
                    accuracy,
                    now_ms.saturating_sub(age_ms),
                );
                let outcome = self.engine.handle_location_fix(&fix, now_ms);
                log::debug!("Fix {:.6},{:.6} at {} ms: {:?}", latitude, longitude, now_ms, outcome);
            }
            ScenarioEvent::Compass {
                true_heading,
                accuracy,
            } => self.engine.handle_compass(&CompassReading {
                true_heading,
                accuracy,
            }),
            ScenarioEvent::Orientation { orientation } => {
                self.orientation = orientation;
                self.engine.set_interface_orientation(orientation);
                apply_viewport(&mut self.engine, &self.scenario.viewport)?;
            }
            ScenarioEvent::Targets { targets } => {
                let targets = targets.iter().map(|t| t.to_target()).collect();
                self.engine.set_targets(targets, &mut self.factory);
            }
            ScenarioEvent::Stop => self.engine.stop(&mut self.location),
            ScenarioEvent::Pose { .. } | ScenarioEvent::Motion { .. } => {}
        }
        Ok(())
    }

    /// Deliver the events due at `now_ms`, tick the engine and collect
    /// the output records
    pub fn step(&mut self, now_ms: u64) -> anyhow::Result<Vec<Record>> {
        while let Some(timed) = self.scenario.events.get(self.next_event) {
            if timed.at_ms > now_ms {
                break;
            }
            let event = timed.event.clone();
            self.next_event += 1;
            self.apply(event, now_ms)?;
        }

        let mut records = Vec::new();
        let events = self
            .engine
            .tick(now_ms, &mut self.motion, &mut self.factory, &mut self.surface);
        for event in events {
            records.push(match event {
                EngineEvent::LocationSearch {
                    elapsed_ms,
                    fix_received,
                } => Record::LocationSearch {
                    t: now_ms,
                    elapsed_ms,
                    fix_received,
                },
                EngineEvent::Reloaded(outcome) => Record::Reloaded {
                    t: now_ms,
                    kind: outcome.kind,
                    recomputed: outcome.recomputed,
                    active: outcome.active,
                },
            });
        }

        if self.surface.take_changed() {
            records.push(self.frame(now_ms));
        }
        Ok(records)
    }

    fn frame(&self, now_ms: u64) -> Record {
        let projector = self.engine.projector();
        let markers = self
            .surface
            .placements()
            .filter_map(|(id, placement)| {
                let target = projector.target(id)?;
                Some(MarkerRecord {
                    id: *id,
                    title: target.title.clone(),
                    x: placement.frame.x,
                    y: placement.frame.y,
                    width: placement.frame.width,
                    height: placement.frame.height,
                    hidden: placement.hidden,
                    distance: target.distance_from_user(),
                    azimuth: target.azimuth(),
                    level: target.vertical_level(),
                })
            })
            .collect();
        let status = self.engine.status();
        Record::Frame {
            t: now_ms,
            heading: status.heading(),
            pitch: status.pitch(),
            markers,
        }
    }

    /// Replay on simulated time. Returns the number of records written.
    pub fn run_simulated<W: Write>(&mut self, out: &mut W) -> anyhow::Result<usize> {
        let mut written = write_records(out, &self.start(0))?;
        let duration = self.duration_ms();
        let mut now_ms = 0;
        while now_ms <= duration {
            written += write_records(out, &self.step(now_ms)?)?;
            now_ms += self.tick_ms();
        }
        log::info!("Replayed {} ms in {} records", duration, written);
        Ok(written)
    }

    /// Replay against the wall clock, one tick per scenario frame interval
    pub async fn run_realtime<W: Write>(&mut self, out: &mut W) -> anyhow::Result<usize> {
        let started = tokio::time::Instant::now();
        let mut written = write_records(out, &self.start(0))?;
        let duration = self.duration_ms();

        let mut interval = tokio::time::interval(Duration::from_millis(self.tick_ms()));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let now_ms = started.elapsed().as_millis() as u64;
            if now_ms > duration {
                break;
            }
            written += write_records(out, &self.step(now_ms)?)?;
            out.flush()?;
        }
        log::info!("Replayed {} ms in real time, {} records", duration, written);
        Ok(written)
    }
}

fn apply_viewport(engine: &mut Engine, spec: &ViewportSpec) -> anyhow::Result<()> {
    let applied = match (spec.horizontal_fov, spec.vertical_fov) {
        (Some(horizontal), Some(vertical)) => {
            engine.set_field_of_view(spec.viewport(), horizontal, vertical)
        }
        _ => engine.set_viewport(spec.viewport(), spec.camera_fov.unwrap_or(60.0)),
    };
    if !applied {
        anyhow::bail!("Unusable viewport {:?}", spec);
    }
    Ok(())
}

fn write_records<W: Write>(out: &mut W, records: &[Record]) -> anyhow::Result<usize> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(extra_events: &str) -> Scenario {
        let json = format!(
            r#"{{
                "viewport": {{ "width": 400, "height": 600, "horizontalFov": 40, "verticalFov": 60 }},
                "targets": [
                    {{ "id": 1, "title": "Tower", "latitude": 45.001, "longitude": 18.0 }},
                    {{ "id": 2, "title": "Lighthouse", "latitude": 44.999, "longitude": 18.0 }}
                ],
                "events": [
                    {{ "atMs": 0, "type": "pose", "heading": 0 }},
                    {{ "atMs": 100, "type": "fix", "latitude": 45.0, "longitude": 18.0, "accuracy": 5 }}
                    {}
                ],
                "tickMs": 50,
                "durationMs": 1000
            }}"#,
            extra_events
        );
        Scenario::from_json(&json).unwrap()
    }

    fn parse(output: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_simulated_replay_places_marker_ahead() {
        let mut replay = Replay::new(scenario("")).unwrap();
        let mut out = Vec::new();
        replay.run_simulated(&mut out).unwrap();
        let records = parse(&out);

        let reload = records.iter().find(|r| r["record"] == "reloaded").unwrap();
        assert_eq!(reload["t"], 100);
        assert_eq!(reload["kind"], "annotationsChanged");

        let frame = records.iter().find(|r| r["record"] == "frame").unwrap();
        let markers = frame["markers"].as_array().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0]["id"], 1);
        assert_eq!(markers[0]["title"], "Tower");

        // Only the marker in front is attached; both have views
        assert_eq!(replay.surface().attached(), 1);
        assert_eq!(replay.factory().live(), 2);
    }

    #[test]
    fn test_turning_around_swaps_markers() {
        let mut replay =
            Replay::new(scenario(r#", { "atMs": 500, "type": "pose", "heading": 180 }"#)).unwrap();
        let mut out = Vec::new();
        replay.run_simulated(&mut out).unwrap();

        let last = parse(&out)
            .into_iter()
            .filter(|r| r["record"] == "frame")
            .last()
            .unwrap();
        assert_eq!(last["markers"][0]["id"], 2);
        assert!((last["heading"].as_f64().unwrap() - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_motion_is_reported() {
        let mut scenario = scenario("");
        scenario.motion_available = false;
        let mut replay = Replay::new(scenario).unwrap();
        let records = replay.start(0);
        assert!(matches!(records.as_slice(), [Record::Capability { .. }]));
        assert!(!replay.engine().is_running());
    }

    #[test]
    fn test_stop_event_ends_tracking() {
        let mut replay =
            Replay::new(scenario(r#", { "atMs": 200, "type": "stop" }"#)).unwrap();
        replay.start(0);
        replay.step(0).unwrap();
        replay.step(200).unwrap();
        assert!(!replay.engine().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_replay_finishes() {
        let mut replay = Replay::new(scenario("")).unwrap();
        let mut out = Vec::new();
        let written = replay.run_realtime(&mut out).await.unwrap();
        assert!(written > 0);
        assert_eq!(replay.surface().attached(), 1);
    }
}
