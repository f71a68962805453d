//! Geolens Core
//!
//! Platform-independent projection and layout engine for augmented-reality
//! overlays: geo-located targets are turned into screen positions for the
//! current device heading, pitch and location, and overlapping markers are
//! stacked or faded.
//!
//! The crate does no I/O and reads no clock. Sensor samples and the current
//! time are pushed in by the caller; markers come out through the
//! [`marker::ViewFactory`] and [`marker::RenderSurface`] traits.
//!
//! # Architecture
//!
//! - **angle**: angle normalization, smoothing filter, bearings
//! - **location**: coordinates, location fixes, great-circle distance
//! - **orientation**: gravity + attitude to filtered pitch and heading
//! - **device**: the shared [`device::DeviceStatus`] snapshot
//! - **tracker**: location fix filtering, report debounce, search watchdog
//! - **projector**: distances, visibility, nominal and per-frame positions
//! - **stacking**: overlap resolution strategies
//! - **engine**: one poll-driven pipeline over all of the above
//! - **config**: serde configuration tree
//!
//! # Usage
//!
//! ```rust,ignore
//! use geolens_core::{Engine, GeolensConfig, Target, GeoLocation, Viewport};
//!
//! let mut engine = Engine::new(GeolensConfig::from_json(&json)?)?;
//! engine.set_viewport(Viewport::new(390.0, 844.0), 60.0);
//! engine.set_targets(vec![Target::new(1, "Summit", GeoLocation::new(46.5, 13.8))], &mut factory);
//! engine.start(now_ms, &motion, &mut location)?;
//!
//! // Every display refresh
//! let events = engine.tick(now_ms, &mut motion, &mut factory, &mut surface);
//! ```

pub mod angle;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod location;
pub mod marker;
pub mod orientation;
pub mod projector;
pub mod stacking;
pub mod tracker;

pub use config::GeolensConfig;
pub use device::{DeviceStatus, Viewport};
pub use engine::{Engine, EngineEvent, LocationSource, MotionSource};
pub use error::{Capability, GeolensError};
pub use location::{GeoCoordinate, GeoLocation, LocationFix};
pub use marker::{MarkerView, Rect, RenderSurface, ViewFactory};
pub use orientation::{CompassReading, InterfaceOrientation, MotionSample};
pub use projector::{AnnotationProjector, ReloadKind, Target, TargetId};
pub use stacking::{StackingPolicy, StackingStrategy};
