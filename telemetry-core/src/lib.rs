//! Game-telemetry emission core: converts discrete in-game occurrences into structured,
//! session-tagged JSON records and ships them over one of several pluggable transports.
//! Everything except the hand-rolled framed-stream client (`telemetry_ws`) lives here: the
//! transport back-ends, the dispatcher, the record composer, session/sequence state, and the
//! public emission surface game code actually calls.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logging;
pub mod record;
pub mod session;
pub mod transport;

pub use api::*;
pub use config::{TelemetryConfig, TelemetryMode};
pub use dispatch::{init_telemetry, is_enabled, logging_fatal_handler, stop_telemetry, FatalHandler};
pub use event::{EnemyKind, EngineMobType, EventDescriptor, EventKind, Extra, ExtraValue, GameObject, ObjectKind, Position};
