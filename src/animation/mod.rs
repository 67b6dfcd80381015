// src/animation/mod.rs
//! Resampling, orientation and the playback state machine

pub mod clock;
mod driver;
pub mod orientation;
pub mod playback;
pub mod resample;

pub use clock::{Clock, ManualClock, ManualTicker, Ticker, TokioClock, TokioTicker};
pub use driver::{Driver, DriverLock};
pub use playback::{PlaybackController, PlaybackEvent, PlaybackOptions, PlaybackState, PlaybackStatus, TickOutcome};
pub use resample::{resample, InterpolatedSequence};
