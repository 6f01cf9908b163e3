//! Fixed-offset decoder for Dynon EFIS and EMS serial frames.
//!
//! The avionics emit newline-terminated ASCII records of two exact lengths,
//! one per subsystem. [`EfisEmsDecoder`] selects the schema by length alone,
//! slices fields at fixed character offsets (see [`layout`]), converts units,
//! and merges each successful decode into the corresponding source cache.
//!
//! Format reference: FlightDEK-D180 Pilot's User Guide, rev H.

pub mod decoder;
pub mod error;
pub mod layout;

pub use decoder::{EfisEmsDecoder, SessionExtremes};
pub use error::{DecodeError, Result};
pub use layout::{EfisLayout, EmsLayout, AIRSPEED_CONVERSION_FACTOR, METERS_TO_YARDS};
