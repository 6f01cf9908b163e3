//! Self-healing serial link management for the Dynon telemetry feed.
//!
//! A [`SerialLink`] owns one physical serial device: it opens it, reads
//! newline-delimited frames within a bounded timeout, and tracks link health
//! to decide when a full reconnect is warranted. Failures never cross the
//! call boundary — they are logged, the handle is dropped, and the next cycle
//! retries.

pub mod error;
pub mod link;
pub mod port;

pub use error::{LinkError, Result};
pub use link::SerialLink;
pub use port::{LinkConfig, PortOpener, SystemPortOpener};
