//! Feed loops and view assembly for Dynon serial telemetry.
//!
//! One [`FeedLoop`] owns one serial link and pumps its frames into the
//! shared decoder; [`snapshot`] flattens whatever the caches currently hold
//! into a single JSON view for serving.

pub mod run;
pub mod snapshot;

pub use run::FeedLoop;
pub use snapshot::{snapshot, SERVICE_LABEL};
