//! Bridge from Dynon EFIS/EMS serial feeds to an HTTP JSON status view.
//!
//! dynonhud reads the fixed-offset serial streams a FlightDEK-D180 (and the
//! D10/D100 family) emits, decodes them into named measurements, and serves
//! the combined, freshness-bounded result as JSON.
//!
//! # Crate Structure
//!
//! - [`link`] — Self-healing serial connection management
//! - [`decoder`] — Fixed-offset EFIS/EMS frame decoding
//! - [`cache`] — Time-bounded per-source telemetry caches
//! - [`feed`] — Per-link read/decode loops and the combined snapshot

/// Re-export link types.
pub mod link {
    pub use dynonhud_link::*;
}

/// Re-export decoder types.
pub mod decoder {
    pub use dynonhud_decoder::*;
}

/// Re-export cache types.
pub mod cache {
    pub use dynonhud_cache::*;
}

/// Re-export feed types.
pub mod feed {
    pub use dynonhud_feed::*;
}
