use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dynonhud_decoder::EfisEmsDecoder;
use dynonhud_link::{PortOpener, SerialLink, SystemPortOpener};
use tracing::{info, warn};

/// Pause between hard-failure retries and between open attempts.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// The long-running control loop for one physical link.
///
/// Each cycle: read one line, offer it to both decoders (at most one matches
/// by length), garbage-collect both caches, and force a reconnect if the link
/// has gone idle. The loop never terminates; every failure degrades to a
/// short pause and a retry.
pub struct FeedLoop<O: PortOpener = SystemPortOpener> {
    link: SerialLink<O>,
    decoder: Arc<EfisEmsDecoder>,
}

impl<O: PortOpener> FeedLoop<O> {
    /// Create a loop reading `link` into the shared decoder.
    pub fn new(link: SerialLink<O>, decoder: Arc<EfisEmsDecoder>) -> Self {
        Self { link, decoder }
    }

    /// Run forever. Only process shutdown stops a feed.
    pub fn run(mut self) -> ! {
        loop {
            self.wait_for_link();
            while self.link.is_open() {
                self.cycle();
            }
            thread::sleep(RETRY_PAUSE);
        }
    }

    /// Block until the link holds an open handle.
    fn wait_for_link(&mut self) {
        while !self.link.is_open() {
            self.link.open();
            if !self.link.is_open() {
                thread::sleep(RETRY_PAUSE);
            }
        }
    }

    /// One read/decode/collect cycle. Decode failures are logged and
    /// swallowed — a torn frame must never stall the feed.
    pub fn cycle(&mut self) {
        let raw = self.link.read();

        if let Err(err) = self.decoder.decode_efis(&raw) {
            warn!(device = %self.link.device(), error = %err, "EFIS decode failed");
        }
        if let Err(err) = self.decoder.decode_ems(&raw) {
            warn!(device = %self.link.device(), error = %err, "EMS decode failed");
        }

        self.decoder.efis_cache().garbage_collect();
        self.decoder.ems_cache().garbage_collect();

        if self.link.is_time_to_reconnect() {
            info!(device = %self.link.device(), "link idle, forcing reconnect");
            self.link.start_reconnect();
        }
    }

    /// The link this loop owns (health inspection, tests).
    pub fn link(&self) -> &SerialLink<O> {
        &self.link
    }
}
