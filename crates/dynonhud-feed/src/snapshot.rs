use dynonhud_decoder::EfisEmsDecoder;
use serde_json::{Map, Value};

/// Fixed label identifying this feed in every snapshot.
pub const SERVICE_LABEL: &str = "DynonToHud";

/// The combined situation picture served to the display client.
///
/// `Service` first, then whatever the EMS cache currently has, then whatever
/// the EFIS cache currently has — EFIS wins on key collisions because it is
/// merged last. A stale source simply contributes nothing; no lock is held
/// across both caches.
pub fn snapshot(decoder: &EfisEmsDecoder) -> Map<String, Value> {
    let mut merged = Map::new();
    merged.insert("Service".to_string(), Value::from(SERVICE_LABEL));

    for (key, value) in decoder.ems_cache().get() {
        merged.insert(key, value);
    }
    for (key, value) in decoder.efis_cache().get() {
        merged.insert(key, value);
    }

    merged
}
