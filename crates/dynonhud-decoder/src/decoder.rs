use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, Utc};
use dynonhud_cache::TelemetryCache;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::layout::{EfisLayout, EmsLayout, AIRSPEED_CONVERSION_FACTOR, METERS_TO_YARDS};

/// Running min/max G-load envelope for the life of the process.
///
/// Initialized to 1.0 (level flight at rest) and only ever widened; a reset
/// requires a process restart.
#[derive(Debug, Clone, Copy)]
pub struct SessionExtremes {
    pub min_lateral_g: f64,
    pub max_lateral_g: f64,
    pub min_vertical_g: f64,
    pub max_vertical_g: f64,
}

impl SessionExtremes {
    fn widen(&mut self, vertical_g: f64, lateral_g: f64) {
        if vertical_g < self.min_vertical_g {
            self.min_vertical_g = vertical_g;
        }
        if vertical_g > self.max_vertical_g {
            self.max_vertical_g = vertical_g;
        }
        if lateral_g < self.min_lateral_g {
            self.min_lateral_g = lateral_g;
        }
        if lateral_g > self.max_lateral_g {
            self.max_lateral_g = lateral_g;
        }
    }
}

impl Default for SessionExtremes {
    fn default() -> Self {
        Self {
            min_lateral_g: 1.0,
            max_lateral_g: 1.0,
            min_vertical_g: 1.0,
            max_vertical_g: 1.0,
        }
    }
}

/// Decoder for the two Dynon serial schemas, feeding one cache per source.
///
/// One instance is shared by every feed loop: the caches and the session
/// extremes are interior-mutable, so `decode_*` take `&self`. Schema
/// selection is by exact frame length alone — a given line decodes as EFIS,
/// as EMS, or not at all.
pub struct EfisEmsDecoder {
    efis_layout: EfisLayout,
    ems_layout: EmsLayout,
    efis_cache: Arc<TelemetryCache>,
    ems_cache: Arc<TelemetryCache>,
    session: Mutex<SessionExtremes>,
}

impl EfisEmsDecoder {
    /// Create a decoder over the given source caches with the default
    /// (rev H) offset tables.
    pub fn new(efis_cache: Arc<TelemetryCache>, ems_cache: Arc<TelemetryCache>) -> Self {
        Self::with_layouts(efis_cache, ems_cache, EfisLayout::rev_h(), EmsLayout::rev_h())
    }

    /// Create a decoder with explicit offset tables.
    ///
    /// # Panics
    ///
    /// Panics when a table's slice ranges do not fit its frame length. The
    /// length gate only checks `frame_len`, so an overrunning range would
    /// otherwise slice out of bounds on the first matching frame.
    pub fn with_layouts(
        efis_cache: Arc<TelemetryCache>,
        ems_cache: Arc<TelemetryCache>,
        efis_layout: EfisLayout,
        ems_layout: EmsLayout,
    ) -> Self {
        assert!(
            efis_layout.is_consistent(),
            "EFIS layout slices must fit inside its frame length"
        );
        assert!(
            ems_layout.is_consistent(),
            "EMS layout slices must fit inside its frame length"
        );
        Self {
            efis_layout,
            ems_layout,
            efis_cache,
            ems_cache,
            session: Mutex::new(SessionExtremes::default()),
        }
    }

    /// The cache EFIS decodes merge into.
    pub fn efis_cache(&self) -> &Arc<TelemetryCache> {
        &self.efis_cache
    }

    /// The cache EMS decodes merge into.
    pub fn ems_cache(&self) -> &Arc<TelemetryCache> {
        &self.ems_cache
    }

    /// A copy of the current session G-load envelope.
    pub fn session_extremes(&self) -> SessionExtremes {
        *self.lock_session()
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionExtremes> {
        // Widening four floats cannot leave the envelope torn in a way that
        // matters; recover the guard if a panicking thread poisoned it.
        self.session.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Decode one line as an EFIS frame and merge the result into the EFIS
    /// cache.
    ///
    /// Returns `Ok(None)` when the line is not the EFIS frame length (no new
    /// data this cycle, nothing touched), `Err` when the shape matched but a
    /// field was malformed (nothing merged), and the decoded measurement set
    /// on success.
    pub fn decode_efis(&self, raw: &str) -> Result<Option<Map<String, Value>>> {
        let layout = &self.efis_layout;
        if raw.len() != layout.frame_len || !raw.is_ascii() {
            return Ok(None);
        }

        let hour = text(raw, &layout.hour);
        let minute = text(raw, &layout.minute);
        let second = text(raw, &layout.second);
        let fraction = fraction_text(number(raw, &layout.fraction, "time fraction")? / 64.0);

        let pitch = number(raw, &layout.pitch, "pitch")? / 10.0;
        let roll = number(raw, &layout.roll, "roll")? / 10.0;
        let yaw = integer(raw, &layout.yaw, "yaw")?;
        let airspeed =
            number(raw, &layout.airspeed, "airspeed")? / 10.0 * AIRSPEED_CONVERSION_FACTOR;
        // Pressure or displayed altitude; the status bitmask says which.
        let altitude = METERS_TO_YARDS * number(raw, &layout.altitude, "altitude")?;
        let turn_rate_or_vsi = number(raw, &layout.turn_rate_or_vsi, "turn rate")? / 10.0;
        let lateral_g = number(raw, &layout.lateral_g, "lateral G")? / 100.0;
        let vertical_g = number(raw, &layout.vertical_g, "vertical G")? / 10.0;
        let angle_of_attack = integer(raw, &layout.angle_of_attack, "angle of attack")?;
        let status = bitmask(raw, &layout.status, "status bitmask")?;

        let is_pressure_alt_and_vsi = status & 1 == 1;

        let extremes = {
            let mut session = self.lock_session();
            session.widen(vertical_g, lateral_g);
            *session
        };

        // The frame carries only time-of-day; the date half of the timestamp
        // comes from the wall clock.
        let last_time_received = embedded_timestamp(hour, minute, second, &fraction);

        // Field names follow the Stratux getSituation schema the HUD client
        // already consumes.
        let mut decoded = Map::new();
        decoded.insert("GPSTime".into(), Value::from(last_time_received.clone()));
        decoded.insert(
            "GPSLastGPSTimeStratuxTime".into(),
            Value::from(last_time_received.clone()),
        );
        decoded.insert(
            "BaroLastMeasurementTime".into(),
            Value::from(last_time_received.clone()),
        );
        decoded.insert("AHRSPitch".into(), Value::from(pitch));
        decoded.insert("AHRSRoll".into(), Value::from(roll));
        decoded.insert("AHRSGyroHeading".into(), Value::from(yaw));
        decoded.insert("AHRSMagHeading".into(), Value::from(yaw));
        decoded.insert("AHRSGLoad".into(), Value::from(vertical_g));
        decoded.insert(
            "AHRSGLoadMin".into(),
            Value::from(extremes.min_vertical_g),
        );
        decoded.insert(
            "AHRSGLoadMax".into(),
            Value::from(extremes.max_vertical_g),
        );
        decoded.insert(
            "AHRSLastAttitudeTime".into(),
            Value::from(last_time_received),
        );
        decoded.insert("AHRSAirspeed".into(), Value::from(airspeed));
        decoded.insert("AHRSAOA".into(), Value::from(angle_of_attack));
        decoded.insert("AHRSStatus".into(), Value::from(7));

        // Exactly one of the two shapes per decode, selected by status bit 0.
        if is_pressure_alt_and_vsi {
            decoded.insert(
                "BaroPressureAltitude".into(),
                Value::from(altitude * METERS_TO_YARDS),
            );
            decoded.insert(
                "BaroVerticalSpeed".into(),
                Value::from(METERS_TO_YARDS * turn_rate_or_vsi),
            );
        } else {
            decoded.insert("Altitude".into(), Value::from(altitude * METERS_TO_YARDS));
            decoded.insert("AHRSTurnRate".into(), Value::from(turn_rate_or_vsi));
        }

        self.efis_cache.update(&decoded);
        trace!(fields = decoded.len(), "EFIS frame merged");

        Ok(Some(decoded))
    }

    /// Decode one line as an EMS frame and merge the result into the EMS
    /// cache. Same contract as [`decode_efis`](Self::decode_efis).
    pub fn decode_ems(&self, raw: &str) -> Result<Option<Map<String, Value>>> {
        let layout = &self.ems_layout;
        if raw.len() != layout.frame_len || !raw.is_ascii() {
            return Ok(None);
        }

        let manifold_pressure =
            number(raw, &layout.manifold_pressure, "manifold pressure")? / 100.0;
        let oil_temp = text(raw, &layout.oil_temp);
        let oil_pressure = number(raw, &layout.oil_pressure, "oil pressure")? / 10.0;
        let fuel_pressure = number(raw, &layout.fuel_pressure, "fuel pressure")? / 10.0;
        let volts = number(raw, &layout.volts, "volts")? / 10.0;
        let amps = text(raw, &layout.amps);
        let rpm = number(raw, &layout.rpm, "rpm")? * layout.rpm_scale;
        let fuel_level_1 = number(raw, &layout.fuel_level_1, "fuel level 1")? / 10.0;
        let fuel_level_2 = number(raw, &layout.fuel_level_2, "fuel level 2")? / 10.0;
        let gp_1 = text(raw, &layout.gp_1);
        let gp_2 = text(raw, &layout.gp_2);

        let mut decoded = Map::new();
        decoded.insert("EmsMap".into(), Value::from(manifold_pressure));
        decoded.insert("EmsOilTemp".into(), Value::from(oil_temp));
        decoded.insert("EmsOilPressure".into(), Value::from(oil_pressure));
        decoded.insert("EmsFuelPressure".into(), Value::from(fuel_pressure));
        decoded.insert("EmsVolts".into(), Value::from(volts));
        decoded.insert("EmsAmps".into(), Value::from(amps));
        decoded.insert("EmsRpm".into(), Value::from(rpm));
        decoded.insert("EmsFuelLevel1".into(), Value::from(fuel_level_1));
        decoded.insert("EmsFuelLevel2".into(), Value::from(fuel_level_2));
        decoded.insert("EmsGp1".into(), Value::from(gp_1));
        decoded.insert("EmsGp2".into(), Value::from(gp_2));

        self.ems_cache.update(&decoded);
        trace!(fields = decoded.len(), "EMS frame merged");

        Ok(Some(decoded))
    }
}

impl std::fmt::Debug for EfisEmsDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EfisEmsDecoder")
            .field("efis_frame_len", &self.efis_layout.frame_len)
            .field("ems_frame_len", &self.ems_layout.frame_len)
            .field("session", &self.session_extremes())
            .finish()
    }
}

fn text<'a>(raw: &'a str, range: &Range<usize>) -> &'a str {
    // Callers verified length and ASCII, so byte offsets are char offsets.
    &raw[range.clone()]
}

fn number(raw: &str, range: &Range<usize>, field: &'static str) -> Result<f64> {
    let slot = text(raw, range);
    slot.trim().parse().map_err(|_| DecodeError::BadNumber {
        field,
        text: slot.to_string(),
    })
}

fn integer(raw: &str, range: &Range<usize>, field: &'static str) -> Result<i64> {
    let slot = text(raw, range);
    slot.trim().parse().map_err(|_| DecodeError::BadNumber {
        field,
        text: slot.to_string(),
    })
}

fn bitmask(raw: &str, range: &Range<usize>, field: &'static str) -> Result<u32> {
    let slot = text(raw, range);
    u32::from_str_radix(slot.trim(), 16).map_err(|_| DecodeError::BadBitmask {
        field,
        text: slot.to_string(),
    })
}

/// Fractional-second text: the digits after the decimal point of the
/// shortest representation, truncated to two.
///
/// Historical quirk kept for downstream compatibility: a whole-number value
/// yields `"0"`, and values like 0.5 yield a single digit.
fn fraction_text(value: f64) -> String {
    match value.to_string().split_once('.') {
        Some((_, digits)) => digits.chars().take(2).collect(),
        None => "0".to_string(),
    }
}

/// Current UTC date combined with the frame's embedded time-of-day.
fn embedded_timestamp(hour: &str, minute: &str, second: &str, fraction: &str) -> String {
    let today = Utc::now();
    format!(
        "{:04}-{:02}-{:02}T{}:{}:{}.{}Z",
        today.year(),
        today.month(),
        today.day(),
        hour,
        minute,
        second,
        fraction
    )
}
