//! Character-offset tables for the two Dynon wire formats.
//!
//! The serial protocol evolved across product revisions (frame lengths 51/53
//! and 119/121, RPM scaling, status field width). Everything
//! revision-dependent lives here so a format change never touches decode or
//! merge logic. The tables below match the FlightDEK-D180 rev H guide, with
//! frame lengths counting the trailing CR LF the device appends.

use std::ops::Range;

/// Meters to yards; also reused as the (historical) meters-to-feet step.
pub const METERS_TO_YARDS: f64 = 1.09361;

/// Raw tenths-of-m/s indicated airspeed to knots-like display units.
pub const AIRSPEED_CONVERSION_FACTOR: f64 = 0.647;

/// Offsets and scale factors for one EFIS (attitude/air-data) frame.
#[derive(Debug, Clone)]
pub struct EfisLayout {
    /// Exact frame length, terminator included. Anything else is not EFIS.
    pub frame_len: usize,
    pub hour: Range<usize>,
    pub minute: Range<usize>,
    pub second: Range<usize>,
    /// 64ths of a second.
    pub fraction: Range<usize>,
    /// Tenths of a degree, signed.
    pub pitch: Range<usize>,
    /// Tenths of a degree, signed.
    pub roll: Range<usize>,
    /// Whole degrees.
    pub yaw: Range<usize>,
    /// Tenths of a meter per second.
    pub airspeed: Range<usize>,
    /// Meters; displayed or pressure altitude per the status bitmask.
    pub altitude: Range<usize>,
    /// Tenths; turn rate or vertical speed per the status bitmask.
    pub turn_rate_or_vsi: Range<usize>,
    /// Hundredths of a G, signed.
    pub lateral_g: Range<usize>,
    /// Tenths of a G, signed.
    pub vertical_g: Range<usize>,
    /// Percent toward stall, 0-99.
    pub angle_of_attack: Range<usize>,
    /// Hexadecimal status bitmask. Bit 0 selects pressure-altitude/VSI
    /// output over displayed-altitude/turn-rate.
    pub status: Range<usize>,
}

impl EfisLayout {
    /// Every slice range in the table, in frame order.
    pub fn slices(&self) -> [&Range<usize>; 14] {
        [
            &self.hour,
            &self.minute,
            &self.second,
            &self.fraction,
            &self.pitch,
            &self.roll,
            &self.yaw,
            &self.airspeed,
            &self.altitude,
            &self.turn_rate_or_vsi,
            &self.lateral_g,
            &self.vertical_g,
            &self.angle_of_attack,
            &self.status,
        ]
    }

    /// Every slice is non-empty and ends inside the frame.
    pub fn is_consistent(&self) -> bool {
        self.slices()
            .into_iter()
            .all(|range| range.start < range.end && range.end <= self.frame_len)
    }

    /// The 53-character revision.
    pub const fn rev_h() -> Self {
        Self {
            frame_len: 53,
            hour: 0..2,
            minute: 2..4,
            second: 4..6,
            fraction: 6..8,
            pitch: 8..12,
            roll: 12..17,
            yaw: 17..20,
            airspeed: 20..24,
            altitude: 24..29,
            turn_rate_or_vsi: 29..33,
            lateral_g: 33..36,
            vertical_g: 36..39,
            angle_of_attack: 39..41,
            status: 41..47,
        }
    }
}

impl Default for EfisLayout {
    fn default() -> Self {
        Self::rev_h()
    }
}

/// Offsets and scale factors for one EMS (engine-monitoring) frame.
///
/// Only the fields the HUD client consumes are sliced; EGT/CHT banks and
/// contact flags in the tail are deliberately skipped.
#[derive(Debug, Clone)]
pub struct EmsLayout {
    /// Exact frame length, terminator included. Anything else is not EMS.
    pub frame_len: usize,
    /// Hundredths of an inch of mercury.
    pub manifold_pressure: Range<usize>,
    /// Raw text, unconverted.
    pub oil_temp: Range<usize>,
    /// Tenths of a PSI.
    pub oil_pressure: Range<usize>,
    /// Tenths of a PSI.
    pub fuel_pressure: Range<usize>,
    /// Tenths of a volt.
    pub volts: Range<usize>,
    /// Raw text, unconverted.
    pub amps: Range<usize>,
    pub rpm: Range<usize>,
    /// Raw RPM field value is multiplied by this. Earlier revisions divided
    /// by ten instead; this table holds the rev H behavior.
    pub rpm_scale: f64,
    /// Tenths of a gallon.
    pub fuel_level_1: Range<usize>,
    /// Tenths of a gallon.
    pub fuel_level_2: Range<usize>,
    /// General-purpose text widget.
    pub gp_1: Range<usize>,
    /// General-purpose text widget.
    pub gp_2: Range<usize>,
}

impl EmsLayout {
    /// Every slice range in the table, in frame order.
    pub fn slices(&self) -> [&Range<usize>; 11] {
        [
            &self.manifold_pressure,
            &self.oil_temp,
            &self.oil_pressure,
            &self.fuel_pressure,
            &self.volts,
            &self.amps,
            &self.rpm,
            &self.fuel_level_1,
            &self.fuel_level_2,
            &self.gp_1,
            &self.gp_2,
        ]
    }

    /// Every slice is non-empty and ends inside the frame.
    pub fn is_consistent(&self) -> bool {
        self.slices()
            .into_iter()
            .all(|range| range.start < range.end && range.end <= self.frame_len)
    }

    /// The 121-character revision.
    pub const fn rev_h() -> Self {
        Self {
            frame_len: 121,
            manifold_pressure: 8..12,
            oil_temp: 12..15,
            oil_pressure: 15..18,
            fuel_pressure: 18..21,
            volts: 21..24,
            amps: 24..27,
            rpm: 27..30,
            rpm_scale: 10.0,
            fuel_level_1: 37..40,
            fuel_level_2: 40..43,
            gp_1: 43..51,
            gp_2: 51..59,
        }
    }
}

impl Default for EmsLayout {
    fn default() -> Self {
        Self::rev_h()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efis_slices_fit_inside_the_frame() {
        assert!(EfisLayout::rev_h().is_consistent());
    }

    #[test]
    fn ems_slices_fit_inside_the_frame() {
        assert!(EmsLayout::rev_h().is_consistent());
    }

    #[test]
    fn overrunning_slice_is_inconsistent() {
        let mut layout = EfisLayout::rev_h();
        layout.status = 50..56;
        assert!(!layout.is_consistent());

        let mut layout = EmsLayout::rev_h();
        layout.gp_2 = 51..122;
        assert!(!layout.is_consistent());
    }

    #[test]
    fn empty_slice_is_inconsistent() {
        let mut layout = EfisLayout::rev_h();
        layout.yaw = 17..17;
        assert!(!layout.is_consistent());
    }

    #[test]
    fn frame_lengths_are_distinct() {
        // Schema selection is by length alone; the two must never collide.
        assert_ne!(EfisLayout::rev_h().frame_len, EmsLayout::rev_h().frame_len);
    }
}
