//! Poll alignment
//!
//! The controller counts 1 Hz ticks between reads. Each read reports how
//! far the RTC is from a 5-second mark, and the next countdown is shortened
//! or stretched so later reads land on the mark.

use crate::fault::Fault;

/// Largest correction in either direction
pub const MAX_DRIFT: i8 = 2;

/// Correction for a raw seconds register, in -2..=2
///
/// Only the units digit matters. Readings just past a mark give a positive
/// value and readings just before one give a negative value, except that
/// both `x2` and `x3` seconds use +2.
pub fn near_5s_diff(seconds: u8) -> i8 {
    let mut units = seconds & 0x0F;
    if units >= 10 {
        units -= 10;
    }
    if units >= 5 {
        units -= 5;
    }
    match units {
        1 => 1,
        2 | 3 => 2,
        4 => -1,
        _ => 0,
    }
}

/// Ticks until the next read
///
/// A correction outside -2..=2 means the registers were decoded wrongly
/// upstream, and is fatal.
pub fn next_countdown(interval: u8, drift: i8) -> Result<u8, Fault> {
    if !(-MAX_DRIFT..=MAX_DRIFT).contains(&drift) {
        return Err(Fault::DriftOutOfRange(drift));
    }
    let next = i16::from(interval) - i16::from(drift);
    Ok(next.clamp(1, i16::from(u8::MAX)) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::bcd::to_bcd;
    use proptest::prelude::*;

    #[test]
    fn test_on_the_mark() {
        assert_eq!(near_5s_diff(0x00), 0);
        assert_eq!(next_countdown(5, near_5s_diff(0x00)), Ok(5));
        assert_eq!(near_5s_diff(0x35), 0);
    }

    #[test]
    fn test_two_seconds_early() {
        assert_eq!(near_5s_diff(0x58), 2);
        assert_eq!(next_countdown(5, near_5s_diff(0x58)), Ok(3));
    }

    #[test]
    fn test_units_table() {
        let diffs: [i8; 10] = core::array::from_fn(|s| near_5s_diff(s as u8));
        assert_eq!(diffs, [0, 1, 2, 2, -1, 0, 1, 2, 2, -1]);
    }

    #[test]
    fn test_out_of_range_is_fatal() {
        assert_eq!(next_countdown(5, 3), Err(Fault::DriftOutOfRange(3)));
        assert_eq!(next_countdown(5, -3), Err(Fault::DriftOutOfRange(-3)));
    }

    proptest! {
        #[test]
        fn prop_drift_in_range(seconds in 0u8..60, halted in any::<bool>()) {
            let raw = to_bcd(seconds) | if halted { 0x80 } else { 0 };
            let diff = near_5s_diff(raw);
            prop_assert!((-2..=2).contains(&diff));
            let next = next_countdown(5, diff).unwrap();
            prop_assert!((3..=7).contains(&next));
        }

        #[test]
        fn prop_any_register_value_is_safe(raw in any::<u8>()) {
            prop_assert!(next_countdown(5, near_5s_diff(raw)).is_ok());
        }
    }
}
