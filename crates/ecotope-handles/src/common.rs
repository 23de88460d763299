//! Arithmetic shared by the decaying handles.

use ecotope_core::profile::Profile;
use ecotope_core::types::Tick;

/// `current - rate * elapsed`, floored, then held inside `[min, max]`.
pub(crate) fn decay_floor(current: i32, rate: f64, elapsed: u64, min: i32, max: i32) -> i32 {
    let raw = (current as f64 - rate * elapsed.max(1) as f64).floor();
    raw.clamp(min as f64, max.max(min) as f64) as i32
}

/// `current + rate * elapsed`, rounded up, capped at `max`.
pub(crate) fn recover_ceil(current: i32, rate: f64, elapsed: u64, max: i32) -> i32 {
    let raw = (current as f64 + rate * elapsed.max(1) as f64).ceil();
    raw.clamp(0.0, max.max(0) as f64) as i32
}

/// Fraction of the gap to a target closed after `elapsed` steps of an
/// exponential moving average with per-step `rate`.
pub(crate) fn ema_fraction(rate: f64, elapsed: u64) -> f64 {
    let rate = rate.clamp(0.0, 1.0);
    let steps = elapsed.max(1).min(i32::MAX as u64) as i32;
    1.0 - (1.0 - rate).powi(steps)
}

/// True when at least `interval` steps have passed since `last`.
pub(crate) fn cooldown_elapsed(last: Option<Tick>, now: Tick, interval: u64) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_sub(last) >= interval,
    }
}

/// `<section>.enabled`, on unless the profile says otherwise.
pub(crate) fn section_enabled(profile: &Profile, section: &str) -> bool {
    profile.get_bool(&format!("{}.enabled", section), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_floors_and_clamps() {
        assert_eq!(decay_floor(40, 0.015, 1, 0, 100), 39);
        assert_eq!(decay_floor(40, 0.015, 24_000, 6, 100), 6);
        assert_eq!(decay_floor(3, 1.0, 10, 0, 100), 0);
        assert_eq!(decay_floor(40, 0.0, 1, 0, 30), 30);
    }

    #[test]
    fn recovery_rounds_up_and_caps() {
        assert_eq!(recover_ceil(50, 0.5, 1, 100), 51);
        assert_eq!(recover_ceil(99, 0.5, 10, 100), 100);
    }

    #[test]
    fn ema_approaches_one() {
        assert!((ema_fraction(0.1, 1) - 0.1).abs() < 1e-12);
        assert!(ema_fraction(0.1, 1000) > 0.999);
        assert_eq!(ema_fraction(0.0, 50), 0.0);
        assert_eq!(ema_fraction(2.0, 1), 1.0);
    }

    #[test]
    fn cooldowns() {
        assert!(cooldown_elapsed(None, 0, 200));
        assert!(!cooldown_elapsed(Some(100), 299, 200));
        assert!(cooldown_elapsed(Some(100), 300, 200));
        assert!(!cooldown_elapsed(Some(500), 100, 1));
    }
}
