//! Utility functions

/// Generate unique ID
pub fn next_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Wall-clock milliseconds since the Unix epoch (0 if the clock is before it)
pub fn timestamp_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

/// Clamp to `[0, 1]`, mapping NaN to 0
pub fn unit_clamp(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id() {
        let id1 = next_id();
        let id2 = next_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_unit_clamp() {
        assert_eq!(unit_clamp(1.5), 1.0);
        assert_eq!(unit_clamp(-0.2), 0.0);
        assert_eq!(unit_clamp(0.25), 0.25);
        assert_eq!(unit_clamp(f32::NAN), 0.0);
    }

    #[test]
    fn test_timestamp_is_after_2020() {
        assert!(timestamp_millis() > 1_577_836_800_000);
    }
}
