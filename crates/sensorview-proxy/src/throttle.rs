use std::sync::Mutex;
use std::sync::PoisonError;

/// Drops frames that arrive closer together than a minimum interval.
///
/// The first frame is always admitted. A timestamp earlier than the last
/// admitted one (sensor restart) is admitted and becomes the new reference.
#[derive(Debug)]
pub struct FrameThrottle {
    min_interval_us: u64,
    last_us: Mutex<Option<u64>>,
}

impl FrameThrottle {
    pub fn new(min_interval_us: u64) -> Self {
        Self {
            min_interval_us,
            last_us: Mutex::new(None),
        }
    }

    pub fn min_interval_us(&self) -> u64 {
        self.min_interval_us
    }

    /// Whether a frame stamped `timestamp_us` should be sent.
    pub fn admit(&self, timestamp_us: u64) -> bool {
        let mut last = self.last_us.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            if timestamp_us >= prev && timestamp_us - prev < self.min_interval_us {
                return false;
            }
        }
        *last = Some(timestamp_us);
        true
    }

    pub fn reset(&self) {
        *self.last_us.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_fps_threshold() {
        let throttle = FrameThrottle::new(30_000);
        assert!(throttle.admit(0));
        assert!(!throttle.admit(10_000));
        assert!(!throttle.admit(29_999));
        assert!(throttle.admit(30_000));
        assert!(throttle.admit(63_000));
    }

    #[test]
    fn dropped_frames_do_not_move_reference() {
        let throttle = FrameThrottle::new(100);
        assert!(throttle.admit(1_000));
        assert!(!throttle.admit(1_050));
        assert!(!throttle.admit(1_099));
        assert!(throttle.admit(1_100));
    }

    #[test]
    fn backwards_timestamp_admitted() {
        let throttle = FrameThrottle::new(100);
        assert!(throttle.admit(5_000));
        assert!(throttle.admit(10));
        assert!(!throttle.admit(50));
    }

    #[test]
    fn reset_admits_next() {
        let throttle = FrameThrottle::new(100);
        assert!(throttle.admit(1_000));
        throttle.reset();
        assert!(throttle.admit(1_001));
    }
}
