//! Per-kind unacknowledged envelope counters.

use std::sync::atomic::{AtomicI32, Ordering};

use sensorview_wire::{MsgKind, KIND_SLOTS};
use tracing::debug;

use crate::config::AdmissionPolicy;

/// Tracks how many envelopes of each kind the viewer has not acked yet.
///
/// Counters are incremented when a frame is admitted and decremented on
/// acks. They never go below zero.
#[derive(Debug)]
pub struct FlowControl {
    unacked: [AtomicI32; KIND_SLOTS],
    policy: AdmissionPolicy,
}

impl FlowControl {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            unacked: std::array::from_fn(|_| AtomicI32::new(0)),
            policy,
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Count a frame of `kind` as in flight.
    ///
    /// Returns `false` when the policy drops the frame. Kinds without a
    /// counter slot are always admitted.
    pub fn admit(&self, kind: MsgKind) -> bool {
        let Some(slot) = kind.slot() else {
            return true;
        };
        let counter = &self.unacked[slot];
        match self.policy {
            AdmissionPolicy::Diagnostic => {
                counter.fetch_add(1, Ordering::AcqRel);
                true
            }
            AdmissionPolicy::Enforce { max_unacked } => {
                let admitted = counter
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < max_unacked).then_some(n + 1)
                    })
                    .is_ok();
                if !admitted {
                    debug!(%kind, max_unacked, "frame dropped, too many unacked");
                }
                admitted
            }
        }
    }

    /// Apply an ack for the raw kind byte `kind`.
    ///
    /// Returns `false` when `kind` has no counter slot.
    pub fn on_ack(&self, kind: u8) -> bool {
        let Some(counter) = self.unacked.get(usize::from(kind)) else {
            return false;
        };
        // Err means the counter was already zero.
        let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            (n > 0).then_some(n - 1)
        });
        true
    }

    /// Current unacked count for `kind`. Zero for kinds without a slot.
    pub fn unacked(&self, kind: MsgKind) -> i32 {
        kind.slot()
            .map_or(0, |slot| self.unacked[slot].load(Ordering::Acquire))
    }

    /// All counters, indexed by kind byte.
    pub fn snapshot(&self) -> [i32; KIND_SLOTS] {
        std::array::from_fn(|i| self.unacked[i].load(Ordering::Acquire))
    }

    pub fn reset(&self) {
        for counter in &self.unacked {
            counter.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn diagnostic_counts_everything() {
        let flow = FlowControl::new(AdmissionPolicy::Diagnostic);
        for _ in 0..10 {
            assert!(flow.admit(MsgKind::Rgb));
        }
        assert_eq!(flow.unacked(MsgKind::Rgb), 10);
        assert_eq!(flow.unacked(MsgKind::FishEye), 0);
    }

    #[test]
    fn ack_decrements_and_saturates() {
        let flow = FlowControl::new(AdmissionPolicy::Diagnostic);
        flow.admit(MsgKind::FishEye);
        assert!(flow.on_ack(MsgKind::FishEye.as_u8()));
        assert!(flow.on_ack(MsgKind::FishEye.as_u8()));
        assert!(flow.on_ack(MsgKind::FishEye.as_u8()));
        assert_eq!(flow.unacked(MsgKind::FishEye), 0);
    }

    #[test]
    fn out_of_range_ack_ignored() {
        let flow = FlowControl::new(AdmissionPolicy::Diagnostic);
        flow.admit(MsgKind::MapUpdate);
        assert!(!flow.on_ack(6));
        assert!(!flow.on_ack(0xFF));
        assert_eq!(flow.snapshot(), [0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn enforce_caps_in_flight() {
        let flow = FlowControl::new(AdmissionPolicy::Enforce { max_unacked: 3 });
        assert!(flow.admit(MsgKind::Rgb));
        assert!(flow.admit(MsgKind::Rgb));
        assert!(flow.admit(MsgKind::Rgb));
        assert!(!flow.admit(MsgKind::Rgb));
        assert_eq!(flow.unacked(MsgKind::Rgb), 3);

        flow.on_ack(MsgKind::Rgb.as_u8());
        assert!(flow.admit(MsgKind::Rgb));
        assert!(flow.admit(MsgKind::FishEye));
    }

    #[test]
    fn concurrent_admit_and_ack_never_negative() {
        let flow = Arc::new(FlowControl::new(AdmissionPolicy::Diagnostic));
        let mut threads = Vec::new();
        for i in 0..4 {
            let flow = Arc::clone(&flow);
            threads.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    if i % 2 == 0 {
                        flow.admit(MsgKind::Rgb);
                    } else {
                        flow.on_ack(MsgKind::Rgb.as_u8());
                    }
                    assert!(flow.unacked(MsgKind::Rgb) >= 0);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert!(flow.unacked(MsgKind::Rgb) >= 0);
        assert!(flow.unacked(MsgKind::Rgb) <= 2000);
    }

    #[test]
    fn reset_clears() {
        let flow = FlowControl::new(AdmissionPolicy::Diagnostic);
        flow.admit(MsgKind::Rgb);
        flow.reset();
        assert_eq!(flow.snapshot(), [0; KIND_SLOTS]);
    }
}
