use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub scanned_count: usize,
    pub total: usize,
}

/// Process-wide scan bookkeeping. At most one scan holds it at a time.
#[derive(Debug, Default)]
pub struct ScanState {
    scanning: AtomicBool,
    cancelled: AtomicBool,
    total: AtomicUsize,
    scanned: AtomicUsize,
}

#[derive(Debug)]
pub struct ScanClaim<'a> {
    state: &'a ScanState,
    handed_off: bool,
}

impl ScanClaim<'_> {
    /// The running scan now owns the flag and clears it through `finish`.
    pub fn hand_off(mut self) {
        self.handed_off = true;
    }
}

impl Drop for ScanClaim<'_> {
    fn drop(&mut self) {
        if !self.handed_off {
            self.state.finish();
        }
    }
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the scanner for the preparation phase.
    ///
    /// The claim is released on drop unless [`ScanClaim::hand_off`] passes it
    /// to the batch loop, so an abandoned start leaves the scanner idle.
    pub fn claim(&self) -> Option<ScanClaim<'_>> {
        self.try_begin().then_some(ScanClaim {
            state: self,
            handed_off: false,
        })
    }

    /// Claims the scanner. False if a scan already holds it.
    pub fn try_begin(&self) -> bool {
        let claimed = self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.cancelled.store(false, Ordering::Release);
            self.total.store(0, Ordering::Release);
            self.scanned.store(0, Ordering::Release);
        }
        claimed
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Release);
    }

    /// Returns the new scanned count.
    pub fn record_scanned(&self) -> usize {
        self.scanned.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Flags the running scan for cancellation. False when idle.
    pub fn cancel(&self) -> bool {
        if !self.scanning.load(Ordering::Acquire) {
            return false;
        }
        self.cancelled.store(true, Ordering::Release);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn finish(&self) {
        self.cancelled.store(false, Ordering::Release);
        self.scanning.store(false, Ordering::Release);
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            is_scanning: self.scanning.load(Ordering::Acquire),
            scanned_count: self.scanned.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}
