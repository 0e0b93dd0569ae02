//! The radio scan-control surface
//!
//! Inquiry scanning (finding candidate devices) is a hardware operation the
//! platform owns; the coordinator only decides *when* it should run. The
//! platform layer implements this trait over the real radio and feeds
//! discovered candidates and scan-finished signals back as
//! [`crate::SessionCommand`]s.

/// Start/stop surface of the radio's inquiry scan
pub trait ScanControl: Send {
    /// Whether an inquiry scan is currently running
    fn is_scanning(&self) -> bool;

    /// Start an inquiry scan
    fn start_scan(&mut self);

    /// Cancel the running inquiry scan
    fn stop_scan(&mut self);
}

/// [`ScanControl`] that only tracks state, for tests and headless demos
#[derive(Debug, Default)]
pub struct NullScanControl {
    scanning: bool,
}

impl ScanControl for NullScanControl {
    fn is_scanning(&self) -> bool {
        self.scanning
    }

    fn start_scan(&mut self) {
        self.scanning = true;
    }

    fn stop_scan(&mut self) {
        self.scanning = false;
    }
}
