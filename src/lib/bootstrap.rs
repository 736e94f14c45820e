//! One-time page setup.
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::page::{Page, Toggle, SCAN_REGION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    pub tooltips: usize,
    pub popovers: usize,
    pub scanner: bool,
}

#[derive(Debug, Default)]
pub struct Bootstrap {
    ready: AtomicBool,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates tooltips and popovers, then calls `activate_scanner` if the
    /// page has a scan region. Only the first call does anything; later
    /// calls return `None`.
    pub fn on_ready<F>(&self, page: &dyn Page, activate_scanner: F) -> Option<BootReport>
    where
        F: FnOnce(),
    {
        if self.ready.swap(true, Ordering::SeqCst) {
            debug!("page already bootstrapped");
            return None;
        }

        let tooltips = page.activate_toggles(Toggle::Tooltip);
        let popovers = page.activate_toggles(Toggle::Popover);
        let scanner = page.has_element(SCAN_REGION);

        if scanner {
            activate_scanner();
        }

        info!("page ready: {tooltips} tooltips, {popovers} popovers, scanner {scanner}");

        Some(BootReport {
            tooltips,
            popovers,
            scanner,
        })
    }
}
