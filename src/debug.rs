use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Detail output, only shown with `--debug`.
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            println!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! debug_eprintln {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            eprintln!($($arg)*);
        }
    };
}

/// Error line tagged with the region being scraped. Always shown, since
/// skipped listings and failed fetches are only ever observed here.
#[macro_export]
macro_rules! region_eprintln {
    ($region:expr, $($arg:tt)*) => {
        eprintln!("[{}] {}", $region, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_toggles() {
        set_debug(true);
        assert!(is_debug_enabled());
        set_debug(false);
        assert!(!is_debug_enabled());
    }
}
