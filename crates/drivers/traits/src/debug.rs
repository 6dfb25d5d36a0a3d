//! Debug macros for driver subsystems
//!
//! These macros compile to nothing when debug features are disabled.

/// Debug print for network subsystem
#[macro_export]
#[cfg(feature = "debug-network")]
macro_rules! debug_network {
    ($($arg:tt)*) => {
        $crate::_debug_print("[NETWORK] ", format_args!($($arg)*))
    };
}

#[macro_export]
#[cfg(not(feature = "debug-network"))]
macro_rules! debug_network {
    ($($arg:tt)*) => {};
}

/// Debug print for bus enumeration
#[macro_export]
#[cfg(feature = "debug-bus")]
macro_rules! debug_bus {
    ($($arg:tt)*) => {
        $crate::_debug_print("[BUS] ", format_args!($($arg)*))
    };
}

#[macro_export]
#[cfg(not(feature = "debug-bus"))]
macro_rules! debug_bus {
    ($($arg:tt)*) => {};
}

/// Debug output function, routed to the `log` facade at trace level
#[doc(hidden)]
#[cfg(any(feature = "debug-network", feature = "debug-bus"))]
pub fn _debug_print(prefix: &str, args: core::fmt::Arguments) {
    crate::__log::trace!("{}{}", prefix, args);
}
