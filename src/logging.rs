//! Logging macros. Everything goes through the `log` facade, with packet traffic and shutdown
//! sequencing on their own targets so they can be enabled independently via `RUST_LOG`.

use log::LevelFilter;

pub const PACKET_TARGET: &str = "primadonna::packet";
pub const SHUTDOWN_TARGET: &str = "primadonna::shutdown";

/// Initializes the process-wide logger. `verbosity` is the number of `-v` flags; `RUST_LOG`, if
/// set, is layered on top.
pub fn configure(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A logger may already be installed (ie: in tests)
    let _ = builder.try_init();
}

#[macro_export]
macro_rules! trace_packet {
    ($($arg:tt)*) => {{
        ::log::trace!(target: $crate::logging::PACKET_TARGET, $($arg)*);
    }};
}

#[macro_export]
macro_rules! trace_shutdown {
    ($($arg:tt)*) => {{
        ::log::debug!(target: $crate::logging::SHUTDOWN_TARGET, $($arg)*);
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        ::log::info!($($arg)*);
    }};
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {{
        ::log::warn!($($arg)*);
    }};
}
