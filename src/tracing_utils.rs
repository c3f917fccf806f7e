// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Logging macros that compile away when the `tracing` feature is off.

/// Install a formatting subscriber for command-line use.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output for
/// this crate and info for everything else.
#[cfg(feature = "tracing")]
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = if verbose {
        "info,policy_inspector=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_verbose: bool) {
    // No-op when tracing is disabled
}

// When tracing feature is enabled, export tracing crate directly
#[cfg(feature = "tracing")]
pub use tracing::{debug, info};

// When tracing feature is disabled, define macros directly
#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($args:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($args:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, info};
