// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tracing utilities for debugging translations

/// Install a `tracing` subscriber that prints translator and generator events.
///
/// The filter defaults to `info,lambda_sql=debug` and can be overridden with
/// `RUST_LOG`. Calling this more than once is harmless.
#[cfg(feature = "tracing-setup")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,lambda_sql=debug".into());

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).without_time())
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing-setup"))]
pub fn init_tracing() {
    // No-op when the subscriber is not compiled in
}
