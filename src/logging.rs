//! Logging bootstrap for hosts embedding the crate.
//!
//! The core itself only talks to the `log` facade; a host process (or a
//! test) calls [`init`] once to route that output through env_logger.

/// Initialize env_logger with an `info` default filter. Calling it more
/// than once is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
