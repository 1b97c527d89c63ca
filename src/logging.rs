//! Logger installation.
//!
//! The tool logs through the `log` facade; `env_logger` prints to stderr and
//! honours `RUST_LOG`, defaulting to `info`.

use env_logger::Env;

/// Install the stderr logger. Calling this more than once is a no-op.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
