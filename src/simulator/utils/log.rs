/// Global logging configuration
use env_logger::{Builder, Env};
use std::sync::atomic::{AtomicBool, Ordering};

static INITIALISED: AtomicBool = AtomicBool::new(false);

/// Install the env_logger backend once.
///
/// Default filter is `info`, or `warn` in quiet mode; `RUST_LOG` overrides both.
pub fn init_log(quiet: bool) {
  if INITIALISED.swap(true, Ordering::SeqCst) {
    return;
  }
  let default = if quiet { "warn" } else { "info" };
  let _ = Builder::from_env(Env::default().default_filter_or(default))
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}

