use env_logger::{Builder, Env};

/// Filter used when `RUST_LOG` is not set.
fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Initialize logging with optional debug output. `RUST_LOG` still wins.
pub fn init(debug: bool) {
    let env = Env::default().default_filter_or(default_filter(debug));
    if let Err(e) = Builder::from_env(env).format_timestamp_millis().try_init() {
        eprintln!("Logging already initialized: {}", e);
    }
}
