//! Process-wide logging setup.

pub mod logging;

pub use logging::{LogFormat, UnknownLogFormat};

/// Initialize logging from `LOG_FORMAT` and `RUST_LOG`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    let format = match std::env::var("LOG_FORMAT") {
        Ok(raw) => raw.parse().unwrap_or_else(|err: UnknownLogFormat| {
            eprintln!("{err}; falling back to json");
            LogFormat::Json
        }),
        Err(_) => LogFormat::Json,
    };
    logging::init(format);
}
