use std::io::{self, Write};

use env_logger::{Env, Target};
use log::SetLoggerError;

/// Route `log` output to stderr so stdout stays machine-readable.
/// The filter defaults to `warn` and is overridable through `RUST_LOG`.
pub fn init() -> Result<(), SetLoggerError> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    builder.target(Target::Stderr);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] {}",
            record.level(),
            record.target(),
            record.args().to_string().replace('\n', "\\n")
        )
    });
    builder.try_init()
}

/// Last-resort line for failures that happen before or without a logger.
pub fn write_fallback_line(message: &str) {
    let _ = writeln!(io::stderr(), "[ERROR] [kanban.cli] {}", message);
}
