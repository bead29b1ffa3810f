use tracing_subscriber::EnvFilter;

/// Map a configured log level onto a tracing filter directive.
///
/// - "DISABLED" -> `None` (no subscriber installed)
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
#[must_use]
pub fn tracing_level(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// Output goes to stderr so the CLI can keep stdout for JSON lines.
pub fn init_tracing(log_level: &str) {
    let Some(tracing_level) = tracing_level(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(&tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
