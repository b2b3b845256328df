//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// `rust_log` if it is set and parses, otherwise `default_level`.
fn build_filter(rust_log: Option<&str>, default_level: &str) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` (e.g. `"info"` or `"portal_session=debug"`).
///
/// [`SessionContext::open`](crate::SessionContext::open) calls this with
/// [`PortalConfig::log_level`](crate::PortalConfig::log_level).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(rust_log.as_deref(), default_level))
        .with_target(true)
        .try_init()
        .is_ok()
}
