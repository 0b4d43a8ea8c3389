//! Package-level constants.

/// Current version of tether (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "tether";

/// Default HTTP port when nothing else is configured.
pub const DEFAULT_PORT: u16 = 3000;
