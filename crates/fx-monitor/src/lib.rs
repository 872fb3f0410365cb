//! Log subscriber installation.

mod logging;

pub use logging::setup_logging;
