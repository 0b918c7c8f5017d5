pub mod log_setup;
pub mod parallel;

pub use log_setup::setup_logging;
