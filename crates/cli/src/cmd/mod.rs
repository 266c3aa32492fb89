mod clean;
mod lifecycle;
mod status;

pub use clean::cmd_clean;
pub use lifecycle::cmd_lifecycle;
pub use status::cmd_status;
