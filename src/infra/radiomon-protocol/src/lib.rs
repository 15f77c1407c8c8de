mod analytics;
mod status;

pub use analytics::*;
pub use status::*;
