pub mod export;
pub mod status;

pub use export::{plan, run};
pub use status::status;
