pub mod config;
pub mod errors;
pub mod logging;
pub mod types;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::*;
