pub mod app_state;
pub mod error;

pub use app_state::*;
pub use error::*;
