pub mod controllers;
pub mod cookies;
pub mod middleware;
pub mod router;
pub mod state_sources;

pub use middleware::*;
pub use router::build_router;
pub use state_sources::*;
