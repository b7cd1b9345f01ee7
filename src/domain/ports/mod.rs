pub mod access_token_provider;
pub mod clock;
pub mod identity_provider;
pub mod state_source;
pub mod token_sink;

pub use access_token_provider::*;
pub use clock::*;
pub use identity_provider::*;
pub use state_source::*;
pub use token_sink::*;
