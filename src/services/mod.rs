pub mod auth_flow;
pub mod authorization_request;
pub mod callback_verifier;
pub mod diagnostics;
pub mod pending_auth_registry;
pub mod session_auth_context;
pub mod state_token_codec;
pub mod token_exchange;

pub use auth_flow::*;
pub use authorization_request::*;
pub use callback_verifier::*;
pub use diagnostics::*;
pub use pending_auth_registry::*;
pub use session_auth_context::*;
pub use state_token_codec::*;
pub use token_exchange::*;
