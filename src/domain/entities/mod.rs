pub mod callback_request;
pub mod pending_authorization;
pub mod state_token;
pub mod token_set;

pub use callback_request::*;
pub use pending_authorization::*;
pub use state_token::*;
pub use token_set::*;
