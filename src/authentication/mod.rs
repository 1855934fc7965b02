pub mod extract;
pub mod middleware;
pub mod password;

pub use extract::SessionUserId;
pub use middleware::AuthorizedSessionLayer;
pub use password::{
    register_user, validate_credentials, AuthError, Credentials, RegistrationError,
};
