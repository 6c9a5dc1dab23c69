mod password;
pub use password::{hash_password, verify_password};
mod jwt;
pub use jwt::{SESSION_LIFETIME_HOURS, SessionClaims, generate_token, issue_session_token, process_token};
mod error;
pub use error::{CryptError, CryptResult};
