//! Authentication and account self-service.
//!
//! Submodules: credential storage, password hashing, the authorization
//! guard, token state, and the login/register/profile endpoints.

pub mod login;
pub mod password;
pub mod principal;
pub mod profile;
pub mod register;
pub mod state;
pub mod storage;
pub mod types;

pub use principal::{Principal, Role, authenticate, authorize};
pub use state::{AuthConfig, AuthState};
