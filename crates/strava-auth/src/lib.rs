//! Strava OAuth authentication library
//!
//! Login flows, token exchange and refresh, and the on-disk credential store
//! for the `strava` CLI. The crate has no knowledge of the API surface; the
//! client crate only consumes [`TokenManager`].
//!
//! Credential flow:
//! 1. `LoginMode::select()` picks local callback, manual paste or remote
//! 2. `Authenticator` runs the flow and calls `token::exchange_code()`
//! 3. Tokens are saved via `CredentialStore::save()`
//! 4. `TokenManager::ensure_fresh()` refreshes before each API request

pub mod callback;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod flow;
pub mod refresher;
pub mod token;

pub use callback::CallbackListener;
pub use constants::*;
pub use credentials::{
    ClientCredentials, CredentialStore, PendingAuthorization, State, TokenPair, config_dir,
};
pub use error::{Error, Result};
pub use extract::{extract_code, extract_code_and_state, is_loopback};
pub use flow::{Authenticator, LoginMode, authorization_url, generate_state};
pub use refresher::{TokenManager, needs_refresh};
pub use token::{TokenResponse, exchange_code, refresh_token};
