//! Credentials: password hashing, login tokens and confirmation codes.

pub mod password;
pub mod token;

pub use password::{Argon2PasswordHasher, PasswordError, PasswordHasher};
pub use token::{TokenClaims, TokenError, TokenIssuer};

use rand::Rng;

/// A six digit, zero padded confirmation code.
pub fn generate_confirmation_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}
