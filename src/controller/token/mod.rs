//! # Token
//!
//! Token minting, claim parsing and the secret that carries an issued token.

pub mod builder;
pub mod claims;

pub use builder::{build_token_secret, signing_key_hash, TokenArtifact};
pub use claims::{mint_token, parse_expiration, ClaimError, MintedToken, TokenClaims};
