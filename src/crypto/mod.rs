pub mod keys;

pub use keys::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Unsupported hash scheme: {0}")]
    UnsupportedScheme(String),
}
