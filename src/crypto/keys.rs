use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;

const SCHEME: &str = "pbkdf2_sha256";

/// Derived password bytes: zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
struct DerivedKey {
    bytes: [u8; HASH_LENGTH],
}

impl DerivedKey {
    fn derive(password: &str, salt: &[u8], iterations: u32) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut bytes);
        Self { bytes }
    }
}

/// One-way password hashing with PBKDF2-SHA256.
///
/// Stored form: `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`. The
/// iteration count travels with the hash, so raising it later leaves
/// existing accounts verifiable.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PBKDF2_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self, password: &str) -> String {
        let salt = generate_salt();
        let key = DerivedKey::derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(key.bytes)
        )
    }

    /// Check a password against a stored hash. Wrong password is `Ok(false)`;
    /// only an unreadable stored value is an error.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, CryptoError> {
        let mut parts = stored.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(CryptoError::MalformedHash);
        };

        if scheme != SCHEME {
            return Err(CryptoError::UnsupportedScheme(scheme.to_string()));
        }
        let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
        if iterations == 0 {
            return Err(CryptoError::MalformedHash);
        }
        let salt = STANDARD_NO_PAD
            .decode(salt)
            .map_err(|_| CryptoError::MalformedHash)?;
        let mut expected = STANDARD_NO_PAD
            .decode(hash)
            .map_err(|_| CryptoError::MalformedHash)?;
        if expected.len() != HASH_LENGTH {
            return Err(CryptoError::MalformedHash);
        }

        let key = DerivedKey::derive(password, &salt, iterations);
        let matches: bool = key.bytes[..].ct_eq(&expected[..]).into();
        expected.zeroize();
        Ok(matches)
    }
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast();
        let stored = hasher.hash("correct horse");
        assert!(stored.starts_with("pbkdf2_sha256$1000$"));
        assert!(hasher.verify("correct horse", &stored).unwrap());
        assert!(!hasher.verify("wrong horse", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hasher = fast();
        assert_ne!(hasher.hash("password"), hasher.hash("password"));
    }

    #[test]
    fn stored_iteration_count_wins_over_configured() {
        let stored = PasswordHasher::new(500).hash("password");
        assert!(fast().verify("password", &stored).unwrap());
    }

    #[test]
    fn plaintext_never_appears_in_hash() {
        let stored = fast().hash("hunter2-secret");
        assert!(!stored.contains("hunter2-secret"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = fast();
        assert!(matches!(hasher.verify("x", "garbage"), Err(CryptoError::MalformedHash)));
        assert!(matches!(
            hasher.verify("x", "bcrypt$10$abc$def"),
            Err(CryptoError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            hasher.verify("x", "pbkdf2_sha256$0$AAAA$AAAA"),
            Err(CryptoError::MalformedHash)
        ));
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn default_uses_full_iteration_count() {
        assert_eq!(PasswordHasher::default().iterations(), PBKDF2_ITERATIONS);
    }
}
