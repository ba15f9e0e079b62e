use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::error;
use rand::rngs::OsRng;

/// Salted, deliberately slow, one-way password hashing.
///
/// Digests are PHC strings (`$argon2id$v=19$...`), so the salt and
/// cost parameters travel with the hash and old digests keep verifying
/// if the parameters change.
#[derive(Clone, Default)]
pub struct Hasher {
    argon2: Argon2<'static>,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum-cost parameters, tests would crawl otherwise.
    #[cfg(test)]
    pub fn fast() -> Self {
        use argon2::{Algorithm, Params, Version};

        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .expect("minimum argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, ()> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("couldn't hash password: {e}");
            })
    }

    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("stored password hash is unparseable: {e}");
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let hasher = Hasher::fast();
        let digest = hasher.hash("hunter2").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(!digest.contains("hunter2"));
        assert!(hasher.verify("hunter2", &digest));
        assert!(!hasher.verify("hunter3", &digest));
        assert!(!hasher.verify("", &digest));
    }

    #[test]
    fn salted() {
        let hasher = Hasher::fast();

        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("same", &a));
        assert!(hasher.verify("same", &b));
    }

    #[test]
    fn cost_travels_with_digest() {
        let digest = Hasher::fast().hash("pw").unwrap();

        // a hasher with different parameters still checks against the stored ones
        assert!(Hasher::new().verify("pw", &digest));
    }

    #[test]
    fn garbage_digest() {
        let hasher = Hasher::fast();

        assert!(!hasher.verify("pw", "pw"));
        assert!(!hasher.verify("pw", ""));
    }
}
