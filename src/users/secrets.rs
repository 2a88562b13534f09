use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{rngs::OsRng, seq::SliceRandom, Rng};
use tracing::error;

use super::validation::validate_password;

const PHRASE_WORDS: usize = 12;
const PASSWORD_LEN: usize = 16;
const SPACE_ID_LEN: usize = 9;

const WORDLIST: &[&str] = &[
    "aurora", "binary", "comet", "cosmos", "crater", "eclipse", "galaxy", "gravity", "horizon",
    "ion", "lunar", "meteor", "nebula", "nova", "orbit", "photon", "planet", "pulsar", "quasar",
    "radiant", "rocket", "saturn", "signal", "solar", "space", "stellar", "titan", "vector",
    "velvet", "vortex", "zenith", "zodiac",
];

const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn hash_secret(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_secret_hash(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Twelve space-separated words.
pub fn generate_recovery_phrase() -> String {
    let mut rng = rand::thread_rng();
    (0..PHRASE_WORDS)
        .filter_map(|_| WORDLIST.choose(&mut rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A random password that passes the password rules.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..PASSWORD_LEN)
            .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
            .collect();
        if validate_password(&candidate).is_empty() {
            return candidate;
        }
    }
}

/// `sp_` followed by nine base-36 characters.
pub fn generate_space_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SPACE_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("sp_{}", suffix)
}
