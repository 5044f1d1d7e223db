//! Credential Generation
//!
//! Usernames are synthesized from the customer's email local part;
//! passwords come from the OS CSPRNG with guaranteed character-class
//! coverage and a Fisher-Yates shuffle so the guaranteed characters
//! are not positionally predictable.

use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

/// Generated password length
pub const PASSWORD_LENGTH: usize = 16;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

const USERNAME_BASE_MAX: usize = 12;

/// Generate a panel password: at least one lowercase, uppercase,
/// digit, and symbol; the remainder uniform over the full alphabet.
pub fn generate_password() -> String {
    let mut rng = OsRng;
    let mut chars: Vec<u8> = Vec::with_capacity(PASSWORD_LENGTH);

    for class in [LOWER, UPPER, DIGITS, SYMBOLS] {
        chars.push(class[rng.gen_range(0..class.len())]);
    }

    let alphabet: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS].concat();
    while chars.len() < PASSWORD_LENGTH {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

/// Synthesize a username from an email local part: keep alphanumerics,
/// lowercase, truncate, and append a random numeric suffix for
/// collision avoidance.
pub fn synthesize_username(email_local: &str) -> String {
    let mut base: String = email_local
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(USERNAME_BASE_MAX)
        .collect();
    if base.is_empty() {
        base.push_str("player");
    }
    let suffix = OsRng.gen_range(1000..10000);
    format!("{base}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_and_classes() {
        for _ in 0..50 {
            let pw = generate_password();
            assert_eq!(pw.len(), PASSWORD_LENGTH);
            assert!(pw.bytes().any(|b| LOWER.contains(&b)), "no lowercase: {pw}");
            assert!(pw.bytes().any(|b| UPPER.contains(&b)), "no uppercase: {pw}");
            assert!(pw.bytes().any(|b| DIGITS.contains(&b)), "no digit: {pw}");
            assert!(pw.bytes().any(|b| SYMBOLS.contains(&b)), "no symbol: {pw}");
        }
    }

    #[test]
    fn test_username_synthesis() {
        let name = synthesize_username("First.Last+tag");
        let (base, suffix) = name.split_at(name.len() - 4);
        assert_eq!(base, "firstlasttag");
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_username_from_degenerate_local_part() {
        let name = synthesize_username("...");
        assert!(name.starts_with("player"));
    }

    #[test]
    fn test_username_truncation() {
        let name = synthesize_username("averyverylongmailboxname");
        // 12 base characters plus the 4-digit suffix
        assert_eq!(name.len(), 16);
    }
}
