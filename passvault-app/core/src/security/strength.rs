//! Static password policy and entropy-based crack-time estimates.
//!
//! `assess_strength` is the gate for master passwords. It is a heuristic
//! complement to entropy, not a replacement for it.

use serde::Serialize;

use crate::security::generator::{entropy_bits, DIGITS, LOWERCASE, SYMBOLS, UPPERCASE};

pub const MIN_POLICY_LENGTH: usize = 8;

/// Offline attacker against a fast hash; deliberately pessimistic.
pub const DEFAULT_GUESSES_PER_SECOND: f64 = 1e10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrengthReport {
    pub is_valid: bool,
    pub reasons: Vec<String>,
}

pub fn assess_strength(password: &str) -> StrengthReport {
    let mut reasons = Vec::new();

    if password.chars().count() < MIN_POLICY_LENGTH {
        reasons.push(format!(
            "Password must be at least {} characters long",
            MIN_POLICY_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        reasons.push("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        reasons.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        reasons.push("Password must contain a digit".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_punctuation()) {
        reasons.push("Password must contain a special character".to_string());
    }

    StrengthReport {
        is_valid: reasons.is_empty(),
        reasons,
    }
}

/// Entropy of an arbitrary password, assuming it was drawn uniformly from the
/// union of the character classes it uses.
pub fn estimate_entropy(password: &str) -> f64 {
    let mut charset_size = 0;
    if password.chars().any(|c| LOWERCASE.contains(c)) {
        charset_size += LOWERCASE.len();
    }
    if password.chars().any(|c| UPPERCASE.contains(c)) {
        charset_size += UPPERCASE.len();
    }
    if password.chars().any(|c| DIGITS.contains(c)) {
        charset_size += DIGITS.len();
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        charset_size += SYMBOLS.len();
    }
    entropy_bits(password.chars().count(), charset_size)
}

/// Expected seconds to find the password: half the keyspace at `guesses_per_second`.
pub fn crack_time_seconds(entropy_bits: f64, guesses_per_second: f64) -> f64 {
    2f64.powf(entropy_bits) / (2.0 * guesses_per_second)
}

pub fn describe_crack_time(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;
    const YEAR: f64 = 365.25 * DAY;

    let plural = |n: f64, unit: &str| {
        let n = n.floor() as u64;
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    if !seconds.is_finite() || seconds >= 100.0 * YEAR {
        "centuries".to_string()
    } else if seconds < 1.0 {
        "instantly".to_string()
    } else if seconds < MINUTE {
        plural(seconds, "second")
    } else if seconds < HOUR {
        plural(seconds / MINUTE, "minute")
    } else if seconds < DAY {
        plural(seconds / HOUR, "hour")
    } else if seconds < YEAR {
        plural(seconds / DAY, "day")
    } else {
        plural(seconds / YEAR, "year")
    }
}
