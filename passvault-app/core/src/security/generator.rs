//! Random password generation from selectable character classes.
//!
//! Indices are drawn from the OS CSPRNG with rejection sampling, so every
//! character of the set is equally likely. Entropy is reported as
//! `length * log2(charset_size)`.
//!
//! The symbol class is every printable ASCII non-alphanumeric, space
//! included, so all four classes together cover exactly the 95 printable
//! ASCII characters. A generated password can therefore start or end with a
//! space; front ends should show it delimited and copy it verbatim. Leave
//! symbols out with `use_symbols: false` where a site rejects them.

use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::vault::salt::random_u32;

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
/// Every printable ASCII character that is not a letter or digit, space included.
pub const SYMBOLS: &str = " !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 128;
/// Lower bound used when generating a password for a stored entry.
pub const ENTRY_MIN_LENGTH: usize = 8;
pub const DEFAULT_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub length: usize,
    pub use_symbols: bool,
    pub use_numbers: bool,
    pub use_uppercase: bool,
    pub use_lowercase: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            use_symbols: true,
            use_numbers: true,
            use_uppercase: true,
            use_lowercase: true,
        }
    }
}

impl GeneratorOptions {
    pub fn with_length(length: usize) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    /// Union of the selected classes.
    pub fn charset(&self) -> Vec<char> {
        let mut charset = Vec::new();
        if self.use_lowercase {
            charset.extend(LOWERCASE.chars());
        }
        if self.use_uppercase {
            charset.extend(UPPERCASE.chars());
        }
        if self.use_numbers {
            charset.extend(DIGITS.chars());
        }
        if self.use_symbols {
            charset.extend(SYMBOLS.chars());
        }
        charset
    }
}

#[derive(Clone, Serialize)]
pub struct GeneratedPassword {
    #[serde(skip)]
    password: Zeroizing<String>,
    pub entropy_bits: f64,
    pub charset_size: usize,
}

impl GeneratedPassword {
    pub fn as_str(&self) -> &str {
        &self.password
    }

    pub fn len(&self) -> usize {
        self.password.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_empty()
    }
}

impl std::fmt::Debug for GeneratedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedPassword")
            .field("password", &"[REDACTED]")
            .field("entropy_bits", &self.entropy_bits)
            .field("charset_size", &self.charset_size)
            .finish()
    }
}

/// `length * log2(charset_size)`; zero for an empty set.
pub fn entropy_bits(length: usize, charset_size: usize) -> f64 {
    if charset_size == 0 {
        return 0.0;
    }
    length as f64 * (charset_size as f64).log2()
}

/// Generate a password of 4 to 128 characters.
pub fn generate(options: &GeneratorOptions) -> Result<GeneratedPassword> {
    generate_within(options, MIN_LENGTH, MAX_LENGTH)
}

/// Generate a password for a vault entry (8 to 128 characters).
pub fn generate_for_entry(options: &GeneratorOptions) -> Result<GeneratedPassword> {
    generate_within(options, ENTRY_MIN_LENGTH, MAX_LENGTH)
}

fn generate_within(options: &GeneratorOptions, min: usize, max: usize) -> Result<GeneratedPassword> {
    if !(min..=max).contains(&options.length) {
        return Err(Error::Validation(format!(
            "Length must be between {} and {}",
            min, max
        )));
    }

    let charset = options.charset();
    if charset.is_empty() {
        return Err(Error::Validation(
            "Select at least one character type".into(),
        ));
    }

    let mut password = Zeroizing::new(String::with_capacity(options.length));
    for _ in 0..options.length {
        let index = uniform_index(charset.len() as u32)?;
        password.push(charset[index as usize]);
    }

    let entropy = entropy_bits(options.length, charset.len());
    debug!(
        length = options.length,
        charset_size = charset.len(),
        "Generated password with {:.1} bits of entropy",
        entropy
    );

    Ok(GeneratedPassword {
        password,
        entropy_bits: entropy,
        charset_size: charset.len(),
    })
}

/// Uniform value in `0..bound` without modulo bias.
fn uniform_index(bound: u32) -> Result<u32> {
    // Values at or above the last full multiple of `bound` would favour low indices
    let accept_below = (u32::MAX / bound) * bound;
    loop {
        let value = random_u32()?;
        if value < accept_below {
            return Ok(value % bound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_class_sizes() {
        assert_eq!(LOWERCASE.len(), 26);
        assert_eq!(UPPERCASE.len(), 26);
        assert_eq!(DIGITS.len(), 10);
        assert_eq!(SYMBOLS.len(), 33);

        let all: HashSet<char> = GeneratorOptions::default().charset().into_iter().collect();
        assert_eq!(all.len(), 95);
        assert!(all.iter().all(|c| (' '..='~').contains(c)));
        assert!(all.contains(&' '));
    }

    #[test]
    fn test_all_classes_length_16() {
        let allowed: HashSet<char> = GeneratorOptions::default().charset().into_iter().collect();
        for _ in 0..50 {
            let generated = generate(&GeneratorOptions::with_length(16)).unwrap();
            assert_eq!(generated.len(), 16);
            assert!(generated.as_str().chars().all(|c| allowed.contains(&c)));
            assert_eq!(generated.charset_size, 95);
            assert!((generated.entropy_bits - 16.0 * 95f64.log2()).abs() < 1e-9);
            assert!((generated.entropy_bits - 105.1).abs() < 0.1);
        }
    }

    #[test]
    fn test_single_class() {
        let options = GeneratorOptions {
            length: 32,
            use_symbols: false,
            use_numbers: true,
            use_uppercase: false,
            use_lowercase: false,
        };
        let generated = generate(&options).unwrap();
        assert!(generated.as_str().chars().all(|c| c.is_ascii_digit()));
        assert!((generated.entropy_bits - 32.0 * 10f64.log2()).abs() < 1e-9);
    }

    #[test]
    fn test_no_classes_is_validation_error() {
        let options = GeneratorOptions {
            length: 16,
            use_symbols: false,
            use_numbers: false,
            use_uppercase: false,
            use_lowercase: false,
        };
        assert!(matches!(generate(&options), Err(Error::Validation(_))));
    }

    #[test]
    fn test_length_bounds() {
        assert!(generate(&GeneratorOptions::with_length(3)).is_err());
        assert!(generate(&GeneratorOptions::with_length(4)).is_ok());
        assert!(generate(&GeneratorOptions::with_length(128)).is_ok());
        assert!(generate(&GeneratorOptions::with_length(129)).is_err());

        assert!(matches!(
            generate_for_entry(&GeneratorOptions::with_length(7)),
            Err(Error::Validation(_))
        ));
        assert!(generate_for_entry(&GeneratorOptions::with_length(8)).is_ok());
    }

    #[test]
    fn test_uniform_index_in_range() {
        for bound in [1u32, 2, 10, 95] {
            for _ in 0..200 {
                assert!(uniform_index(bound).unwrap() < bound);
            }
        }
    }

    #[test]
    fn test_every_digit_eventually_appears() {
        let options = GeneratorOptions {
            length: 128,
            use_symbols: false,
            use_numbers: true,
            use_uppercase: false,
            use_lowercase: false,
        };
        let seen: HashSet<char> = generate(&options).unwrap().as_str().chars().collect();
        // P(some digit missing from 128 draws) < 10 * 0.9^128 ≈ 1.4e-5
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_debug_is_redacted() {
        let generated = generate(&GeneratorOptions::default()).unwrap();
        assert!(!format!("{:?}", generated).contains(generated.as_str()));
    }
}
