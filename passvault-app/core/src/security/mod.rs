pub mod audit;
pub mod generator;
pub mod strength;

pub use audit::{SecurityEvent, SecurityEventKind, SecurityLogger};
pub use generator::{generate, generate_for_entry, GeneratedPassword, GeneratorOptions};
pub use strength::{
    assess_strength, crack_time_seconds, describe_crack_time, estimate_entropy, StrengthReport,
};
