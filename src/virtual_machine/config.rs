//! VM construction parameters.
//!
//! Stack and memory capacities are chosen per instance and validated once in
//! [`VM::new`](crate::virtual_machine::vm::VM::new). Defaults match the
//! reference design: 32 stack words and 64 KiB of memory.

use crate::virtual_machine::errors::VMError;
use std::env;

/// Default operand stack capacity in words.
pub const DEFAULT_STACK_CAPACITY: usize = 32;
/// Default memory capacity in bytes (64 KiB).
pub const DEFAULT_MEMORY_CAPACITY: u64 = 64 * 1024;
/// Largest accepted stack capacity in words.
pub const MAX_STACK_CAPACITY: usize = 1 << 20;
/// Largest accepted memory capacity in bytes (4 GiB).
pub const MAX_MEMORY_CAPACITY: u64 = 1 << 32;

/// Environment variable overriding the stack capacity.
pub const ENV_STACK_CAPACITY: &str = "STACKVM_STACK_CAPACITY";
/// Environment variable overriding the memory capacity.
pub const ENV_MEMORY_CAPACITY: &str = "STACKVM_MEMORY_CAPACITY";

/// Capacities of a single VM instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VmConfig {
    /// Number of 64-bit words the operand stack can hold.
    pub stack_capacity: usize,
    /// Number of addressable memory bytes.
    pub memory_capacity: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl VmConfig {
    pub fn new(stack_capacity: usize, memory_capacity: u64) -> Self {
        Self {
            stack_capacity,
            memory_capacity,
        }
    }

    /// Returns a copy with a different stack capacity.
    pub fn with_stack_capacity(mut self, stack_capacity: usize) -> Self {
        self.stack_capacity = stack_capacity;
        self
    }

    /// Returns a copy with a different memory capacity.
    pub fn with_memory_capacity(mut self, memory_capacity: u64) -> Self {
        self.memory_capacity = memory_capacity;
        self
    }

    /// Checks both capacities against their accepted ranges.
    pub fn validate(&self) -> Result<(), VMError> {
        if self.stack_capacity == 0 || self.stack_capacity > MAX_STACK_CAPACITY {
            return Err(VMError::InvalidConfig {
                reason: format!(
                    "stack capacity {} outside 1..={}",
                    self.stack_capacity, MAX_STACK_CAPACITY
                ),
            });
        }
        if self.memory_capacity == 0 || self.memory_capacity > MAX_MEMORY_CAPACITY {
            return Err(VMError::InvalidConfig {
                reason: format!(
                    "memory capacity {} outside 1..={}",
                    self.memory_capacity, MAX_MEMORY_CAPACITY
                ),
            });
        }
        Ok(())
    }

    /// Builds a config from the defaults overridden by
    /// `STACKVM_STACK_CAPACITY` and `STACKVM_MEMORY_CAPACITY`.
    ///
    /// Unset variables keep their default; malformed ones are an error.
    pub fn from_env() -> Result<Self, VMError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, VMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_STACK_CAPACITY) {
            let words = parse_size(&raw)?;
            config.stack_capacity = usize::try_from(words).map_err(|_| VMError::InvalidConfig {
                reason: format!("{ENV_STACK_CAPACITY}={raw} does not fit in usize"),
            })?;
        }
        if let Some(raw) = lookup(ENV_MEMORY_CAPACITY) {
            config.memory_capacity = parse_size(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parses a size such as `4096`, `0x1000`, `64K`, `16M` or `4G`.
///
/// Suffixes are binary multiples and case-insensitive.
pub fn parse_size(raw: &str) -> Result<u64, VMError> {
    let invalid = || VMError::InvalidConfig {
        reason: format!("invalid size '{raw}'"),
    };

    let text = raw.trim();
    let (digits, shift) = match text.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&text[..text.len() - 1], 10),
        Some('M') => (&text[..text.len() - 1], 20),
        Some('G') => (&text[..text.len() - 1], 30),
        _ => (text, 0),
    };

    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|_| invalid())?;

    value.checked_mul(1u64 << shift).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_matches_reference_design() {
        let config = VmConfig::default();
        assert_eq!(config.stack_capacity, 32);
        assert_eq!(config.memory_capacity, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_and_oversized() {
        assert!(VmConfig::new(0, 1024).validate().is_err());
        assert!(VmConfig::new(32, 0).validate().is_err());
        assert!(VmConfig::new(MAX_STACK_CAPACITY + 1, 1024).validate().is_err());
        assert!(
            VmConfig::new(32, MAX_MEMORY_CAPACITY + 1)
                .validate()
                .is_err()
        );
        assert!(VmConfig::new(1, MAX_MEMORY_CAPACITY).validate().is_ok());
    }

    #[test]
    fn parse_size_forms() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("64K").unwrap(), 65536);
        assert_eq!(parse_size("64k").unwrap(), 65536);
        assert_eq!(parse_size("16M").unwrap(), 16 << 20);
        assert_eq!(parse_size("4G").unwrap(), 1 << 32);
        assert_eq!(parse_size(" 8 ").unwrap(), 8);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        for raw in ["", "K", "-1", "12Q", "0x", "ten", "99999999999999999999G"] {
            assert!(
                matches!(parse_size(raw), Err(VMError::InvalidConfig { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn from_lookup_overrides_defaults() {
        let config = VmConfig::from_lookup(lookup_from(&[
            (ENV_STACK_CAPACITY, "64"),
            (ENV_MEMORY_CAPACITY, "1M"),
        ]))
        .unwrap();
        assert_eq!(config, VmConfig::new(64, 1 << 20));

        let config = VmConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, VmConfig::default());
    }

    #[test]
    fn from_lookup_validates() {
        assert!(VmConfig::from_lookup(lookup_from(&[(ENV_STACK_CAPACITY, "0")])).is_err());
        assert!(VmConfig::from_lookup(lookup_from(&[(ENV_MEMORY_CAPACITY, "8G")])).is_err());
        assert!(VmConfig::from_lookup(lookup_from(&[(ENV_MEMORY_CAPACITY, "lots")])).is_err());
    }
}
