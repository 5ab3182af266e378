use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of validation aspects.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationAspects(u32);

impl ValidationAspects {
    pub const NONE: Self = Self(0);
    /// Connectors that are written but never read.
    pub const DEAD_END: Self = Self(1);
    /// Cycles that can never reach an exit.
    pub const INFINITE_LOOP: Self = Self(1 << 1);
    /// No all-success path from start to end.
    pub const LUCKY_STREAK: Self = Self(1 << 2);
    /// Steps whose inputs nothing produces.
    pub const LONE_WOLF: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Self::DEAD_END => Some("DeadEnd"),
            Self::INFINITE_LOOP => Some("InfiniteLoop"),
            Self::LUCKY_STREAK => Some("LuckyStreak"),
            Self::LONE_WOLF => Some("LoneWolf"),
            _ => None,
        }
    }
}

impl Default for ValidationAspects {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for ValidationAspects {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ValidationAspects {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ValidationAspects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        let names: Vec<_> = [
            Self::DEAD_END,
            Self::INFINITE_LOOP,
            Self::LUCKY_STREAK,
            Self::LONE_WOLF,
        ]
        .into_iter()
        .filter(|a| self.contains(*a))
        .filter_map(Self::name)
        .collect();
        if names.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

impl fmt::Debug for ValidationAspects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationAspects({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_and_contains() {
        let aspects = ValidationAspects::DEAD_END | ValidationAspects::LONE_WOLF;
        assert!(aspects.contains(ValidationAspects::DEAD_END));
        assert!(!aspects.contains(ValidationAspects::LUCKY_STREAK));
        assert!(ValidationAspects::ALL.contains(aspects));
        assert_eq!(aspects.to_string(), "DeadEnd | LoneWolf");
        assert_eq!(ValidationAspects::NONE.to_string(), "None");
        assert_eq!(ValidationAspects::from_bits_truncate(0xff), ValidationAspects::ALL);
    }
}
