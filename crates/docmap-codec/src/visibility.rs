//! Per-field data-flow rules.
//!
//! A field's [`Visibility`] decides whether it is written into documents,
//! read back out of them, both, or neither. Visibility never affects what the
//! store holds; a suppressed field simply keeps its default value on decode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a codec pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Typed object to document.
    Encode,
    /// Document to typed object.
    Decode,
}

/// Which directions a field takes part in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Written and read.
    #[default]
    ReadWrite,
    /// Written to documents, never populated from them.
    WriteOnly,
    /// Populated from documents, never written to them.
    ReadOnly,
    /// Neither written nor read.
    Ignored,
}

impl Visibility {
    /// Returns `true` if a field with this visibility participates in `direction`.
    pub fn participates(self, direction: Direction) -> bool {
        match (self, direction) {
            (Self::ReadWrite, _) => true,
            (Self::WriteOnly, Direction::Encode) => true,
            (Self::ReadOnly, Direction::Decode) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadWrite => write!(f, "read_write"),
            Self::WriteOnly => write!(f, "write_only"),
            Self::ReadOnly => write!(f, "read_only"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_both_directions() {
        assert!(Visibility::ReadWrite.participates(Direction::Encode));
        assert!(Visibility::ReadWrite.participates(Direction::Decode));
    }

    #[test]
    fn write_only_encode_only() {
        assert!(Visibility::WriteOnly.participates(Direction::Encode));
        assert!(!Visibility::WriteOnly.participates(Direction::Decode));
    }

    #[test]
    fn read_only_decode_only() {
        assert!(!Visibility::ReadOnly.participates(Direction::Encode));
        assert!(Visibility::ReadOnly.participates(Direction::Decode));
    }

    #[test]
    fn ignored_never() {
        assert!(!Visibility::Ignored.participates(Direction::Encode));
        assert!(!Visibility::Ignored.participates(Direction::Decode));
    }

    #[test]
    fn absent_metadata_is_read_write() {
        assert_eq!(Visibility::default(), Visibility::ReadWrite);
        assert!(Visibility::default().participates(Direction::Decode));
    }

    #[test]
    fn display() {
        assert_eq!(Visibility::WriteOnly.to_string(), "write_only");
        assert_eq!(Visibility::default().to_string(), "read_write");
    }
}
