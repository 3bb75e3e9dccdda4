//! Error and validation-result types for the Iris File Extension engine.
//!
//! Validation routines do not raise: they return an [`Outcome`], a flag
//! bit-set plus a human-readable message, so that warnings (version skew,
//! duplicate labels, zero-valued recommended fields) can ride along with a
//! successful result. Read and write routines convert any failure bit into an
//! [`ExtensionError`] at the public API boundary.

use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

// =============================================================================
// Flags
// =============================================================================

/// Bit-set over the validation outcome states.
///
/// `SUCCESS` is the empty set. A warning bit may be combined with success;
/// either failure bit makes the outcome a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// No warning or failure bits set.
    pub const SUCCESS: Flags = Flags(0);

    /// A recoverable validation concern; reads and writes proceed.
    pub const WARNING_VALIDATION: Flags = Flags(0b0001);

    /// A structural check failed (offset, recovery tag, stored size, bounds).
    pub const VALIDATION_FAILURE: Flags = Flags(0b0010);

    /// A hard failure (wrong magic, invariant violation, unreadable region).
    pub const FAILURE: Flags = Flags(0b0100);

    /// Either failure bit.
    pub const FAILURE_MASK: Flags = Flags(0b0110);

    /// True if any bit of `other` is present in `self`.
    #[inline]
    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    /// True if no failure bit is set.
    #[inline]
    pub fn is_success(self) -> bool {
        !self.intersects(Flags::FAILURE_MASK)
    }

    /// True if either failure bit is set.
    #[inline]
    pub fn is_failure(self) -> bool {
        self.intersects(Flags::FAILURE_MASK)
    }

    /// True if the warning bit is set.
    #[inline]
    pub fn is_warning(self) -> bool {
        self.intersects(Flags::WARNING_VALIDATION)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// The result of a validation routine: a [`Flags`] bit-set and a message.
///
/// Warnings do not halt a read or a write; failures do. Use
/// [`Outcome::into_result`] to convert at the public boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub flags: Flags,
    pub message: String,
}

impl Outcome {
    /// A clean success with no message.
    pub fn success() -> Self {
        Outcome {
            flags: Flags::SUCCESS,
            message: String::new(),
        }
    }

    /// A success carrying a warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Outcome {
            flags: Flags::WARNING_VALIDATION,
            message: message.into(),
        }
    }

    /// A structural validation failure.
    pub fn validation_failure(message: impl Into<String>) -> Self {
        Outcome {
            flags: Flags::VALIDATION_FAILURE,
            message: message.into(),
        }
    }

    /// A hard failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome {
            flags: Flags::FAILURE,
            message: message.into(),
        }
    }

    /// True if either failure bit is set.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.flags.is_failure()
    }

    /// True if the warning bit is set.
    #[inline]
    pub fn is_warning(&self) -> bool {
        self.flags.is_warning()
    }

    /// Combine two outcomes: flags union, messages joined.
    pub fn merge(mut self, other: Outcome) -> Outcome {
        self.flags |= other.flags;
        if !other.message.is_empty() {
            if self.message.is_empty() {
                self.message = other.message;
            } else {
                self.message.push_str("; ");
                self.message.push_str(&other.message);
            }
        }
        self
    }

    /// Convert a failure into an [`ExtensionError`], keeping warnings silent.
    pub fn into_result(self) -> Result<(), ExtensionError> {
        if self.is_failure() {
            Err(ExtensionError::Validation(self.message))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// ExtensionError
// =============================================================================

/// Errors raised by the read and write pipelines.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The magic number or a recovery tag did not match: the region is not an
    /// Iris file, or it is badly corrupted.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// A validation routine reported a failure bit.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A declared offset, array bound, or cross-block total disagreed with
    /// the backing region.
    #[error("structural failure: {0}")]
    Structural(String),

    /// An on-disk enumerator fell outside the accepted set for this version.
    #[error("enumerator failure: {0}")]
    Enumerator(String),

    /// A field violated a format invariant.
    #[error("invariant failure: {0}")]
    Invariant(String),

    /// A remote range fetch failed.
    #[error(transparent)]
    Io(#[from] IoError),
}

// =============================================================================
// IoError
// =============================================================================

/// I/O errors from the remote byte-range backend.
#[derive(Debug, Error)]
pub enum IoError {
    /// The transport failed before a response was produced.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered a range request with something other than 206.
    #[error("unexpected HTTP status {status} for range request {range}")]
    UnexpectedStatus { status: u16, range: String },

    /// Requested range exceeds resource bounds.
    #[error("range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The response body did not match the requested range length.
    #[error("short range response: requested {requested} bytes, received {received}")]
    ShortResponse { requested: u64, received: u64 },
}

// =============================================================================
// Tests
// =============================================================================
