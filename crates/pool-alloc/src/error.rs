//! Errors reported by the pool allocator.
//!
//! Every error records where it was raised through [`Location`], which snafu
//! fills in implicitly. The type is defined here rather than taken from a
//! shared utility crate so the allocator has no dependencies outside the
//! registry.

use core::fmt;

use snafu::{GenerateImplicitData, Snafu};

/// Source location at which an error was raised.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static core::panic::Location<'static>);

impl Location {
    /// Returns the file in which the error was raised.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    /// Returns the line at which the error was raised.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl Default for Location {
    #[track_caller]
    fn default() -> Self {
        Self(core::panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Error returned when an allocation request cannot be served.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AllocError {
    /// A zero-byte allocation was requested.
    #[snafu(display("zero-sized allocation requested"))]
    ZeroSize {
        #[snafu(implicit)]
        location: Location,
    },
    /// Neither the system allocator nor any free list could provide memory.
    #[snafu(display("out of memory while allocating {size} bytes"))]
    OutOfMemory {
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl AllocError {
    /// Returns the location at which the error was raised.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::ZeroSize { location } | Self::OutOfMemory { location, .. } => *location,
        }
    }
}
