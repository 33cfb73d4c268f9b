//! Error handling for NUMA topology and placement operations.

use std::fmt;
use std::io;
use std::result;

/// A specialized `Result` type for NUMA operations.
pub type Result<T> = result::Result<T, Error>;

/// The kind of identifier that failed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// A memory node identifier.
    Node,

    /// A CPU identifier.
    Cpu,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Node => f.write_str("node"),
            IdKind::Cpu => f.write_str("cpu"),
        }
    }
}

/// Errors that can occur while querying topology or changing placement.
#[derive(Debug)]
pub enum Error {
    /// A node or CPU id lies outside the live topology.
    OutOfRange {
        /// Whether `id` names a node or a CPU.
        kind: IdKind,
        /// The rejected identifier.
        id: usize,
        /// The largest valid identifier at the time of the check.
        max: usize,
    },

    /// A range expression could not be parsed.
    InvalidRangeFormat(String),

    /// The provider rejected a node specification.
    InvalidNodeSpec(String),

    /// The provider rejected a CPU specification.
    InvalidCpuSpec(String),

    /// An underlying provider call failed.
    Provider {
        /// Name of the provider operation.
        op: &'static str,
        /// The error reported by the provider, usually an OS error.
        source: io::Error,
    },

    /// The native NUMA library could not be loaded.
    Unavailable(String),

    /// The native NUMA library lacks a required entry point.
    MissingSymbol(&'static str),

    /// An I/O error occurred.
    Io(io::Error),
}

impl Error {
    /// Build a provider failure from the calling thread's last OS error.
    pub(crate) fn last_os_error(op: &'static str) -> Error {
        Error::Provider { op, source: io::Error::last_os_error() }
    }

    /// Build a provider failure with a fixed message.
    pub fn provider(op: &'static str, msg: &str) -> Error {
        Error::Provider { op, source: io::Error::new(io::ErrorKind::Other, msg.to_string()) }
    }

    pub(crate) fn node_out_of_range(id: usize, max: usize) -> Error {
        Error::OutOfRange { kind: IdKind::Node, id, max }
    }

    pub(crate) fn cpu_out_of_range(id: usize, max: usize) -> Error {
        Error::OutOfRange { kind: IdKind::Cpu, id, max }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfRange { kind, id, max } => {
                write!(f, "{} {} out of range (valid: 0..={})", kind, id, max)
            }
            Error::InvalidRangeFormat(text) => write!(f, "Invalid range format: {:?}", text),
            Error::InvalidNodeSpec(spec) => write!(f, "Invalid node specification: {:?}", spec),
            Error::InvalidCpuSpec(spec) => write!(f, "Invalid cpu specification: {:?}", spec),
            Error::Provider { op, source } => write!(f, "NUMA provider call {} failed: {}", op, source),
            Error::Unavailable(msg) => write!(f, "NUMA library unavailable: {}", msg),
            Error::MissingSymbol(name) => write!(f, "NUMA library lacks symbol {}", name),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provider { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
