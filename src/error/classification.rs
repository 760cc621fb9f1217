/// Sector error taxonomy
///
/// Every hardware or decode outcome is classified into one closed set of
/// kinds. Two predicates drive all control flow in the scanner and recovery
/// engine: fatal kinds abort the whole operation, retryable kinds may be
/// re-read within the current pass. Severity derives from the same two
/// predicates.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    Success,
    /// Sector header found but the data checksum did not match
    CrcError,
    /// No readable ID field for the sector on the track
    SectorNotFound,
    WriteProtected,
    /// Drive not selected, motor off or no media
    NotReady,
    PermissionDenied,
    DeviceDisconnected,
    Unknown,
}

impl ErrorKind {
    /// Kinds that must abort the current operation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::PermissionDenied
                | ErrorKind::NotReady
                | ErrorKind::WriteProtected
                | ErrorKind::DeviceDisconnected
        )
    }

    /// Kinds that may be reattempted within the current pass
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::CrcError | ErrorKind::SectorNotFound)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ErrorKind::Success)
    }

    pub fn severity(&self) -> Severity {
        if self.is_success() {
            Severity::Info
        } else if self.is_fatal() {
            Severity::Critical
        } else if self.is_retryable() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Success => "Sector read successfully",
            ErrorKind::CrcError => "Data checksum mismatch",
            ErrorKind::SectorNotFound => "Sector ID not found on track",
            ErrorKind::WriteProtected => "Medium is write protected",
            ErrorKind::NotReady => "Drive not ready",
            ErrorKind::PermissionDenied => "Insufficient permissions for device access",
            ErrorKind::DeviceDisconnected => "Device disconnected",
            ErrorKind::Unknown => "Unclassified failure",
        }
    }

    /// Classify an I/O error reported by a device backend
    pub fn from_io_error(err: &std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        match err.kind() {
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            Io::NotFound | Io::BrokenPipe | Io::ConnectionReset | Io::ConnectionAborted => {
                ErrorKind::DeviceDisconnected
            }
            Io::TimedOut | Io::WouldBlock => ErrorKind::NotReady,
            Io::InvalidData => ErrorKind::CrcError,
            Io::UnexpectedEof => ErrorKind::SectorNotFound,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Success => "Success",
            ErrorKind::CrcError => "CrcError",
            ErrorKind::SectorNotFound => "SectorNotFound",
            ErrorKind::WriteProtected => "WriteProtected",
            ErrorKind::NotReady => "NotReady",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::DeviceDisconnected => "DeviceDisconnected",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}
