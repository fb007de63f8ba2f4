use std::io;

/// Error returned by the platform introspection sessions.
#[derive(Debug)]
pub enum ServiceError {
    /// Process introspection is not implemented for this platform.
    Unsupported,

    /// The backing session failed to initialize and every call is degraded.
    Unavailable,

    /// No process exists with the requested process id.
    UnknownProcess,

    /// No mapping covers the queried address in the target address space.
    UnmappedAddress(u64),

    /// The platform process enumeration failed.
    CannotListProcesses(io::Error),

    /// The title id of the process could not be resolved.
    CannotGetTitleId(io::Error),

    /// The module list of the process could not be read.
    CannotListModules(io::Error),

    /// The memory-permission query failed.
    CannotQueryMemory(io::Error),
}

impl ServiceError {
    /// Numeric code of the failure, printed in inline error reports.
    ///
    /// OS-backed failures use the raw os error when one exists; the other
    /// variants use small fixed codes outside the `errno` range.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Unsupported => -1,
            Self::Unavailable => -2,
            Self::UnknownProcess => -3,
            Self::UnmappedAddress(_) => -4,
            Self::CannotListProcesses(err)
            | Self::CannotGetTitleId(err)
            | Self::CannotListModules(err)
            | Self::CannotQueryMemory(err) => err.raw_os_error().unwrap_or(-5),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => {
                write!(f, "process introspection is not supported on this platform")
            }
            Self::Unavailable => write!(f, "service session is not available"),
            Self::UnknownProcess => write!(f, "unknown process"),
            Self::UnmappedAddress(addr) => write!(f, "no mapping covers address {addr:#x}"),
            Self::CannotListProcesses(err) => write!(f, "cannot list processes: {err}"),
            Self::CannotGetTitleId(err) => write!(f, "cannot get title id: {err}"),
            Self::CannotListModules(err) => write!(f, "cannot list modules: {err}"),
            Self::CannotQueryMemory(err) => write!(f, "cannot query memory: {err}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CannotListProcesses(err)
            | Self::CannotGetTitleId(err)
            | Self::CannotListModules(err)
            | Self::CannotQueryMemory(err) => Some(err),
            _ => None,
        }
    }
}
