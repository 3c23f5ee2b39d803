use core::fmt::{self, Display, Formatter};
use dom::DomException;

/// Errors surfaced to users of a live binding.
#[derive(Debug)]
pub enum Error {
    /// Bad construction options.
    Configuration(String),
    /// No window is installed on this thread.
    Environment,
    /// A key lacks the `--` prefix while autoprefixing is off.
    InvalidName { name: String },
    /// The binding was stopped.
    Revoked,
    /// The binding was called back while it was updating its own state.
    Reentrant,
    /// The host document rejected a write.
    Host(anyhow::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "[CSSGlobalProperties] - {message}"),
            Self::Environment => f.write_str(
                "[CSSGlobalProperties] - This library only works in the browser environment",
            ),
            Self::InvalidName { name } => write!(
                f,
                "[createNormalizer] - Invalid CSS Variable name {name:?}. Name must start with \"--\" (autoprefix=false)"
            ),
            Self::Revoked => f.write_str(
                "[CSSGlobalProperties] - Cannot perform operation on a stopped instance",
            ),
            Self::Reentrant => f.write_str(
                "[CSSGlobalProperties] - Cannot access the instance while it is updating",
            ),
            Self::Host(err) => write!(f, "[CSSGlobalProperties] - host operation failed: {err:#}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Host(err)
    }
}

impl From<DomException> for Error {
    fn from(err: DomException) -> Self {
        Self::Host(err.into())
    }
}

/// Why one stylesheet was skipped during a scan. Never escapes a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// The rules are hidden by the same-origin policy; the owner was marked ignored.
    CorsAccess(DomException),
    /// Any other failure reading the rules.
    Unexpected(DomException),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorsAccess(err) => write!(
                f,
                "Cross Origin Policy restrictions are blocking the access to the CSS rules of a remote stylesheet. \
                 The affected stylesheet is going to be ignored. ({err})"
            ),
            Self::Unexpected(err) => write!(f, "Unexpected error reading CSS properties. ({err})"),
        }
    }
}

impl std::error::Error for ScanError {}
