use core::fmt::{self, Display, Formatter};

/// Exceptions raised by tree and CSSOM operations, named after their DOM counterparts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DomException {
    /// `SecurityError`: e.g. reading the rules of a cross-origin stylesheet.
    Security,
    /// `InvalidAccessError`: e.g. reading the rules of a sheet that is still loading.
    InvalidAccess,
    /// `SyntaxError`: an unparsable selector or rule.
    Syntax,
    /// `IndexSizeError`: a rule index out of range.
    IndexSize,
    /// `NotFoundError`: a node that is not where the caller expected it.
    NotFound,
    /// `HierarchyRequestError`: an insertion that would produce an invalid tree.
    HierarchyRequest,
}

impl DomException {
    /// The DOM name of the exception, e.g. `"SecurityError"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Security => "SecurityError",
            Self::InvalidAccess => "InvalidAccessError",
            Self::Syntax => "SyntaxError",
            Self::IndexSize => "IndexSizeError",
            Self::NotFound => "NotFoundError",
            Self::HierarchyRequest => "HierarchyRequestError",
        }
    }
}

impl Display for DomException {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Security => "access to the resource is blocked by the same-origin policy",
            Self::InvalidAccess => "the object is not available yet",
            Self::Syntax => "the string did not match the expected pattern",
            Self::IndexSize => "the index is not in the allowed range",
            Self::NotFound => "the object can not be found here",
            Self::HierarchyRequest => "the operation would yield an incorrect node tree",
        };
        write!(f, "{}: {message}", self.name())
    }
}

impl std::error::Error for DomException {}
