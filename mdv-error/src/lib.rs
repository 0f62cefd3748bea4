#![deny(missing_docs)]
#![feature(error_generic_member_access)]

//! Error handling for the MDV column store.
//!
//! Every fallible operation in the workspace returns [`MdvResult`]. Errors are grouped into a
//! small set of categories so that callers can tell a contract violation (bad field name,
//! malformed input) apart from an I/O failure without parsing messages.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The category of an [`MdvError`], stripped of its message and backtrace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown or missing column or data source, or a malformed descriptor.
    Schema,
    /// Values that cannot be encoded under the requested datatype.
    Encoding,
    /// A row index, subgroup stub or field that is absent.
    NotFound,
    /// Lock misuse or container state observed mid-write.
    Consistency,
    /// Failure of the underlying filesystem.
    Io,
    /// Malformed JSON metadata.
    Json,
}

/// The top-level error type for MDV.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum MdvError {
    /// Unknown column or data source, or a descriptor that disagrees with stored data.
    #[error("schema error: {0}\nBacktrace:\n{1}")]
    Schema(ErrString, Backtrace),
    /// Input that cannot be represented by the declared datatype.
    #[error("encoding error: {0}\nBacktrace:\n{1}")]
    Encoding(ErrString, Backtrace),
    /// A requested unit (field, subgroup, row) does not exist.
    #[error("not found: {0}\nBacktrace:\n{1}")]
    NotFound(ErrString, Backtrace),
    /// The project lock was misused or the container was observed in a torn state.
    #[error("consistency error: {0}\nBacktrace:\n{1}")]
    Consistency(ErrString, Backtrace),
    /// An error wrapped with additional context.
    #[error("{0}: {1}")]
    Context(ErrString, Box<MdvError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
}

impl MdvError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        MdvError::Context(msg.into(), Box::new(self))
    }

    /// The category of this error, looking through any added context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MdvError::Schema(..) => ErrorKind::Schema,
            MdvError::Encoding(..) => ErrorKind::Encoding,
            MdvError::NotFound(..) => ErrorKind::NotFound,
            MdvError::Consistency(..) => ErrorKind::Consistency,
            MdvError::Context(_, inner) => inner.kind(),
            MdvError::IOError(_) => ErrorKind::Io,
            MdvError::JSONError(_) => ErrorKind::Json,
        }
    }

    /// The error message without the captured backtrace.
    pub fn message(&self) -> String {
        match self {
            MdvError::Schema(msg, _)
            | MdvError::Encoding(msg, _)
            | MdvError::NotFound(msg, _)
            | MdvError::Consistency(msg, _) => msg.to_string(),
            MdvError::Context(msg, inner) => format!("{msg}: {}", inner.message()),
            MdvError::IOError(err) => err.to_string(),
            MdvError::JSONError(err) => err.to_string(),
        }
    }
}

impl Debug for MdvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return MdvErrors as their error type.
pub type MdvResult<T> = Result<T, MdvError>;

/// A trait for expect-ing an MdvResult or an Option.
pub trait MdvExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn mdv_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> MdvExpect for Result<T, E>
where
    E: Into<MdvError>,
{
    type Output = T;

    #[inline(always)]
    fn mdv_expect(self, msg: &str) -> Self::Output {
        self.map_err(Into::<MdvError>::into)
            .unwrap_or_else(|e| crate::mdv_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> MdvExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn mdv_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = MdvError::Consistency(msg.to_string().into(), Backtrace::capture());
            crate::mdv_panic!(err)
        })
    }
}

/// Construct a new error with a backtrace.
///
/// The category defaults to `Schema` when it is not named:
/// `mdv_err!("no column {field}")` or `mdv_err!(NotFound: "row {} out of range", row)`.
#[macro_export]
macro_rules! mdv_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::MdvError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mdv_err!(Schema: $fmt, $($arg),*)
    };
}

/// Constructs a new error and returns it from the enclosing function.
#[macro_export]
macro_rules! mdv_bail {
    ($($tt:tt)+) => {
        return Err($crate::mdv_err!($($tt)+))
    };
}

/// Constructs a new error and panics with it.
#[macro_export]
macro_rules! mdv_panic {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mdv_panic!($crate::mdv_err!($variant: $fmt, $($arg),*))
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mdv_panic!($crate::mdv_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::MdvError = $err;
        panic!("{}", err)
    }};
}
