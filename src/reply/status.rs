//! Operation statuses and structured errors
//!
//! Command execution reports failures as an [`OpStatus`]; builders turn them
//! into protocol error lines through the configurable [`ErrorTable`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Message used for syntax errors; counted under the `syntax_error` kind
pub const SYNTAX_ERR: &str = "syntax error";

/// Text sent for statuses the error table does not map
pub const GENERIC_ERR: &str = "Internal error";

/// Outcome of a command as reported by the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpStatus {
    Ok,
    KeyExists,
    KeyNotFound,
    Skipped,
    InvalidValue,
    OutOfRange,
    WrongType,
    TimedOut,
    OutOfMemory,
    InvalidFloat,
    InvalidInt,
    SyntaxErr,
    BusyGroup,
    StreamIdSmall,
    EntriesAddedSmall,
    InvalidNumericResult,
    Cancelled,
}

/// Machine-distinguishable error category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ErrorKind {
    /// No category; the message itself identifies the error
    #[default]
    Generic,
    Syntax,
    WrongType,
    NotFound,
    OutOfRange,
    InvalidInt,
    InvalidFloat,
    InvalidValue,
    OutOfMemory,
    Timeout,
    Protocol,
    Server,
    Custom(Cow<'static, str>),
}

impl ErrorKind {
    /// Tag used in statistics, `None` for [`ErrorKind::Generic`]
    pub fn tag(&self) -> Option<&str> {
        let tag = match self {
            ErrorKind::Generic => return None,
            ErrorKind::Syntax => "syntax_error",
            ErrorKind::WrongType => "wrong_type",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::InvalidInt => "invalid_int",
            ErrorKind::InvalidFloat => "invalid_float",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::OutOfMemory => "out_of_memory",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol_error",
            ErrorKind::Server => "server_error",
            ErrorKind::Custom(tag) => tag.as_ref(),
        };
        Some(tag)
    }
}

/// An error message together with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub message: Cow<'static, str>,
    pub kind: ErrorKind,
    /// When set, the reply is rendered from this status instead of `message`
    pub status: Option<OpStatus>,
}

impl ErrorReply {
    pub fn new(message: impl Into<Cow<'static, str>>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    pub fn from_status(status: OpStatus) -> Self {
        Self {
            message: Cow::Borrowed(""),
            kind: ErrorKind::Generic,
            status: Some(status),
        }
    }
}

impl From<OpStatus> for ErrorReply {
    fn from(status: OpStatus) -> Self {
        ErrorReply::from_status(status)
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?}", status),
            None => f.write_str(&self.message),
        }
    }
}

/// Status-to-error mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTable {
    entries: HashMap<OpStatus, ErrorReply>,
    fallback: ErrorReply,
}

impl ErrorTable {
    /// A table with no mappings; every status renders as the fallback
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: ErrorReply::new(GENERIC_ERR, ErrorKind::Server),
        }
    }

    /// Map `status` to `message` and `kind`, replacing any previous entry
    pub fn insert(&mut self, status: OpStatus, message: impl Into<Cow<'static, str>>, kind: ErrorKind) {
        self.entries.insert(status, ErrorReply::new(message, kind));
    }

    /// Reply used for unmapped statuses
    pub fn set_fallback(&mut self, message: impl Into<Cow<'static, str>>, kind: ErrorKind) {
        self.fallback = ErrorReply::new(message, kind);
    }

    pub fn lookup(&self, status: OpStatus) -> &ErrorReply {
        self.entries.get(&status).unwrap_or(&self.fallback)
    }
}

impl Default for ErrorTable {
    fn default() -> Self {
        use ErrorKind as K;
        use OpStatus as S;

        let mut table = ErrorTable::empty();
        table.insert(S::KeyNotFound, "no such key", K::NotFound);
        table.insert(
            S::WrongType,
            "-WRONGTYPE Operation against a key holding the wrong kind of value",
            K::WrongType,
        );
        table.insert(S::OutOfRange, "index out of range", K::OutOfRange);
        table.insert(S::InvalidInt, "value is not an integer or out of range", K::InvalidInt);
        table.insert(S::InvalidFloat, "value is not a valid float", K::InvalidFloat);
        table.insert(S::InvalidValue, "value is not valid", K::InvalidValue);
        table.insert(S::SyntaxErr, SYNTAX_ERR, K::Syntax);
        table.insert(S::OutOfMemory, "Out of memory", K::OutOfMemory);
        table.insert(S::TimedOut, "timed out", K::Timeout);
        table.insert(
            S::BusyGroup,
            "-BUSYGROUP Consumer Group name already exists",
            K::InvalidValue,
        );
        table.insert(
            S::StreamIdSmall,
            "The ID specified in XADD is equal or smaller than the target stream top item",
            K::InvalidValue,
        );
        table.insert(
            S::InvalidNumericResult,
            "increment would produce NaN or Infinity",
            K::InvalidValue,
        );
        table.insert(S::Cancelled, "Command was cancelled", K::Server);
        table
    }
}
