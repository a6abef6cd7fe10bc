use std::fmt;
use std::io;

macro_rules! err {
    ($kind:ident, $msg:literal) => {
        $crate::dex::error::DexError::new($crate::dex::error::DexErrorKind::$kind, $msg)
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        $crate::dex::error::DexError::new($crate::dex::error::DexErrorKind::$kind, &format!($fmtstr, $($args)*))
    };
}

#[macro_export]
macro_rules! fail {
    ($kind:ident, $msg:literal) => {
        return Err($crate::dex::error::DexError::new($crate::dex::error::DexErrorKind::$kind, $msg))
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err($crate::dex::error::DexError::new($crate::dex::error::DexErrorKind::$kind, &format!($fmtstr, $($args)*)))
    };
}

/// Broad classification of a failure, stable enough for callers to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DexErrorKind
{
    /// The first eight bytes are not a recognised DEX magic.
    MalformedHeader,
    /// The endian tag is neither the standard nor the byte-swapped constant.
    UnsupportedEndianness,
    /// The source ended before a field or string was fully read.
    TruncatedRead,
    /// Open, seek or read failed for a reason other than end of stream.
    IoFailure,
    /// An option value supplied at the boundary was not recognised.
    InvalidOption,
    /// A table entry points outside the table it indexes.
    IndexOutOfRange,
}

impl fmt::Display for DexErrorKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let s = match self
        {
            DexErrorKind::MalformedHeader => "malformed header",
            DexErrorKind::UnsupportedEndianness => "unsupported endianness",
            DexErrorKind::TruncatedRead => "truncated read",
            DexErrorKind::IoFailure => "i/o failure",
            DexErrorKind::InvalidOption => "invalid option",
            DexErrorKind::IndexOutOfRange => "index out of range",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DexError
{
    kind: DexErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl DexError
{
    pub(crate) fn new(kind: DexErrorKind, msg: &str) -> Self
    {
        DexError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: DexError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        DexError { kind: base.kind, msg: base.msg, contexts }
    }

    pub fn kind(&self) -> DexErrorKind
    {
        self.kind
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for DexError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}: {}", self.kind, self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}

impl From<io::Error> for DexError
{
    fn from(e: io::Error) -> Self
    {
        match e.kind()
        {
            io::ErrorKind::UnexpectedEof => DexError::new(DexErrorKind::TruncatedRead, &e.to_string()),
            _ => DexError::new(DexErrorKind::IoFailure, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_chains_contexts()
    {
        let e = err!(TruncatedRead, "expected {} bytes", 4);
        let e = DexError::with_context(e, "string #3".to_string());
        let e = DexError::with_context(e, "string table".to_string());
        assert_eq!(e.to_string(), "truncated read: expected 4 bytes for string #3 of string table");
        assert_eq!(e.kind(), DexErrorKind::TruncatedRead);
    }

    #[test]
    fn io_errors_are_classified()
    {
        let eof: DexError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(eof.kind(), DexErrorKind::TruncatedRead);

        let denied: DexError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(denied.kind(), DexErrorKind::IoFailure);
    }
}
