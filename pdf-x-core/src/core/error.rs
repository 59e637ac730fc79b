//! Hand-rolled error and warning types shared across the engine.
//!
//! The engine distinguishes two severities (see the orchestrator in
//! `parser.rs`): a `PDFError` aborts the current operation outright, while a
//! `Warning` is recorded and parsing continues. Warning codes are stable,
//! colon-separated tags with the `pdf:` family prefix stripped (callers that
//! need the full wire form should prepend it themselves).

use std::fmt;

#[derive(Debug, Clone)]
pub enum PDFError {
    NotAPdf { reason: String },
    UnexpectedEndOfStream,
    InvalidByteRange { begin: usize, end: usize },
    InvalidPosition { pos: usize, length: usize },
    Codec { filter: String, message: String },
    Io(String),
    Generic(String),
}

impl fmt::Display for PDFError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PDFError::NotAPdf { reason } => write!(f, "not a PDF: {}", reason),
            PDFError::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
            PDFError::InvalidByteRange { begin, end } => {
                write!(f, "invalid byte range {}..{}", begin, end)
            }
            PDFError::InvalidPosition { pos, length } => {
                write!(f, "invalid position {} (length {})", pos, length)
            }
            PDFError::Codec { filter, message } => write!(f, "filter {}: {}", filter, message),
            PDFError::Io(message) => write!(f, "io error: {}", message),
            PDFError::Generic(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for PDFError {}

impl From<std::io::Error> for PDFError {
    fn from(err: std::io::Error) -> Self {
        PDFError::Io(err.to_string())
    }
}

pub type PDFResult<T> = Result<T, PDFError>;

/// A recoverable malformation recorded during tokenizing, lexing, or
/// orchestration. Carries the stable `code` tag from spec §6 (minus the
/// `pdf:` prefix, which belongs to the wire/display layer).
#[derive(Debug, Clone)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub offset: Option<usize>,
    pub context: Option<String>,
    pub cause: Option<String>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            offset: None,
            context: None,
            cause: None,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Full wire form, e.g. `pdf:tokenizer:unexpected_eof:string`.
    pub fn wire_code(&self) -> String {
        format!("pdf:{}", self.code)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.wire_code(), self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (at byte {})", offset)?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " - {}", ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_code_prefixes_pdf() {
        let w = Warning::new("tokenizer:unexpected_eof:string", "unterminated string");
        assert_eq!(w.wire_code(), "pdf:tokenizer:unexpected_eof:string");
    }

    #[test]
    fn builder_chain_sets_fields() {
        let w = Warning::new("lexer:invalid_token:integer:invalid_key", "bad key")
            .at(42)
            .with_context("dictionary")
            .with_cause(PDFError::UnexpectedEndOfStream);
        assert_eq!(w.offset, Some(42));
        assert_eq!(w.context.as_deref(), Some("dictionary"));
        assert!(w.cause.is_some());
    }
}
