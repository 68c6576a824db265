use std::{error::Error as StdError, fmt};

pub(crate) type Result<T, E = BlogError> = std::result::Result<T, E>;

type Source = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// A single post could not be processed; the post is skipped.
    Content,
    /// Markdown could not be converted; the post is skipped.
    Render,
    /// Templates or source directory unusable; the run aborts.
    Setup,
    /// Generated data could not be written; the run aborts.
    Output,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Setup | ErrorKind::Output)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Content => "content",
            ErrorKind::Render => "render",
            ErrorKind::Setup => "setup",
            ErrorKind::Output => "output",
        })
    }
}

/// The one error type of the generator. `source` carries the underlying
/// cause so `{:#}` (via anyhow) prints the whole chain.
#[derive(thiserror::Error, Debug)]
#[error("{kind} error: {context}")]
pub(crate) struct BlogError {
    pub kind: ErrorKind,
    pub context: String,
    #[source]
    source: Option<Source>,
}

impl BlogError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        context: impl Into<String>,
        source: impl Into<Source>,
    ) -> Self {
        Self {
            kind,
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn content(context: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::with_source(ErrorKind::Content, context, source)
    }

    pub fn setup(context: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::with_source(ErrorKind::Setup, context, source)
    }

    pub fn output(context: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::with_source(ErrorKind::Output, context, source)
    }

    /// Re-wrap with an outer context, keeping the kind.
    pub fn context(self, context: impl Into<String>) -> Self {
        let kind = self.kind;
        Self::with_source(kind, context, self)
    }

    /// The message and every cause, outermost first, joined by `: `.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut cause = StdError::source(self);
        while let Some(e) = cause {
            out.push_str(": ");
            out.push_str(&e.to_string());
            cause = e.source();
        }
        out
    }
}

/// Attaches a [`BlogError`] of a given kind to any fallible result.
pub(crate) trait ResultExt<T> {
    fn or_blog<C, F>(self, kind: ErrorKind, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Source>,
{
    fn or_blog<C, F>(self, kind: ErrorKind, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| BlogError::with_source(kind, f(), e))
    }
}
