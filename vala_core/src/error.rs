use crate::session::FileID;
use crate::text::TextRange;

/// Infrastructure failure carrying a plain message, built by the
/// constructor functions in `errors`.
#[derive(Debug)]
pub struct Error {
    msg: String,
}

#[derive(Copy, Clone)]
pub struct SourceRange {
    range: TextRange,
    file_id: FileID,
}

/// A single analysis diagnostic.
pub struct Diag {
    msg: String,
    src: SourceRange,
}

/// Accumulates the errors and warnings of one analysis cycle, in the
/// order they were reported. `reset` is called at the start of every
/// `check()` so stale entries never leak across cycles.
pub struct Reporter {
    errors: Vec<Diag>,
    warnings: Vec<Diag>,
}

impl Error {
    pub fn message(msg: impl Into<String>) -> Error {
        Error { msg: msg.into() }
    }
    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl SourceRange {
    pub fn new(range: TextRange, file_id: FileID) -> SourceRange {
        SourceRange { range, file_id }
    }
    #[inline]
    pub fn range(&self) -> TextRange {
        self.range
    }
    #[inline]
    pub fn file_id(&self) -> FileID {
        self.file_id
    }
}

impl Diag {
    #[inline]
    pub fn msg(&self) -> &str {
        &self.msg
    }
    #[inline]
    pub fn src(&self) -> SourceRange {
        self.src
    }
}

impl Reporter {
    pub fn new() -> Reporter {
        Reporter { errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    pub fn error(&mut self, msg: impl Into<String>, src: SourceRange) {
        self.errors.push(Diag { msg: msg.into(), src });
    }
    pub fn warning(&mut self, msg: impl Into<String>, src: SourceRange) {
        self.warnings.push(Diag { msg: msg.into(), src });
    }

    #[inline]
    pub fn errors(&self) -> &[Diag] {
        &self.errors
    }
    #[inline]
    pub fn warnings(&self) -> &[Diag] {
        &self.warnings
    }
    #[inline]
    pub fn did_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for Reporter {
    fn default() -> Reporter {
        Reporter::new()
    }
}
