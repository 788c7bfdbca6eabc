use thiserror::Error;

/// A diagnostic raised while tokenising or parsing a technique file.
///
/// Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line} Col {column}. {message}")]
pub struct LexerError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("pass '{0}' mixes a compute shader with vertex or fragment shaders")]
    AmbiguousKind(String),
    #[error("pass '{0}' has no fragment shader")]
    MissingFragment(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TechniqueError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Std140Error {
    #[error("uniform block expects {expected} values but {actual} were supplied")]
    ValueCount { expected: usize, actual: usize },
    #[error("field '{field}' expects a {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UniformError {
    #[error("uniform '{0}' is a sampler and has no value")]
    Sampler(String),
    #[error("uniform '{name}' is a {expected}, not a {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}
