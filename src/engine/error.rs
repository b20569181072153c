use crate::model::Span;

#[derive(Debug)]
pub enum EngineError {
    MalformedInput(String),
    UnknownResource(String),
    DuplicateResource(String),
    Conflict { resource: String, span: Span },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
            EngineError::UnknownResource(name) => write!(f, "unknown resource: {name}"),
            EngineError::DuplicateResource(name) => {
                write!(f, "resource listed twice in catalog: {name}")
            }
            EngineError::Conflict { resource, span } => write!(
                f,
                "[{}, {}) overlaps an existing reservation on {resource}",
                span.start, span.end
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
