//! Error taxonomy for a single module's compilation.
//!
//! Every variant names the module it came from and, where one exists, the
//! owning symbol and field. Errors are local to one module: the batch driver
//! collects them per module and keeps going.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{module}:{line}: syntax error: {message}")]
    Syntax {
        module: String,
        line: usize,
        message: String,
    },

    #[error("{module}: cannot resolve import `{name}` from `{from}`")]
    UnresolvedImport {
        module: String,
        name: String,
        from: String,
    },

    #[error("{module}: duplicate declaration of `{name}`")]
    DuplicateSymbol { module: String, name: String },

    #[error("malformed annotation `@{tag}` on {}: {message}", owner_path(owner, field.as_deref()))]
    MalformedAnnotation {
        owner: String,
        field: Option<String>,
        tag: String,
        message: String,
    },

    #[error("unsupported construct in {}: {message}", owner_path(owner, field.as_deref()))]
    UnsupportedConstruct {
        owner: String,
        field: Option<String>,
        message: String,
    },

    #[error("conflicting constraints on {}: {message}", owner_path(owner, field.as_deref()))]
    ConflictingConstraint {
        owner: String,
        field: Option<String>,
        message: String,
    },

    #[error("cannot synthesize an example for `{owner}`: {message}")]
    UnsatisfiableConstraint { owner: String, message: String },

    #[error("reference to `{target}` in `{owner}` has no definition")]
    DanglingReference { owner: String, target: String },

    #[error("module `{0}` is not part of the source set")]
    UnknownModule(String),

    #[error("no exported type named `{name}` in `{module}`")]
    UnknownExport { module: String, name: String },

    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CompileError {
    pub(crate) fn unsupported(owner: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        CompileError::UnsupportedConstruct {
            owner: owner.to_string(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub(crate) fn conflict(owner: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        CompileError::ConflictingConstraint {
            owner: owner.to_string(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        CompileError::Io { path: path.into(), message: error.to_string() }
    }

    /// Attach a field name to an owner-scoped error raised inside a member's type.
    pub(crate) fn in_field(mut self, name: &str) -> Self {
        match &mut self {
            CompileError::MalformedAnnotation { field, .. }
            | CompileError::UnsupportedConstruct { field, .. }
            | CompileError::ConflictingConstraint { field, .. }
                if field.is_none() =>
            {
                *field = Some(name.to_string());
            }
            _ => {}
        }
        self
    }

    /// Short stable name of the variant, used in summaries and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Syntax { .. } => "SyntaxError",
            CompileError::UnresolvedImport { .. } => "UnresolvedImportError",
            CompileError::DuplicateSymbol { .. } => "DuplicateSymbolError",
            CompileError::MalformedAnnotation { .. } => "MalformedAnnotationError",
            CompileError::UnsupportedConstruct { .. } => "UnsupportedConstructError",
            CompileError::ConflictingConstraint { .. } => "ConflictingConstraintError",
            CompileError::UnsatisfiableConstraint { .. } => "UnsatisfiableConstraintError",
            CompileError::DanglingReference { .. } => "DanglingReferenceError",
            CompileError::UnknownModule(_) => "UnknownModuleError",
            CompileError::UnknownExport { .. } => "UnknownExportError",
            CompileError::Io { .. } => "IoError",
            CompileError::Config(_) => "ConfigError",
        }
    }
}

fn owner_path(owner: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("`{owner}.{field}`"),
        None => format!("`{owner}`"),
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
