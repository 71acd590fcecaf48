// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

/// Error types for query translation
///
/// Translators raise these through `anyhow`; callers recover the variant with
/// `err.downcast_ref::<TranslationError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// No translator exists for this node or method.
    Unsupported(String),
    /// Wrong lambda parameter count, missing argument or non-lambda argument.
    Arity(String),
    /// A parameter with no source in the active context chain.
    UnresolvedParameter(String),
    /// A member that no source, projection or group key provides.
    UnresolvedMember(String),
    /// A literal argument outside its allowed domain.
    InvalidLiteral(String),
    /// An operator applied to a shape it cannot extend.
    StructuralPrecondition(String),
    /// The translator reached a state it should never build.
    Internal(String),
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::Unsupported(what) => write!(f, "Unsupported construct: {}", what),
            TranslationError::Arity(what) => write!(f, "Invalid arguments: {}", what),
            TranslationError::UnresolvedParameter(name) => {
                write!(f, "Unresolved parameter `{}`", name)
            }
            TranslationError::UnresolvedMember(what) => write!(f, "Unresolved member: {}", what),
            TranslationError::InvalidLiteral(what) => write!(f, "Invalid literal: {}", what),
            TranslationError::StructuralPrecondition(what) => {
                write!(f, "Invalid query structure: {}", what)
            }
            TranslationError::Internal(what) => write!(f, "Internal translator error: {}", what),
        }
    }
}

impl std::error::Error for TranslationError {}
