// error.rs — Error taxonomy shared by IR construction and code generation
//
// Every failure names the offending node or symbol. All variants are fatal to
// the operation that raised them: a node that fails validation is never built,
// and a generation error discards the whole translation unit.

use thiserror::Error;

use crate::diag::{codes, DiagCode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node-model invariant was violated while building a node.
    #[error("structural validation failed for {node}: {message}")]
    StructuralValidation { node: String, message: String },

    /// A symbol reference did not resolve in the visible scopes, or resolved
    /// to a declaration of the wrong kind.
    #[error("unresolved symbol `{name}` in {context}")]
    UnresolvedSymbol { name: String, context: String },

    /// A temporary's dimensions did not carry exactly one location dimension.
    #[error("{node} needs exactly one location dimension, found {found}")]
    MissingLocationDimension { node: String, found: usize },

    /// A data type or built-in literal has no spelling in the target language.
    #[error("unsupported {what} `{value}` in {context}")]
    UnsupportedConstant {
        what: &'static str,
        value: String,
        context: String,
    },

    /// The source formatter rejected the generated text or could not run.
    #[error("formatting failed: {message}")]
    Formatting { message: String },

    /// An IR document could not be read or decoded.
    #[error("cannot load {what}: {message}")]
    Load { what: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn structural(node: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StructuralValidation {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn unresolved(name: impl Into<String>, context: impl Into<String>) -> Self {
        Error::UnresolvedSymbol {
            name: name.into(),
            context: context.into(),
        }
    }

    pub fn formatting(message: impl Into<String>) -> Self {
        Error::Formatting {
            message: message.into(),
        }
    }

    /// Stable diagnostic code for this error kind.
    pub fn code(&self) -> DiagCode {
        match self {
            Error::StructuralValidation { .. } => codes::E0100,
            Error::UnresolvedSymbol { .. } => codes::E0200,
            Error::MissingLocationDimension { .. } => codes::E0201,
            Error::UnsupportedConstant { .. } => codes::E0202,
            Error::Formatting { .. } => codes::E0300,
            Error::Load { .. } => codes::E0400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let e = Error::unresolved("e2v", "kernel 'sum' > neighbor loop");
        assert_eq!(
            e.to_string(),
            "unresolved symbol `e2v` in kernel 'sum' > neighbor loop"
        );

        let e = Error::MissingLocationDimension {
            node: "temporary 'tmp'".into(),
            found: 0,
        };
        assert_eq!(
            e.to_string(),
            "temporary 'tmp' needs exactly one location dimension, found 0"
        );
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            Error::structural("n", "m"),
            Error::unresolved("n", "c"),
            Error::MissingLocationDimension {
                node: "n".into(),
                found: 2,
            },
            Error::UnsupportedConstant {
                what: "data type",
                value: "AUTO".into(),
                context: "c".into(),
            },
            Error::formatting("m"),
            Error::Load {
                what: "w".into(),
                message: "m".into(),
            },
        ];
        let mut codes: Vec<_> = all.iter().map(|e| e.code().0).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
