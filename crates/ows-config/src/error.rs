//! Error types for ows-config

use std::collections::BTreeSet;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while resolving configuration.
///
/// Every variant is a configuration error; callers that only care about
/// "the load failed" can treat the enum as a whole, while
/// [`ConfigError::is_not_ready`] and [`ConfigError::is_not_found`] allow
/// matching the two distinguished kinds.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Fs(#[from] ows_fs::Error),

    #[error("{message}")]
    MalformedReference { message: String },

    #[error("Cyclic inclusion: {include}")]
    CyclicInclusion { include: String },

    #[error("Could not import python object: {name}")]
    UnresolvableCapability { name: String },

    #[error("{entity} has no {field}")]
    MissingField { entity: String, field: String },

    #[error("{message}")]
    ConflictingFields { message: String },

    #[error("The following parameters have not been initialised: {}", join_fields(.fields))]
    NotReady { fields: BTreeSet<String> },

    #[error("{message}")]
    EntryNotFound { message: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReference {
            message: message.into(),
        }
    }

    pub fn missing(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn conflicting(message: impl Into<String>) -> Self {
        Self::ConflictingFields {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::EntryNotFound {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_ready<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NotReady {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// True for reads of a field before two-phase initialisation finished.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// True for indexed lookups that matched no registered entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }
}

fn join_fields(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_lists_fields_in_order() {
        let err = ConfigError::not_ready(["score", "products"]);
        assert!(err.is_not_ready());
        assert_eq!(
            err.to_string(),
            "The following parameters have not been initialised: products, score"
        );
    }

    #[test]
    fn cyclic_message_prefix() {
        let err = ConfigError::CyclicInclusion {
            include: "a.json".into(),
        };
        assert!(err.to_string().starts_with("Cyclic inclusion"));
        assert!(!err.is_not_found());
    }
}
