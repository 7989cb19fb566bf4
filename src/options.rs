use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "params";

/// Conversion settings.
///
/// Deserializable so callers can keep it in whatever config file they
/// already load; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Fail on any unconvertible construct instead of reporting it.
    pub strict: bool,
    /// Prefix given to template parameters in Brevo output.
    pub namespace: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Options {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut chars = self.namespace.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidNamespace(self.namespace.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert!(!options.strict);
        assert_eq!(options.namespace, "params");
        assert!(Options::strict().strict);
    }

    #[test]
    fn deserializes_partial_config() {
        let options: Options = serde_json::from_str(r#"{ "strict": true }"#).unwrap();
        assert_eq!(options, Options::strict());

        let options: Options = serde_json::from_str(r#"{ "namespace": "contact" }"#).unwrap();
        assert_eq!(options.namespace, "contact");
        assert!(!options.strict);
    }

    #[test]
    fn namespace_must_be_an_identifier() {
        assert!(Options::default().validate().is_ok());
        assert!(Options::default().with_namespace("_ctx2").validate().is_ok());
        for bad in ["", "params.x", "1abc", "a b"] {
            let err = Options::default().with_namespace(bad).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidNamespace(ref ns) if ns == bad));
        }
    }
}
