//! Credential redaction for user-visible failure text.

use serde_json::Value;

const MASK: &str = "[REDACTED]";

/// Replaces known secret values wherever they appear.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl Redactor {
    /// Empty secrets are ignored; they would match everywhere.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so a secret containing another is masked whole.
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { secrets }
    }

    pub fn redact_str(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }

    /// Redact every string leaf (and object key) of a JSON value in place.
    pub fn redact_value(&self, value: &mut Value) {
        if self.secrets.is_empty() {
            return;
        }
        match value {
            Value::String(s) => *s = self.redact_str(s),
            Value::Array(items) => items.iter_mut().for_each(|v| self.redact_value(v)),
            Value::Object(map) => {
                let entries = std::mem::take(map);
                for (key, mut v) in entries {
                    self.redact_value(&mut v);
                    map.insert(self.redact_str(&key), v);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_token_in_text() {
        let r = Redactor::new(["glpat-abc123"]);
        assert_eq!(
            r.redact_str("401 Unauthorized for token glpat-abc123"),
            "401 Unauthorized for token [REDACTED]"
        );
    }

    #[test]
    fn test_redacts_nested_details() {
        let r = Redactor::new(["s3cret"]);
        let mut details = json!({
            "header": "PRIVATE-TOKEN: s3cret",
            "nested": [{"s3cret": "again s3cret"}],
            "status": 401,
        });
        r.redact_value(&mut details);
        assert_eq!(
            details,
            json!({
                "header": "PRIVATE-TOKEN: [REDACTED]",
                "nested": [{"[REDACTED]": "again [REDACTED]"}],
                "status": 401,
            })
        );
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let r = Redactor::new([""]);
        assert_eq!(r.redact_str("nothing to hide"), "nothing to hide");
    }

    #[test]
    fn test_debug_does_not_leak() {
        let r = Redactor::new(["glpat-abc123"]);
        assert!(!format!("{:?}", r).contains("glpat"));
    }
}
