//! Read-only snapshot of environment variables.
//!
//! Modifiers never read the process environment directly. The transform captures a snapshot once
//! and hands it to the modifiers that interpolate variables or expose them to expressions.

use std::collections::BTreeMap;

/// An immutable set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    variables: BTreeMap<String, String>,
}

impl Environment {
    /// Captures the current process environment. Variables that are not valid unicode are skipped.
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Expands `${env.NAME}` (or `${NAME}`, `$NAME`) references against the snapshot.
    ///
    /// Unknown variables are left as written.
    pub fn expand(&self, input: &str) -> String {
        shellexpand::env_with_context_no_errors(input, |key: &str| {
            let name = key.strip_prefix("env.").unwrap_or(key);
            self.get(name)
        })
        .into_owned()
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Environment {
            variables: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
