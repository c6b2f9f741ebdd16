use crate::error::{KariError, KariResult};
use std::fmt;

/// Immutable name and queue capacity of a topic endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicIdentity {
    name: String,
    capacity: usize,
}

impl TopicIdentity {
    /// Validate `name` and `capacity` and build the identity
    pub fn new(name: &str, capacity: usize) -> KariResult<Self> {
        validate_topic_name(name).map_err(|reason| KariError::registration(name, reason))?;
        if capacity == 0 {
            return Err(KariError::registration(
                name,
                "queue capacity must be at least 1",
            ));
        }

        Ok(Self {
            name: name.to_string(),
            capacity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Display for TopicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.capacity)
    }
}

/// Graph-name rules: a letter, `/` or `~` first, then letters, digits, `_`
/// and `/`, with no empty segments and no trailing slash.
pub fn validate_topic_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err("topic name is empty".to_string()),
    };

    if !(first.is_ascii_alphabetic() || first == '/' || first == '~') {
        return Err(format!("topic name cannot start with '{}'", first));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '/')) {
        return Err(format!("topic name contains invalid character '{}'", bad));
    }

    if name.contains("//") {
        return Err("topic name contains an empty segment".to_string());
    }

    if name.ends_with('/') {
        return Err("topic name cannot end with '/'".to_string());
    }

    Ok(())
}
