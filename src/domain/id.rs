//! Task ID generation
//!
//! Task IDs use the format: `{6-char-hex}-item-{slug}`
//! Example: `019430-item-red-dress-jpg`

/// Generate a task ID from the source file name
pub fn generate_id(file_name: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    format!("{}-item-{}", hex_prefix, slugify(file_name))
}

/// Slugify a file name for use in IDs
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Opaque identifier for one intake task, stable for the task's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Allocate a fresh ID for a task over the given file
    pub fn generate(file_name: &str) -> Self {
        Self(generate_id(file_name))
    }

    /// Wrap an existing ID string (for testing)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("Red Dress.jpg");
        assert!(id.len() > 10);
        assert!(id.contains("-item-"));
        assert!(id.ends_with("red-dress-jpg"));
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id("a.jpg");
        let b = generate_id("a.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("photo 01.JPG"), "photo-01-jpg");
        assert_eq!(slugify("IMG_2024-05-01.png"), "img-2024-05-01-png");
        assert_eq!(slugify("  spaced  "), "spaced");
    }

    #[test]
    fn test_task_id_display() {
        let id = TaskId::from_string("019430-item-red-dress-jpg");
        assert_eq!(id.to_string(), "019430-item-red-dress-jpg");
        assert_eq!(id.as_str(), "019430-item-red-dress-jpg");
    }
}
