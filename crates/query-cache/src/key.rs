//! Query keys.

use std::collections::BTreeMap;
use std::fmt;

/// Identity of a cached query: a resource name plus its parameters.
///
/// Parameters are kept sorted so keys built in any order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    resource: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Whether `self` selects `other`: same resource, and every parameter of
    /// `self` is present with the same value in `other`.
    ///
    /// A key without parameters therefore selects every query of its resource.
    pub fn matches(&self, other: &QueryKey) -> bool {
        self.resource == other.resource
            && self
                .params
                .iter()
                .all(|(name, value)| other.params.get(name) == Some(value))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            write!(f, "?{}", params.join("&"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = QueryKey::new("instance").with("channel", "telegram").with("id", "1");
        let b = QueryKey::new("instance").with("id", "1").with("channel", "telegram");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "instance?channel=telegram&id=1");
    }

    #[test]
    fn test_prefix_matching() {
        let all = QueryKey::new("audit_logs");
        let page = QueryKey::new("audit_logs").with("offset", 20).with("limit", 20);
        let other = QueryKey::new("usage_logs").with("offset", 20);

        assert!(all.matches(&page));
        assert!(!page.matches(&all));
        assert!(!all.matches(&other));
        assert!(page.matches(&page));
    }
}
