//! Ordered name-value map stored as a shell array literal.
//!
//! The config file keeps per-stage lookups as `("development=x" "production=y")`.
//! Lookup is first-match by key; later entries with the same key are
//! shadowed and reported through [`NameValueMap::duplicates`].

use std::fmt;

/// Ordered `key=value` entries with first-wins lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameValueMap {
    entries: Vec<(String, String)>,
}

impl NameValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a shell array literal such as `("a=1" 'b=2' c=3)`.
    ///
    /// Returns the reason on malformed input: missing parentheses, an
    /// unterminated quote, or an element without `=`.
    pub fn parse(literal: &str) -> Result<Self, String> {
        let literal = literal.trim();
        let inner = literal
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| "expected a parenthesized list".to_string())?;

        let mut map = Self::new();
        for element in split_elements(inner)? {
            let (key, value) = element
                .split_once('=')
                .ok_or_else(|| format!("element '{}' has no '='", element))?;
            map.push(key.trim(), value);
        }
        Ok(map)
    }

    /// Append an entry. An existing key is not replaced.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value stored for `key`, or `""` when absent.
    pub fn value_of(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Keys that appear more than once, in first-seen order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut dupes: Vec<&str> = Vec::new();
        for (i, (key, _)) in self.entries.iter().enumerate() {
            let seen_before = self.entries[..i].iter().any(|(k, _)| k == key);
            if seen_before && !dupes.contains(&key.as_str()) {
                dupes.push(key);
            }
        }
        dupes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for NameValueMap {
    /// Render as a shell array literal with every element double-quoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "\"{}={}\"", key, value)?;
        }
        write!(f, ")")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.push(k, v);
        }
        map
    }
}

/// Split on unquoted whitespace. Quotes group but are not kept.
fn split_elements(input: &str) -> Result<Vec<String>, String> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_element = false;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_element = true;
            }
            None if ch.is_whitespace() => {
                if in_element {
                    elements.push(std::mem::take(&mut current));
                    in_element = false;
                }
            }
            None => {
                current.push(ch);
                in_element = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_element {
        elements.push(current);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_quoted_and_bare_elements() {
        let map =
            NameValueMap::parse(r#"("seed=https://a.example/x" 'development=b' production=c)"#)
                .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.value_of("seed"), "https://a.example/x");
        assert_eq!(map.value_of("development"), "b");
        assert_eq!(map.value_of("production"), "c");
    }

    #[test]
    fn test_first_match_wins_and_duplicates_reported() {
        let map = NameValueMap::parse(r#"("dev=first" "prod=p" "dev=second")"#).unwrap();
        assert_eq!(map.get("dev"), Some("first"));
        assert_eq!(map.duplicates(), vec!["dev"]);
    }

    #[test]
    fn test_missing_key_is_empty_string() {
        let map = NameValueMap::parse(r#"("dev=x")"#).unwrap();
        assert_eq!(map.value_of("production"), "");
        assert_eq!(map.get("production"), None);
    }

    #[test]
    fn test_lookup_is_exact_not_prefix() {
        let map = NameValueMap::parse(r#"("development=x")"#).unwrap();
        assert_eq!(map.get("dev"), None);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let map = NameValueMap::parse(r#"("seed=https://x/?a=b")"#).unwrap();
        assert_eq!(map.value_of("seed"), "https://x/?a=b");
    }

    #[test]
    fn test_empty_array() {
        let map = NameValueMap::parse("()").unwrap();
        assert!(map.is_empty());
        assert!(map.duplicates().is_empty());
    }

    #[test]
    fn test_empty_value_element() {
        let map = NameValueMap::parse(r#"("seed=" "development=")"#).unwrap();
        assert_eq!(map.get("seed"), Some(""));
    }

    #[test]
    fn test_rejects_malformed_literals() {
        assert!(NameValueMap::parse(r#""a=b""#).is_err());
        assert!(NameValueMap::parse(r#"("a=b)"#).is_err());
        assert!(NameValueMap::parse(r#"("novalue")"#).is_err());
    }

    #[test]
    fn test_display_renders_shell_array() {
        let map: NameValueMap = [("seed", "a"), ("development", "b")].into_iter().collect();
        assert_eq!(map.to_string(), r#"("seed=a" "development=b")"#);
    }

    proptest! {
        #[test]
        fn prop_display_then_parse_preserves_lookup(
            entries in proptest::collection::vec(("[a-z]{1,8}", "[A-Za-z0-9:/._-]{0,16}"), 0..8)
        ) {
            let map: NameValueMap = entries.iter().cloned().collect();
            let parsed = NameValueMap::parse(&map.to_string()).unwrap();
            for (key, _) in &entries {
                let expected = entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
                prop_assert_eq!(parsed.get(key), expected);
            }
        }
    }
}
