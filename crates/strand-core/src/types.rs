//! Event type lists.

use std::fmt;

/// An ordered list of distinct event type names.
///
/// Parsed from a whitespace-separated string such as `"keydown keyup"`.
/// Empty entries are discarded and repeated names keep their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventTypes(Vec<String>);

impl EventTypes {
    pub fn parse(types: &str) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in types.split_whitespace() {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        Self(names)
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}
