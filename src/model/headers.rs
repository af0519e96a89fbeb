//! Ordered header map with duplicate collection.

/// Value stored for one header name.
///
/// A name seen once keeps a scalar; the second occurrence turns it into a
/// list, and later occurrences append.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// First value in order of appearance.
    pub fn first(&self) -> &str {
        match self {
            Self::Single(v) => v,
            // Never empty: a list is only built from an existing scalar.
            Self::Multiple(vs) => vs.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// All values in order of appearance.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(vs) => vs.push(value),
        }
    }
}

/// Header mapping for one message.
///
/// Names are case-sensitive exactly as written and keep first-seen order.
/// Values are raw: the text after the first colon, leading whitespace and
/// folded continuation lines included.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, collecting repeats of the same name into a list.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((name, HeaderValue::Single(value))),
        }
    }

    /// Value stored under `name` (exact, case-sensitive match).
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// First value stored under `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).map(HeaderValue::first)
    }

    /// Every value stored under `name`, empty if absent.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.get(name).map(HeaderValue::values).unwrap_or_default()
    }

    /// The `Content-Length` header as a non-negative integer.
    ///
    /// Returns `None` when the header is missing or its first value is not a
    /// plain decimal number (surrounding whitespace is ignored).
    pub fn content_length(&self) -> Option<u64> {
        self.first("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Iterate `(name, value)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a JSON object: scalars become strings, repeats become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, value)| {
                let json = match value {
                    HeaderValue::Single(v) => serde_json::Value::from(v.as_str()),
                    HeaderValue::Multiple(vs) => serde_json::Value::from(vs.clone()),
                };
                (name.clone(), json)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
