//! Ordered key-value pairs attached to a single log record.

use serde_json::Value;

/// Ordered key-value pairs attached to a single log record.
///
/// Keys are emitted in insertion order. Values are arbitrary JSON values, so anything that
/// converts into a [`serde_json::Value`] can be logged directly:
///
/// ```
/// use serde_json::json;
/// use service_logger::Fields;
///
/// let fields = Fields::new()
///     .with("order_id", "ord_123")
///     .with("attempt", 2)
///     .with("items", json!(["sku_1", "sku_2"]));
/// assert_eq!(fields.len(), 3);
///
/// let from_array = Fields::from([("order_id", "ord_123"), ("status", "paid")]);
/// assert_eq!(from_array.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    /// Creates an empty set of fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field and returns `self`, for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    /// Appends a field.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builds fields from a flat `key, value, key, value, ...` sequence.
    ///
    /// String keys are used verbatim, any other key is rendered as its JSON text. A trailing key
    /// without a value is kept with a `null` value rather than dropped.
    ///
    /// ```
    /// use serde_json::{Value, json};
    /// use service_logger::Fields;
    ///
    /// let fields = Fields::from_alternating([json!("user"), json!("ada"), json!("dangling")]);
    /// let pairs: Vec<_> = fields.iter().collect();
    /// assert_eq!(pairs, [("user", &json!("ada")), ("dangling", &Value::Null)]);
    /// ```
    pub fn from_alternating(values: impl IntoIterator<Item = Value>) -> Self {
        let mut fields = Self::new();
        let mut values = values.into_iter();
        while let Some(key) = values.next() {
            let key = match key {
                Value::String(key) => key,
                other => other.to_string(),
            };
            fields.push(key, values.next().unwrap_or(Value::Null));
        }
        fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl From<()> for Fields {
    fn from((): ()) -> Self {
        Self::new()
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> From<Vec<(K, V)>> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
