/// Opaque structure model carried in envelope bodies, lane state, and
/// credentials. Translating a `Value` to and from bytes is the codec
/// boundary's concern, never this crate's.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Present but empty. Used as the "removal" marker in slot records.
    Extant,
    Int(i64),
    Text(String),
    /// Ordered list of key/value items. A single-item record is a "slot",
    /// the conventional shape of one map-lane entry.
    Record(Vec<(Value, Value)>),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// A one-entry record keyed by `key`, the shape map lanes use for both
    /// entry events and entry commands.
    pub fn slot(key: impl Into<String>, value: Value) -> Self {
        Value::Record(vec![(Value::Text(key.into()), value)])
    }

    /// Views a one-entry record as its key/value pair.
    pub fn as_slot(&self) -> Option<(&Value, &Value)> {
        match self {
            Value::Record(items) if items.len() == 1 => {
                let (key, value) = &items[0];
                Some((key, value))
            }
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_extant(&self) -> bool {
        matches!(self, Value::Extant)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}
