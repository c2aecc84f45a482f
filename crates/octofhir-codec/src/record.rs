//! Generic binary record tree.

use indexmap::IndexMap;

/// A field value inside a [`BinaryRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Null,
    String(String),
    Long(i64),
    Double(f64),
    Bool(bool),
    Record(BinaryRecord),
    List(Vec<RecordValue>),
}

impl RecordValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }

    /// String form of a scalar. `None` for null, records and lists.
    pub fn scalar_as_string(&self) -> Option<String> {
        match self {
            RecordValue::String(s) => Some(s.clone()),
            RecordValue::Long(n) => Some(n.to_string()),
            RecordValue::Double(d) => Some(d.to_string()),
            RecordValue::Bool(b) => Some(b.to_string()),
            RecordValue::Null | RecordValue::Record(_) | RecordValue::List(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&BinaryRecord> {
        match self {
            RecordValue::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Option<&str>> for RecordValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(RecordValue::Null, |s| RecordValue::String(s.to_string()))
    }
}

/// Body of a record: a raw primitive payload or named fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Raw(Option<String>),
    Fields(IndexMap<String, RecordValue>),
}

/// A typed record: the type name of the value plus its body.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRecord {
    pub type_name: String,
    pub body: RecordBody,
}

impl BinaryRecord {
    pub fn raw(type_name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            body: RecordBody::Raw(value),
        }
    }

    pub fn fields(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            body: RecordBody::Fields(IndexMap::new()),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: RecordValue) -> Self {
        self.set_field(name, value);
        self
    }

    /// Sets a field. A raw record is turned into a field record first.
    pub fn set_field(&mut self, name: impl Into<String>, value: RecordValue) {
        if let RecordBody::Raw(_) = self.body {
            self.body = RecordBody::Fields(IndexMap::new());
        }
        if let RecordBody::Fields(fields) = &mut self.body {
            fields.insert(name.into(), value);
        }
    }

    pub fn field(&self, name: &str) -> Option<&RecordValue> {
        match &self.body {
            RecordBody::Fields(fields) => fields.get(name),
            RecordBody::Raw(_) => None,
        }
    }

    pub fn raw_value(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Raw(value) => value.as_deref(),
            RecordBody::Fields(_) => None,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match &self.body {
            RecordBody::Fields(fields) => fields.keys().map(String::as_str).collect(),
            RecordBody::Raw(_) => Vec::new(),
        }
    }
}
