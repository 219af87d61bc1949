//! Records extracted from structured (JSON/JSONL) inputs.

use serde_json::Value;

/// A recognized record field.
///
/// Declaration order is the rendering order of a formatted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Content,
    Category,
    Instruction,
    Input,
    Output,
    /// The `问` (question) field.
    Question,
    /// The `答` (answer) field.
    Answer,
}

impl Field {
    /// Every field, in rendering order.
    pub const ALL: [Field; 9] = [
        Field::Title,
        Field::Description,
        Field::Content,
        Field::Category,
        Field::Instruction,
        Field::Input,
        Field::Output,
        Field::Question,
        Field::Answer,
    ];

    /// JSON keys the field is read from; the first present key wins.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Field::Title => &["title"],
            Field::Description => &["desc", "description"],
            Field::Content => &["answer", "content"],
            Field::Category => &["category"],
            Field::Instruction => &["instruction"],
            Field::Input => &["input"],
            Field::Output => &["output"],
            Field::Question => &["问"],
            Field::Answer => &["答"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Recognized fields of one structured input item.
///
/// Values keep their JSON type; absent fields hold `Value::Null`. A record is
/// built once per item and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: [Value; 9],
}

impl Record {
    /// Creates a record with every field empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the recognized fields from a parsed JSON value.
    ///
    /// Never fails: missing keys stay empty and a non-object value yields an
    /// empty record. Other keys are ignored.
    pub fn from_json(value: &Value) -> Self {
        let mut record = Self::new();
        let Some(map) = value.as_object() else {
            return record;
        };

        for field in Field::ALL {
            if let Some(found) = field.keys().iter().find_map(|key| map.get(*key)) {
                record.values[field.index()] = found.clone();
            }
        }

        record
    }

    /// Returns the value of a field (`Value::Null` when absent).
    pub fn get(&self, field: Field) -> &Value {
        &self.values[field.index()]
    }

    /// Sets a field, consuming and returning the record.
    pub fn with(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.values[field.index()] = value.into();
        self
    }

    /// Returns true if no field carries a truthy value.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| !is_truthy(v))
    }
}

/// Extracts records from a whole `.json` document.
///
/// A top-level array is treated as a list of items; anything else is a single
/// item.
pub fn records_from_document(document: &Value) -> Vec<Record> {
    match document {
        Value::Array(items) => items.iter().map(Record::from_json).collect(),
        other => vec![Record::from_json(other)],
    }
}

/// JSON truthiness: empty strings, `null`, `false`, zero and empty containers
/// are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
