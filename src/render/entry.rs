//! Labeled plain-text rendering of records.

use crate::model::{is_truthy, Field, Record};
use serde_json::Value;

/// Field labels in rendering order.
///
/// English labels for the generic fields, the JSON key itself for the CJK
/// question/answer fields. Output compatibility depends on this table.
pub const FIELD_LABELS: &[(Field, &str)] = &[
    (Field::Title, "Title"),
    (Field::Description, "Description"),
    (Field::Content, "Content"),
    (Field::Category, "Category"),
    (Field::Instruction, "instruction"),
    (Field::Input, "input"),
    (Field::Output, "output"),
    (Field::Question, "问"),
    (Field::Answer, "答"),
];

/// Width of the record separator line.
pub const SEPARATOR_WIDTH: usize = 40;

/// Renders a record as `Label: value` lines followed by a separator.
///
/// Returns the empty string when no field is populated; the separator is only
/// emitted for non-empty entries.
pub fn format_entry(record: &Record) -> String {
    let mut entry = String::new();

    for (field, label) in FIELD_LABELS {
        let value = record.get(*field);
        if !is_truthy(value) {
            continue;
        }
        entry.push_str(label);
        entry.push_str(": ");
        push_value(&mut entry, value);
        entry.push('\n');
    }

    if !entry.is_empty() {
        entry.push_str(&"=".repeat(SEPARATOR_WIDTH));
        entry.push('\n');
    }

    entry
}

/// Strings render raw, anything else as compact JSON.
fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_title_and_output() {
        let record = Record::from_json(&json!({"title": "X", "output": "Y。Z"}));
        let expected = format!("Title: X\noutput: Y。Z\n{}\n", "=".repeat(40));
        assert_eq!(format_entry(&record), expected);
    }

    #[test]
    fn test_empty_record_renders_nothing() {
        assert_eq!(format_entry(&Record::new()), "");
        let record = Record::from_json(&json!({"title": "", "desc": null, "other": "x"}));
        assert_eq!(format_entry(&record), "");
    }

    #[test]
    fn test_fixed_order_regardless_of_input_order() {
        let record = Record::from_json(&json!({
            "答": "d",
            "问": "q",
            "output": "o",
            "input": "i",
            "instruction": "n",
            "category": "c",
            "answer": "a",
            "desc": "s",
            "title": "t"
        }));
        let rendered = format_entry(&record);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Title: t",
                "Description: s",
                "Content: a",
                "Category: c",
                "instruction: n",
                "input: i",
                "output: o",
                "问: q",
                "答: d",
                "========================================",
            ]
        );
    }

    #[test]
    fn test_single_separator() {
        let record = Record::new().with(Field::Answer, "only");
        let rendered = format_entry(&record);
        assert_eq!(rendered.matches(&"=".repeat(SEPARATOR_WIDTH)).count(), 1);
        assert!(rendered.ends_with(&format!("{}\n", "=".repeat(SEPARATOR_WIDTH))));
    }

    #[test]
    fn test_non_string_values_stringified() {
        let record = Record::new()
            .with(Field::Category, 12)
            .with(Field::Input, json!(["a", 1]))
            .with(Field::Output, false);
        assert_eq!(
            format_entry(&record),
            format!("Category: 12\ninput: [\"a\",1]\n{}\n", "=".repeat(40))
        );
    }
}
