//! Payload validation for the books resource.
//!
//! A declarative field table drives a single validation pass that collects
//! every violation in the payload, not just the first one found.

use serde_json::{json, Map, Value};

use super::models::{Book, BookChanges};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Integer,
}

struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    /// Whether the update operation may carry this field; the key cannot
    /// be altered in place.
    mutable: bool,
    must_be_positive: bool,
}

const BOOK_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "isbn",
        kind: FieldKind::Text,
        mutable: false,
        must_be_positive: false,
    },
    FieldSpec {
        name: "amazon_url",
        kind: FieldKind::Text,
        mutable: true,
        must_be_positive: false,
    },
    FieldSpec {
        name: "author",
        kind: FieldKind::Text,
        mutable: true,
        must_be_positive: false,
    },
    FieldSpec {
        name: "language",
        kind: FieldKind::Text,
        mutable: true,
        must_be_positive: false,
    },
    FieldSpec {
        name: "pages",
        kind: FieldKind::Integer,
        mutable: true,
        must_be_positive: true,
    },
    FieldSpec {
        name: "publisher",
        kind: FieldKind::Text,
        mutable: true,
        must_be_positive: false,
    },
    FieldSpec {
        name: "title",
        kind: FieldKind::Text,
        mutable: true,
        must_be_positive: false,
    },
    FieldSpec {
        name: "year",
        kind: FieldKind::Integer,
        mutable: true,
        must_be_positive: false,
    },
];

/// A single schema violation, reported alongside every other one found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub error: String,
}

impl Violation {
    fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }

    /// Render into the error-body detail shape.
    pub fn to_detail(&self) -> Value {
        json!({"field": self.field, "error": self.error})
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

/// Validate a create payload: all eight fields required, nothing else.
pub fn validate_create(payload: &Value) -> Result<Book, Vec<Violation>> {
    let object = check(payload, Mode::Create)?;
    deserialize(object)
}

/// Validate an update payload: the seven mutable fields required, the key
/// and unrecognized fields rejected.
pub fn validate_update(payload: &Value) -> Result<BookChanges, Vec<Violation>> {
    let object = check(payload, Mode::Update)?;
    deserialize(object)
}

fn check(payload: &Value, mode: Mode) -> Result<Map<String, Value>, Vec<Violation>> {
    let Some(object) = payload.as_object() else {
        return Err(vec![Violation::new("payload", "must be a JSON object")]);
    };

    let mut violations = Vec::new();

    for key in object.keys() {
        match BOOK_FIELDS.iter().find(|field| field.name == key) {
            None => violations.push(Violation::new(key, "is not a recognized field")),
            Some(field) if mode == Mode::Update && !field.mutable => {
                violations.push(Violation::new(key, "cannot be changed"));
            }
            Some(_) => {}
        }
    }

    for field in BOOK_FIELDS {
        if mode == Mode::Update && !field.mutable {
            continue;
        }

        match object.get(field.name) {
            None => violations.push(Violation::new(field.name, "is required")),
            Some(value) => {
                if let Some(violation) = type_violation(field, value) {
                    violations.push(violation);
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(object.clone())
    } else {
        Err(violations)
    }
}

fn type_violation(field: &FieldSpec, value: &Value) -> Option<Violation> {
    match field.kind {
        FieldKind::Text => {
            if !value.is_string() {
                return Some(Violation::new(field.name, "must be a string"));
            }
        }
        FieldKind::Integer => {
            let Some(number) = value.as_i64() else {
                return Some(Violation::new(field.name, "must be an integer"));
            };
            if i32::try_from(number).is_err() {
                return Some(Violation::new(field.name, "is out of range"));
            }
            if field.must_be_positive && number <= 0 {
                return Some(Violation::new(field.name, "must be positive"));
            }
        }
    }
    None
}

fn deserialize<T: serde::de::DeserializeOwned>(
    object: Map<String, Value>,
) -> Result<T, Vec<Violation>> {
    serde_json::from_value(Value::Object(object))
        .map_err(|err| vec![Violation::new("payload", err.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "isbn": "12345678",
            "amazon_url": "https://example.com",
            "author": "Mr Example",
            "language": "english",
            "pages": 1000,
            "publisher": "Example press",
            "title": "The example book",
            "year": 2009
        })
    }

    #[test]
    fn create_accepts_a_full_payload() {
        let book = validate_create(&full_payload()).unwrap();
        assert_eq!(book.isbn, "12345678");
        assert_eq!(book.pages, 1000);
        assert_eq!(book.year, 2009);
    }

    #[test]
    fn create_requires_every_field() {
        let violations = validate_create(&json!({"year": 2003})).unwrap_err();
        let missing: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(violations.len(), 7);
        assert!(missing.contains(&"title"));
        assert!(missing.contains(&"isbn"));
        assert!(!missing.contains(&"year"));
    }

    #[test]
    fn all_violations_are_reported_in_one_pass() {
        // Missing fields, a wrong type, and an unknown key at once.
        let mut payload = full_payload();
        let object = payload.as_object_mut().unwrap();
        object.remove("title");
        object.insert("pages".to_string(), json!("many"));
        object.insert("partner".to_string(), json!("yes"));

        let violations = validate_create(&payload).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .any(|v| v.field == "title" && v.error == "is required"));
        assert!(violations
            .iter()
            .any(|v| v.field == "pages" && v.error == "must be an integer"));
        assert!(violations
            .iter()
            .any(|v| v.field == "partner" && v.error == "is not a recognized field"));
    }

    #[test]
    fn integer_fields_reject_floats_and_booleans() {
        let mut payload = full_payload();
        payload["pages"] = json!(99.5);
        payload["year"] = json!(true);

        let violations = validate_create(&payload).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.error == "must be an integer"));
    }

    #[test]
    fn pages_must_be_positive() {
        let mut payload = full_payload();
        payload["pages"] = json!(0);

        let violations = validate_create(&payload).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "pages");
        assert_eq!(violations[0].error, "must be positive");
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let mut payload = full_payload();
        payload["pages"] = json!(i64::from(i32::MAX) + 1);

        let violations = validate_create(&payload).unwrap_err();
        assert_eq!(violations[0].error, "is out of range");
    }

    fn update_payload() -> Value {
        let mut payload = full_payload();
        payload.as_object_mut().unwrap().remove("isbn");
        payload
    }

    #[test]
    fn update_accepts_all_mutable_fields() {
        let changes = validate_update(&update_payload()).unwrap();
        assert_eq!(changes.title, "The example book");
        assert_eq!(changes.pages, 1000);
    }

    #[test]
    fn update_rejects_the_key_field() {
        let violations = validate_update(&full_payload()).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "isbn");
        assert_eq!(violations[0].error, "cannot be changed");
    }

    #[test]
    fn update_rejects_unrecognized_fields() {
        let mut payload = update_payload();
        payload
            .as_object_mut()
            .unwrap()
            .insert("partner".to_string(), json!("yes"));

        let violations = validate_update(&payload).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "partner");
    }

    #[test]
    fn update_requires_every_mutable_field() {
        let violations = validate_update(&json!({"title": "Updated"})).unwrap_err();
        assert_eq!(violations.len(), 6);
        assert!(violations.iter().all(|v| v.error == "is required"));
    }

    #[test]
    fn non_object_payloads_fail_with_a_single_violation() {
        let violations = validate_create(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "payload");
    }
}
