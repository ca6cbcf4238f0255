//! The input side of intake: one form submission and its metadata.
//!
//! A [`Submission`] is what a web form posts: who the client is, which
//! service they picked, the uploaded files, and two optional JSON payloads
//! describing the form:
//!
//! * `file_field_map`: `{ "<filename>": { "fieldId": "...", "fieldLabel": "..." } }`,
//!   which tells intake which form field each file was attached to. It is
//!   advisory; malformed JSON is logged and treated as an empty map.
//! * `field_status`: `{ "<fieldId>": { "label": "...", "uploadedCount": n } }`,
//!   the form's own view of each field, reproduced in the report. Malformed
//!   JSON here is a client bug and rejects the submission.

use crate::error::IntakeError;
use crate::pipeline::naming;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Field id given to files the field map does not mention.
pub const UNKNOWN_FIELD_ID: &str = "unknown";

/// Field label given to files the field map does not mention.
pub const UNKNOWN_FIELD_LABEL: &str = "Unknown field";

/// One uploaded file, as received.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFile {
    pub filename: String,
    /// Declared MIME type. `None` when the client did not send one; the
    /// extension decides whether the file is an image in that case.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SubmittedFile {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }
}

/// Which form field a file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    #[serde(default = "unknown_field_id")]
    pub field_id: String,
    #[serde(default = "unknown_field_label")]
    pub field_label: String,
}

impl FieldInfo {
    pub fn new(field_id: impl Into<String>, field_label: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            field_label: field_label.into(),
        }
    }
}

impl Default for FieldInfo {
    fn default() -> Self {
        Self::new(UNKNOWN_FIELD_ID, UNKNOWN_FIELD_LABEL)
    }
}

fn unknown_field_id() -> String {
    UNKNOWN_FIELD_ID.to_string()
}

fn unknown_field_label() -> String {
    UNKNOWN_FIELD_LABEL.to_string()
}

/// The form's own record of one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatus {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub uploaded_count: u32,
    /// Free-form value of non-file fields. Carried but not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Filename → field.
pub type FieldMap = HashMap<String, FieldInfo>;

/// Field id → status, ordered by id so reports are reproducible.
pub type FieldStatusMap = BTreeMap<String, FieldStatus>;

/// Everything one form post carries.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub client_name: String,
    pub phone: String,
    pub service: String,
    pub files: Vec<SubmittedFile>,
    pub field_map: FieldMap,
    pub field_status: FieldStatusMap,
}

impl Submission {
    pub fn new(
        client_name: impl Into<String>,
        phone: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            phone: phone.into(),
            service: service.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: SubmittedFile) -> Self {
        self.files.push(file);
        self
    }

    /// Attach `file` and record that it belongs to the given field.
    pub fn with_field_file(mut self, file: SubmittedFile, field: FieldInfo) -> Self {
        self.field_map.insert(file.filename.clone(), field);
        self.files.push(file);
        self
    }

    pub fn with_field_status(mut self, field_id: impl Into<String>, status: FieldStatus) -> Self {
        self.field_status.insert(field_id.into(), status);
        self
    }

    /// The field a file was attached to, or the unknown field.
    pub fn field_for(&self, filename: &str) -> FieldInfo {
        self.field_map.get(filename).cloned().unwrap_or_default()
    }

    /// Check the form fields, returning the phone digits on success.
    pub fn validate(&self, min_name_len: usize, min_phone_digits: usize) -> Result<String, IntakeError> {
        validate_name(&self.client_name, min_name_len)?;
        let digits = validate_phone(&self.phone, min_phone_digits)?;
        if self.files.is_empty() {
            return Err(IntakeError::NoDocuments);
        }
        Ok(digits)
    }
}

/// The trimmed name must have at least `min_len` characters.
pub fn validate_name(name: &str, min_len: usize) -> Result<(), IntakeError> {
    if name.trim().chars().count() < min_len {
        return Err(IntakeError::NameTooShort { min: min_len });
    }
    Ok(())
}

/// The phone must contain at least `min_digits` digits; returns those digits.
pub fn validate_phone(phone: &str, min_digits: usize) -> Result<String, IntakeError> {
    let digits = naming::phone_digits(phone);
    if digits.len() < min_digits {
        return Err(IntakeError::PhoneTooShort { min: min_digits });
    }
    Ok(digits)
}

/// Parse the filename → field JSON. Blank or malformed input gives an empty map.
pub fn parse_field_map(json: &str) -> FieldMap {
    if json.trim().is_empty() {
        return FieldMap::new();
    }
    match serde_json::from_str(json) {
        Ok(map) => map,
        Err(e) => {
            warn!("Ignoring malformed file_field_map: {e}");
            FieldMap::new()
        }
    }
}

/// Parse the field-status JSON. Blank input gives an empty map.
pub fn parse_field_status(json: &str) -> Result<FieldStatusMap, IntakeError> {
    if json.trim().is_empty() {
        return Ok(FieldStatusMap::new());
    }
    serde_json::from_str(json).map_err(|e| IntakeError::InvalidFieldStatus(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_map_fills_missing_keys_with_unknown() {
        let map = parse_field_map(
            r#"{
                "rg.jpg": {"fieldId": "doc_rg", "fieldLabel": "Documento RG"},
                "x.pdf": {"fieldLabel": "Comprovante"},
                "y.pdf": {}
            }"#,
        );
        assert_eq!(map["rg.jpg"], FieldInfo::new("doc_rg", "Documento RG"));
        assert_eq!(map["x.pdf"], FieldInfo::new("unknown", "Comprovante"));
        assert_eq!(map["y.pdf"], FieldInfo::default());
    }

    #[test]
    fn malformed_field_map_is_ignored() {
        assert!(parse_field_map("{not json").is_empty());
        assert!(parse_field_map("").is_empty());
        assert!(parse_field_map("[1, 2]").is_empty());
    }

    #[test]
    fn field_status_parses_and_orders_by_id() {
        let status = parse_field_status(
            r#"{
                "doc_rg": {"label": "RG", "uploadedCount": 2},
                "cpf": {"label": "CPF", "uploadedCount": 0, "value": "123"}
            }"#,
        )
        .unwrap();
        let ids: Vec<_> = status.keys().cloned().collect();
        assert_eq!(ids, vec!["cpf", "doc_rg"]);
        assert_eq!(status["doc_rg"].uploaded_count, 2);
        assert_eq!(status["cpf"].value, Some(serde_json::json!("123")));
    }

    #[test]
    fn malformed_field_status_is_fatal() {
        let err = parse_field_status("{oops").unwrap_err();
        assert!(matches!(err, IntakeError::InvalidFieldStatus(_)));
        assert!(parse_field_status("  ").unwrap().is_empty());
    }

    #[test]
    fn validation_checks_name_phone_and_files() {
        let s = Submission::new("Jo", "11988887777", "Visa");
        assert!(matches!(s.validate(3, 10), Err(IntakeError::NameTooShort { min: 3 })));

        let s = Submission::new("  Ana  ", "(11) 9888-777", "Visa");
        assert!(matches!(s.validate(3, 10), Err(IntakeError::PhoneTooShort { min: 10 })));

        let s = Submission::new("Ana", "(11) 98888-7777", "Visa");
        assert!(matches!(s.validate(3, 10), Err(IntakeError::NoDocuments)));

        let s = s.with_file(SubmittedFile::new("a.pdf", None, vec![1]));
        assert_eq!(s.validate(3, 10).unwrap(), "11988887777");
    }

    #[test]
    fn unmapped_files_belong_to_the_unknown_field() {
        let s = Submission::new("Ana", "11988887777", "Visa").with_field_file(
            SubmittedFile::new("rg.jpg", Some("image/jpeg"), vec![]),
            FieldInfo::new("doc_rg", "RG"),
        );
        assert_eq!(s.field_for("rg.jpg").field_id, "doc_rg");
        assert_eq!(s.field_for("other.jpg").field_id, UNKNOWN_FIELD_ID);
        assert_eq!(s.field_for("other.jpg").field_label, UNKNOWN_FIELD_LABEL);
    }
}
