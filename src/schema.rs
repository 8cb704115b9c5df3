//! Validates configuration objects against the canonical parameter schema.
//!
//! The same field table serves all three sources. What changes per source is
//! which fields are permitted and whether they are required:
//!
//! | source        | connection fields | sharedDriveId / strictJsonParsing | settings |
//! |---------------|-------------------|-----------------------------------|----------|
//! | `urlParams`   | required          | optional                          | optional |
//! | `jsonParams`  | stripped          | stripped                          | optional |
//! | `finalCheck`  | stripped          | stripped                          | required |
//!
//! Validation never stops at the first failure: every failing field is
//! reported, in field declaration order. Fields that pass are normalised
//! (integral numbers become JSON integers) and deserialised into the typed
//! structs below.

use std::fmt;

use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ValidationError;
use super::model::Rotation;
use super::params::{number_value, ParamMap};

/// Which configuration source is being validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationStage {
    UrlParams,
    JsonParams { file_name: String },
    FinalCheck,
}

impl ValidationStage {
    /// The stage tag as shown in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationStage::UrlParams => "urlParams",
            ValidationStage::JsonParams { .. } => "jsonParams",
            ValidationStage::FinalCheck => "finalCheck",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueCode {
    InvalidType,
    InvalidLiteral,
    NotInteger,
    TooSmall,
    TooBig,
    Custom,
}

/// One failing field.
#[derive(Clone, Debug, PartialEq)]
pub struct Issue {
    /// Field name, followed by an array index for list elements. Empty for the root object.
    pub path: Vec<String>,
    pub code: IssueCode,
    pub message: String,
}

impl Issue {
    fn new(path: Vec<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self { path, code, message: message.into() }
    }

    /// The top-level field this issue belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    /// Human-readable `path: message` line.
    pub fn feedback(&self) -> String {
        if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.path.join("."), self.message)
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.feedback())
    }
}

/// Settings that can come from any source, each optional.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_refetch: Option<bool>,
    /// Minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refetch_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_mime_types: Option<Vec<String>>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_video_length: Option<bool>,
}

/// Parameters as validated from the URL.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlParams {
    pub google_api_key: String,
    pub drive_folder_id: String,
    pub shared_drive_id: Option<String>,
    pub strict_json_parsing: Option<bool>,
    #[serde(flatten)]
    pub settings: SettingsPatch,
}

/// A complete set of settings, still in the units users write them in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub rotation: Rotation,
    /// Seconds.
    pub slide_length: u64,
    pub enable_refetch: bool,
    /// Minutes.
    pub refetch_interval: u64,
    pub enabled_mime_types: Vec<String>,
    /// Seconds.
    pub fade_time: f64,
    pub ignore_video_length: bool,
}

#[derive(Clone, Copy, Debug)]
enum FieldKind {
    NonEmptyString,
    Boolean,
    Rotation,
    Integer { min: i64, max: i64 },
    Number { min: f64 },
    StringList { min_len: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldScope {
    /// API key and folder id.
    Connection,
    /// Only meaningful in the URL.
    UrlOnly,
    Setting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Presence {
    Required,
    Optional,
}

struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    scope: FieldScope,
}

/// Upper bound for integer settings (seconds or minutes).
const INTEGER_MAX: i64 = u32::MAX as i64;

const FIELDS: [FieldSpec; 11] = [
    FieldSpec { name: "googleApiKey", kind: FieldKind::NonEmptyString, scope: FieldScope::Connection },
    FieldSpec { name: "driveFolderId", kind: FieldKind::NonEmptyString, scope: FieldScope::Connection },
    FieldSpec { name: "sharedDriveId", kind: FieldKind::NonEmptyString, scope: FieldScope::UrlOnly },
    FieldSpec { name: "strictJsonParsing", kind: FieldKind::Boolean, scope: FieldScope::UrlOnly },
    FieldSpec { name: "rotation", kind: FieldKind::Rotation, scope: FieldScope::Setting },
    FieldSpec { name: "slideLength", kind: FieldKind::Integer { min: 5, max: INTEGER_MAX }, scope: FieldScope::Setting },
    FieldSpec { name: "enableRefetch", kind: FieldKind::Boolean, scope: FieldScope::Setting },
    FieldSpec { name: "refetchInterval", kind: FieldKind::Integer { min: 1, max: INTEGER_MAX }, scope: FieldScope::Setting },
    FieldSpec { name: "enabledMimeTypes", kind: FieldKind::StringList { min_len: 3 }, scope: FieldScope::Setting },
    FieldSpec { name: "fadeTime", kind: FieldKind::Number { min: 0.0 }, scope: FieldScope::Setting },
    FieldSpec { name: "ignoreVideoLength", kind: FieldKind::Boolean, scope: FieldScope::Setting },
];

fn presence(scope: FieldScope, stage: &ValidationStage) -> Option<Presence> {
    match (stage, scope) {
        (ValidationStage::UrlParams, FieldScope::Connection) => Some(Presence::Required),
        (ValidationStage::UrlParams, _) => Some(Presence::Optional),
        (ValidationStage::JsonParams { .. }, FieldScope::Setting) => Some(Presence::Optional),
        (ValidationStage::FinalCheck, FieldScope::Setting) => Some(Presence::Required),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_type(path: Vec<String>, expected: &str, value: &Value) -> Issue {
    Issue::new(path, IssueCode::InvalidType, format!("Expected {}, received {}", expected, type_name(value)))
}

fn check_string(path: Vec<String>, value: &Value, min_len: usize) -> Result<Value, Vec<Issue>> {
    match value {
        Value::String(s) if s.chars().count() >= min_len => Ok(value.clone()),
        Value::String(_) => Err(vec![Issue::new(
            path,
            IssueCode::TooSmall,
            format!("String must contain at least {} character(s)", min_len),
        )]),
        other => Err(vec![invalid_type(path, "string", other)]),
    }
}

/// Checks one field value, returning the normalised value or every issue found.
fn check_field(name: &str, kind: FieldKind, value: &Value) -> Result<Value, Vec<Issue>> {
    let path = vec![name.to_string()];
    match kind {
        FieldKind::NonEmptyString => check_string(path, value, 1),
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(vec![invalid_type(path, "boolean", other)]),
        },
        FieldKind::Rotation => {
            let matches = value
                .as_f64()
                .map(|n| Rotation::ALLOWED_DEGREES.iter().any(|d| f64::from(*d) == n))
                .unwrap_or(false);
            match value.as_f64() {
                Some(n) if matches => Ok(number_value(n)),
                _ => {
                    let allowed: Vec<String> = Rotation::ALLOWED_DEGREES.iter().map(u16::to_string).collect();
                    Err(vec![Issue::new(
                        path,
                        IssueCode::InvalidLiteral,
                        format!("Invalid literal value, expected one of [{}]; received {}", allowed.join(", "), value),
                    )])
                }
            }
        }
        FieldKind::Integer { min, max } => {
            let Some(n) = value.as_f64() else {
                return Err(vec![invalid_type(path, "number", value)]);
            };
            let mut issues = Vec::new();
            if n.fract() != 0.0 {
                issues.push(Issue::new(path.clone(), IssueCode::NotInteger, "Expected integer, received float"));
            }
            if n < min as f64 {
                issues.push(Issue::new(
                    path,
                    IssueCode::TooSmall,
                    format!("Number must be greater than or equal to {}", min),
                ));
            } else if n > max as f64 {
                issues.push(Issue::new(
                    path,
                    IssueCode::TooBig,
                    format!("Number must be less than or equal to {}", max),
                ));
            }
            if issues.is_empty() { Ok(number_value(n)) } else { Err(issues) }
        }
        FieldKind::Number { min } => {
            let Some(n) = value.as_f64() else {
                return Err(vec![invalid_type(path, "number", value)]);
            };
            if n < min {
                return Err(vec![Issue::new(
                    path,
                    IssueCode::TooSmall,
                    format!("Number must be greater than or equal to {}", min),
                )]);
            }
            Ok(number_value(n))
        }
        FieldKind::StringList { min_len } => {
            let Value::Array(items) = value else {
                return Err(vec![invalid_type(path, "array", value)]);
            };
            let mut issues = Vec::new();
            for (index, item) in items.iter().enumerate() {
                let item_path = vec![name.to_string(), index.to_string()];
                if let Err(mut item_issues) = check_string(item_path, item, min_len) {
                    issues.append(&mut item_issues);
                }
            }
            if issues.is_empty() { Ok(value.clone()) } else { Err(issues) }
        }
    }
}

/// Validates `input` for the given source.
///
/// On success returns only the permitted fields, normalised. Unknown and
/// non-permitted keys are stripped, never reported.
///
/// # Errors
/// Returns a `ValidationError` carrying the stage and every issue found.
#[must_use = "validation can fail; the Result must be handled"]
pub fn validate(input: &Value, stage: ValidationStage) -> Result<ParamMap, ValidationError> {
    let Value::Object(object) = input else {
        return Err(ValidationError {
            issues: vec![invalid_type(Vec::new(), "object", input)],
            stage,
        });
    };

    let mut output = ParamMap::new();
    let mut issues = Vec::new();

    for field in &FIELDS {
        let Some(presence) = presence(field.scope, &stage) else {
            if object.contains_key(field.name) {
                trace!("Stripping '{}': not accepted in stage {}", field.name, stage.name());
            }
            continue;
        };
        match object.get(field.name) {
            Some(value) => match check_field(field.name, field.kind, value) {
                Ok(normalised) => {
                    output.insert(field.name.to_string(), normalised);
                }
                Err(mut field_issues) => issues.append(&mut field_issues),
            },
            None if presence == Presence::Required => {
                issues.push(Issue::new(vec![field.name.to_string()], IssueCode::InvalidType, "Required"));
            }
            None => {}
        }
    }

    for key in object.keys() {
        if !FIELDS.iter().any(|f| f.name == key) {
            debug!("Stripping unrecognised key '{}' in stage {}", key, stage.name());
        }
    }

    if issues.is_empty() {
        Ok(output)
    } else {
        Err(ValidationError { stage, issues })
    }
}

fn into_typed<T: DeserializeOwned>(map: ParamMap, stage: ValidationStage) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| ValidationError {
        stage,
        issues: vec![Issue::new(Vec::new(), IssueCode::Custom, e.to_string())],
    })
}

/// Validates coerced URL parameters.
#[must_use = "validation can fail; the Result must be handled"]
pub fn validate_url_params(params: &ParamMap) -> Result<(ParamMap, UrlParams), ValidationError> {
    let map = validate(&Value::Object(params.clone()), ValidationStage::UrlParams)?;
    let typed = into_typed(map.clone(), ValidationStage::UrlParams)?;
    Ok((map, typed))
}

/// Validates the parsed content of one JSON configuration file.
#[must_use = "validation can fail; the Result must be handled"]
pub fn validate_json_params(content: &Value, file_name: &str) -> Result<ParamMap, ValidationError> {
    validate(content, ValidationStage::JsonParams { file_name: file_name.to_string() })
}

/// Validates the fully merged configuration; every setting must be present.
#[must_use = "validation can fail; the Result must be handled"]
pub fn validate_final(merged: &ParamMap) -> Result<Settings, ValidationError> {
    let map = validate(&Value::Object(merged.clone()), ValidationStage::FinalCheck)?;
    into_typed(map, ValidationStage::FinalCheck)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> ParamMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn full_settings() -> Value {
        json!({
            "rotation": 90,
            "slideLength": 10,
            "enableRefetch": true,
            "refetchInterval": 2,
            "enabledMimeTypes": ["image/png"],
            "fadeTime": 0.5,
            "ignoreVideoLength": false
        })
    }

    #[test]
    fn url_params_require_connection_fields() {
        let err = validate_url_params(&as_map(json!({ "rotation": 90 }))).unwrap_err();
        assert_eq!(err.stage, ValidationStage::UrlParams);
        let fields: Vec<_> = err.issues.iter().filter_map(Issue::field).collect();
        assert_eq!(fields, vec!["googleApiKey", "driveFolderId"]);
        assert_eq!(err.issues[0].message, "Required");
    }

    #[test]
    fn empty_folder_id_fails_url_stage() {
        let err = validate_url_params(&as_map(json!({ "googleApiKey": "K", "driveFolderId": "" }))).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].feedback(), "driveFolderId: String must contain at least 1 character(s)");
    }

    #[test]
    fn url_params_deserialize_into_typed_struct() {
        let (map, typed) = validate_url_params(&as_map(json!({
            "googleApiKey": "K",
            "driveFolderId": "F",
            "strictJsonParsing": true,
            "slideLength": 10.0,
            "unknown": 1
        })))
        .unwrap();
        assert_eq!(typed.google_api_key, "K");
        assert_eq!(typed.strict_json_parsing, Some(true));
        assert_eq!(typed.settings.slide_length, Some(10));
        assert_eq!(map["slideLength"], json!(10));
        assert!(!map.contains_key("unknown"));
    }

    #[test]
    fn rotation_mismatch_uses_literal_message() {
        let err = validate_json_params(&json!({ "rotation": 45 }), "a.json").unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::InvalidLiteral);
        assert_eq!(err.issues[0].message, "Invalid literal value, expected one of [0, 90, 180, 270]; received 45");

        let err = validate_json_params(&json!({ "rotation": "90" }), "a.json").unwrap_err();
        assert!(err.issues[0].message.ends_with("received \"90\""));
    }

    #[test]
    fn reports_every_failing_field_in_order() {
        let err = validate_json_params(
            &json!({
                "slideLength": 3.5,
                "refetchInterval": 0,
                "enabledMimeTypes": ["image/png", "x", 7],
                "fadeTime": -1,
                "enableRefetch": "yes"
            }),
            "bad.json",
        )
        .unwrap_err();
        let feedback: Vec<String> = err.issues.iter().map(Issue::feedback).collect();
        assert_eq!(
            feedback,
            vec![
                "slideLength: Expected integer, received float",
                "slideLength: Number must be greater than or equal to 5",
                "enableRefetch: Expected boolean, received string",
                "refetchInterval: Number must be greater than or equal to 1",
                "enabledMimeTypes.1: String must contain at least 3 character(s)",
                "enabledMimeTypes.2: Expected string, received number",
                "fadeTime: Number must be greater than or equal to 0",
            ]
        );
        assert_eq!(err.stage, ValidationStage::JsonParams { file_name: "bad.json".into() });
    }

    #[test]
    fn json_params_strip_connection_fields() {
        let map = validate_json_params(&json!({ "googleApiKey": "X", "strictJsonParsing": true, "slideLength": 5 }), "a.json").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["slideLength"], json!(5));
    }

    #[test]
    fn non_object_json_reports_root_issue() {
        let err = validate_json_params(&json!([1, 2]), "list.json").unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].path.is_empty());
        assert_eq!(err.issues[0].feedback(), "Expected object, received array");
    }

    #[test]
    fn final_check_requires_every_setting() {
        let settings = validate_final(&as_map(full_settings())).unwrap();
        assert_eq!(settings.rotation, Rotation::Deg90);
        assert_eq!(settings.slide_length, 10);
        assert_eq!(settings.fade_time, 0.5);

        let mut partial = as_map(full_settings());
        partial.remove("fadeTime");
        let err = validate_final(&partial).unwrap_err();
        assert_eq!(err.stage, ValidationStage::FinalCheck);
        assert_eq!(err.issues[0].feedback(), "fadeTime: Required");
    }

    #[test]
    fn boundaries_are_inclusive() {
        assert!(validate_json_params(&json!({ "slideLength": 5, "refetchInterval": 1, "fadeTime": 0 }), "a.json").is_ok());
        assert!(validate_json_params(&json!({ "slideLength": 4 }), "a.json").is_err());
        assert!(validate_json_params(&json!({ "slideLength": 4_294_967_295u64 }), "a.json").is_ok());
    }

    #[test]
    fn oversized_integers_are_rejected_per_field() {
        let err = validate_json_params(&json!({ "slideLength": 10_000_000_000_000_000u64, "refetchInterval": 1e300 }), "a.json")
            .unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.issues[0].code, IssueCode::TooBig);
        assert_eq!(err.issues[0].feedback(), "slideLength: Number must be less than or equal to 4294967295");
        assert_eq!(err.issues[1].field(), Some("refetchInterval"));
    }

    #[test]
    fn largest_accepted_integer_deserializes() {
        let mut settings = as_map(full_settings());
        settings.insert("slideLength".into(), json!(4_294_967_295u64));
        assert_eq!(validate_final(&settings).unwrap().slide_length, 4_294_967_295);
    }
}
