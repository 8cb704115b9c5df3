//! Extracts configuration parameters from the page's query string.
//!
//! `RawParams` holds the recognised parameters as plain strings, exactly as they
//! appeared in the URL. `parse_url_params` checks that the connection-required
//! parameters are present and coerces the known numeric, boolean and list
//! parameters to typed JSON values ready for schema validation.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde_json::Value;
use url::Url;

use super::errors::MissingParamsError;

/// An untyped key/value mapping, the shape every configuration source is validated in.
pub type ParamMap = serde_json::Map<String, Value>;

/// Parameters without which the Drive folder can't be reached.
pub const REQUIRED_PARAMS: [&str; 2] = ["googleApiKey", "driveFolderId"];

/// Every other parameter the URL may carry.
pub const OPTIONAL_PARAMS: [&str; 9] = [
    "sharedDriveId",
    "strictJsonParsing",
    "rotation",
    "slideLength",
    "enableRefetch",
    "refetchInterval",
    "enabledMimeTypes",
    "fadeTime",
    "ignoreVideoLength",
];

const NUMERIC_PARAMS: [&str; 4] = ["rotation", "slideLength", "refetchInterval", "fadeTime"];
const BOOLEAN_PARAMS: [&str; 3] = ["strictJsonParsing", "enableRefetch", "ignoreVideoLength"];
const LIST_PARAMS: [&str; 1] = ["enabledMimeTypes"];

/// Recognised query parameters as raw strings, before any type coercion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawParams {
    values: BTreeMap<String, String>,
}

impl RawParams {
    /// Reads the recognised parameters from a query string (leading `?` optional).
    /// For repeated keys the first occurrence wins; unknown keys are ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = RawParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if !is_known_param(&key) {
                trace!("Ignoring unrecognised query parameter '{}'", key);
                continue;
            }
            params.values.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        debug!("Received params: {:?}", params.values);
        params
    }

    /// Reads the recognised parameters from a full page URL, or from a bare query string.
    #[must_use = "parsing the URL can fail; the Result must be handled"]
    pub fn from_url(input: &str) -> Result<Self, url::ParseError> {
        if input.contains("://") {
            let url = Url::parse(input)?;
            Ok(Self::from_query(url.query().unwrap_or_default()))
        } else {
            Ok(Self::from_query(input))
        }
    }

    /// Adds a parameter, replacing any earlier value. Unknown keys are kept as well.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_known_param(name: &str) -> bool {
    REQUIRED_PARAMS.contains(&name) || OPTIONAL_PARAMS.contains(&name)
}

/// Converts a finite number to a JSON value, storing integral values as integers.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn coerce_number(value: &str) -> Value {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => number_value(n),
        // Left as a string so validation reports the bad type
        _ => Value::String(value.to_string()),
    }
}

fn coerce_boolean(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

fn coerce_list(value: &str) -> Value {
    Value::Array(
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
    )
}

/// Coerces one raw parameter to the JSON type its name declares.
pub fn coerce_param(name: &str, value: &str) -> Value {
    if NUMERIC_PARAMS.contains(&name) {
        coerce_number(value)
    } else if BOOLEAN_PARAMS.contains(&name) {
        coerce_boolean(value)
    } else if LIST_PARAMS.contains(&name) {
        coerce_list(value)
    } else {
        Value::String(value.to_string())
    }
}

/// Checks for the required parameters and coerces everything present.
///
/// Optional parameters with empty values are treated as absent. Empty required
/// values are kept so the schema reports them instead of calling them missing.
///
/// # Errors
/// Returns `MissingParamsError` naming every absent required parameter.
#[must_use = "required parameters may be missing; the Result must be handled"]
pub fn parse_url_params(raw: &RawParams) -> Result<ParamMap, MissingParamsError> {
    let missing_params: Vec<String> = REQUIRED_PARAMS
        .iter()
        .filter(|name| raw.get(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if !missing_params.is_empty() {
        let given_params = raw
            .iter()
            .filter(|(name, value)| is_known_param(name) && !value.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        return Err(MissingParamsError {
            missing_params,
            given_params,
            optional_params: OPTIONAL_PARAMS.iter().map(|name| name.to_string()).collect(),
        });
    }

    let mut parsed = ParamMap::new();
    for name in REQUIRED_PARAMS {
        if let Some(value) = raw.get(name) {
            parsed.insert(name.to_string(), coerce_param(name, value));
        }
    }
    for name in OPTIONAL_PARAMS {
        match raw.get(name) {
            Some(value) if !value.is_empty() => {
                parsed.insert(name.to_string(), coerce_param(name, value));
            }
            _ => {}
        }
    }
    debug!("Coerced URL params: {:?}", parsed);
    Ok(parsed)
}
