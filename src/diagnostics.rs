//! Renders setup failures as a plain-text diagnostic shown instead of the slideshow.
//!
//! The text tells the user exactly what is wrong and how to fix it: which URL
//! parameters are missing (and which optional ones they could add), or which
//! fields failed validation and in which source.

use std::fmt::Write;

use super::errors::{AppError, ConfigError, MissingParamsError, ValidationError};
use super::schema::{Issue, ValidationStage};

const TITLE: &str = "Shop Window: Error";

fn bullet_list(out: &mut String, items: impl IntoIterator<Item = String>) {
    for item in items {
        let _ = writeln!(out, "  - {}", item);
    }
}

/// Diagnostic for absent required URL parameters.
pub fn render_missing_params(err: &MissingParamsError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "The following required input(s) are missing from the URL:");
    bullet_list(&mut out, err.missing_params.iter().cloned());
    let _ = writeln!(out, "Please add them to the URL, in the format:");
    let _ = writeln!(out, "  https://url.for.page/?name1=value1&name2=value2&name3=value3");

    let (set, unset): (Vec<&String>, Vec<&String>) =
        err.optional_params.iter().partition(|name| err.given_params.contains_key(name.as_str()));
    if !set.is_empty() {
        let _ = writeln!(out, "You have provided the following optional inputs:");
        bullet_list(&mut out, set.into_iter().map(|name| format!("{}: {}", name, err.given_params[name.as_str()])));
    }
    if !unset.is_empty() {
        let _ = writeln!(out, "You can also provide the following optional inputs:");
        bullet_list(&mut out, unset.into_iter().cloned());
    }
    out
}

fn stage_phrase(stage: &ValidationStage) -> String {
    match stage {
        ValidationStage::UrlParams => "reading provided URL parameters".to_string(),
        ValidationStage::JsonParams { file_name } => {
            format!("parsing JSON file \"{}\" from the provided Google Drive folder", file_name)
        }
        ValidationStage::FinalCheck => "performing final check".to_string(),
    }
}

/// Diagnostic for a schema validation failure.
pub fn render_validation(err: &ValidationError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Failed to validate the following fields when {}:", stage_phrase(&err.stage));
    bullet_list(&mut out, err.issues.iter().map(Issue::feedback));
    out
}

/// The full diagnostic view for a setup failure, or `None` for a cancellation,
/// which is never shown to the user.
pub fn render_error(err: &AppError) -> Option<String> {
    if err.is_cancelled() {
        return None;
    }
    let body = match err {
        AppError::Config(ConfigError::MissingParams(e)) => render_missing_params(e),
        AppError::Config(ConfigError::Validation(e)) => render_validation(e),
        other => format!("{}\n", other),
    };
    Some(format!("{}\n\n{}", TITLE, body))
}
