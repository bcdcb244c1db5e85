/// Locale bundles
///
/// A bundle is one YAML document of display strings for a single language,
/// held as a `serde_json` object so it can be served back as JSON unchanged.

pub mod defaults;
pub mod resolver;

pub use defaults::DefaultLocales;
pub use resolver::{lookup, resolve, select_locale};

use crate::error::{GateError, GateResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parsed locale document; the root is always a mapping
pub type LocaleBundle = Map<String, Value>;

/// Locale code -> bundle, iterated in sorted order
pub type LocaleSet = BTreeMap<String, LocaleBundle>;

/// Preferred base locale for single-valued fields
pub const BASE_LOCALE: &str = "zh-CN";

const LOCALE_EXTENSIONS: [&str; 2] = [".yml", ".yaml"];

/// Locale code for a locale file name, `None` for anything that is not YAML
pub fn locale_code(file_name: &str) -> Option<&str> {
    LOCALE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .filter(|code| !code.is_empty())
}

/// File names a locale may be stored under, in lookup order
pub fn locale_file_names(code: &str) -> Vec<String> {
    LOCALE_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}", code, ext))
        .collect()
}

/// Reject names that could escape the directory they are joined onto
pub fn is_safe_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Parse one locale file
pub fn parse_bundle(text: &str) -> GateResult<LocaleBundle> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| GateError::Parse(format!("Invalid YAML: {}", e)))?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(GateError::Parse(
            "Locale document root must be a mapping".to_string(),
        )),
    }
}
