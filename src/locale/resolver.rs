/// Dotted-key lookup with locale fallback and interpolation
use super::{LocaleBundle, LocaleSet, BASE_LOCALE};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

const ENGLISH_LOCALE: &str = "en-US";

/// Locale preference when the current one is not offered
const PREFERRED_LOCALES: [&str; 3] = ["zh-CN", "en-US", "en-UK"];

lazy_static! {
    /// `{name}` parameter placeholder
    static ref PARAM_PATTERN: Regex = Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap();

    /// `{{dotted.path}}` reference to another string of the same locale
    static ref REFERENCE_PATTERN: Regex = Regex::new(r"\{\{([^}]+)\}\}").unwrap();
}

/// Walk a bundle by dotted key. Only string leaves count as found.
pub fn lookup<'a>(bundle: &'a LocaleBundle, key: &str) -> Option<&'a str> {
    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut value = bundle.get(first)?;

    for segment in segments {
        value = value.as_object()?.get(segment)?;
    }

    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn lookup_in<'a>(bundles: &'a LocaleSet, locale: &str, key: &str) -> Option<&'a str> {
    bundles.get(locale).and_then(|bundle| lookup(bundle, key))
}

/// Resolve `key` for `locale`, falling back to zh-CN and then en-US.
///
/// Returns an empty string when no locale defines the key.
pub fn resolve(
    bundles: &LocaleSet,
    locale: &str,
    key: &str,
    params: Option<&HashMap<String, String>>,
) -> String {
    let found = lookup_in(bundles, locale, key)
        .or_else(|| {
            (locale != BASE_LOCALE)
                .then(|| lookup_in(bundles, BASE_LOCALE, key))
                .flatten()
        })
        .or_else(|| {
            (locale != ENGLISH_LOCALE)
                .then(|| lookup_in(bundles, ENGLISH_LOCALE, key))
                .flatten()
        });

    let Some(template) = found else {
        return String::new();
    };

    let with_params = match params {
        Some(params) => PARAM_PATTERN
            .replace_all(template, |caps: &Captures| {
                params
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        None => template.to_string(),
    };

    // References resolve in the requested locale only
    REFERENCE_PATTERN
        .replace_all(&with_params, |caps: &Captures| {
            lookup_in(bundles, locale, &caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Pick the locale to display given what an identity offers
pub fn select_locale(available: &[String], current: &str) -> String {
    if available.iter().any(|l| l == current) {
        return current.to_string();
    }

    PREFERRED_LOCALES
        .iter()
        .find(|preferred| available.iter().any(|l| l == *preferred))
        .map(|preferred| preferred.to_string())
        .or_else(|| available.first().cloned())
        .unwrap_or_else(|| current.to_string())
}
