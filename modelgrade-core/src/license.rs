//! License identifiers: normalization, scoring and compatibility.

use regex::Regex;
use std::sync::LazyLock;

/// Matches `License: mit`, `licensed under Apache-2.0` and similar README phrasing.
static README_LICENSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:licensed under|license)\s*[:\-]?\s*([A-Za-z0-9.\-+]+)").ok()
});

const PERMISSIVE: [&str; 6] = [
    "apache-2.0",
    "mit",
    "bsd-3-clause",
    "bsd-2-clause",
    "lgpl-2.1",
    "mpl-2.0",
];
const RESTRICTIVE: [&str; 3] = ["gpl-3.0", "agpl-3.0", "proprietary"];

const ALIASES: [(&str, &str); 7] = [
    ("apache 2.0", "apache-2.0"),
    ("apache2", "apache-2.0"),
    ("apache", "apache-2.0"),
    ("mozilla", "mpl-2.0"),
    ("lgpl", "lgpl-2.1"),
    ("bsd", "bsd-3-clause"),
    ("gpl", "gpl-3.0"),
];

/// Code licenses that may be combined with a model under the key license.
const COMPATIBILITY: [(&str, &[&str]); 11] = [
    ("mit", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "lgpl-3.0", "mpl-2.0", "gpl-2.0", "gpl-3.0", "agpl-3.0"]),
    ("apache-2.0", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "lgpl-3.0", "mpl-2.0", "gpl-3.0", "agpl-3.0"]),
    ("bsd-2-clause", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "lgpl-3.0", "mpl-2.0", "gpl-2.0", "gpl-3.0", "agpl-3.0"]),
    ("bsd-3-clause", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "lgpl-3.0", "mpl-2.0", "gpl-2.0", "gpl-3.0", "agpl-3.0"]),
    ("lgpl-2.1", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "lgpl-3.0", "gpl-2.0", "gpl-3.0"]),
    ("lgpl-3.0", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-3.0", "gpl-3.0", "agpl-3.0"]),
    ("mpl-2.0", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "mpl-2.0", "gpl-3.0"]),
    ("gpl-2.0", &["mit", "bsd-2-clause", "bsd-3-clause", "lgpl-2.1", "gpl-2.0"]),
    ("gpl-3.0", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-3.0", "gpl-3.0", "agpl-3.0"]),
    ("agpl-3.0", &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause", "lgpl-3.0", "gpl-3.0", "agpl-3.0"]),
    ("proprietary", &[]),
];

/// Lowercase SPDX-like id. Known ids pass through; otherwise the first alias
/// contained in the string wins. `None` for blank, `unknown` or `noassertion`.
pub fn normalize(raw: &str) -> Option<String> {
    let key = raw.trim().to_ascii_lowercase();
    if key.is_empty() || key == "unknown" || key == "noassertion" || key == "none" {
        return None;
    }
    if COMPATIBILITY.iter().any(|(id, _)| *id == key) {
        return Some(key);
    }
    for (alias, canonical) in ALIASES {
        if key.contains(alias) {
            return Some(canonical.to_string());
        }
    }
    Some(key)
}

/// 1.0 permissive, 0.0 restrictive or missing, 0.5 anything else.
pub fn score(license: Option<&str>) -> f64 {
    let Some(key) = license.map(|l| l.trim().to_ascii_lowercase()) else {
        return 0.0;
    };
    if key.is_empty() {
        0.0
    } else if PERMISSIVE.contains(&key.as_str()) {
        1.0
    } else if RESTRICTIVE.contains(&key.as_str()) {
        0.0
    } else {
        0.5
    }
}

/// License named in free README text.
pub fn from_readme(text: &str) -> Option<String> {
    let re = README_LICENSE.as_ref()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

/// Whether code under `code_license` may be fine-tuned with and run alongside a
/// model under `model_license`. Unknown licenses are never compatible.
pub fn is_compatible(model_license: &str, code_license: &str) -> bool {
    let (Some(model), Some(code)) = (normalize(model_license), normalize(code_license)) else {
        return false;
    };
    COMPATIBILITY
        .iter()
        .find(|(id, _)| *id == model)
        .is_some_and(|(_, allowed)| allowed.contains(&code.as_str()))
}
