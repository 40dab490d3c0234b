//! Profile attribute featurizers — skills, experience level, profile type.
//!
//! Everything here is total: whatever the upstream CRUD layer stored (missing
//! field, malformed JSON, unknown labels), these functions resolve to a value
//! and never error. Default paths log a structured warning so degradation is
//! visible in production.

use tracing::warn;

/// Fixed skill vocabulary. Order defines the multi-hot layout, so entries
/// must never be reordered — only appended (with a model retrain).
pub const SKILL_VOCABULARY: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "rust",
    "go",
    "java",
    "c#",
    "c++",
    "php",
    "ruby",
    "swift",
    "kotlin",
    "react",
    "vue",
    "angular",
    "node.js",
    "django",
    "flask",
    "laravel",
    "wordpress",
    "shopify",
    "html",
    "css",
    "sql",
    "postgresql",
    "mysql",
    "mongodb",
    "aws",
    "docker",
    "kubernetes",
    "devops",
    "machine learning",
    "data science",
    "data analysis",
    "web scraping",
    "automation",
    "api integration",
    "mobile development",
    "ios",
    "android",
    "ui/ux",
    "graphic design",
    "figma",
    "seo",
    "copywriting",
    "content writing",
    "translation",
    "video editing",
];

/// Multi-hot encode a raw skills field against [`SKILL_VOCABULARY`].
///
/// The raw value may be absent, a JSON array of strings, or (because the
/// upstream layer double-encodes sometimes) a JSON string containing a JSON
/// array. Unknown skills are silently ignored; anything unparseable yields
/// the all-zero vector.
pub fn featurize_skills(raw: Option<&str>) -> Vec<f64> {
    let mut out = vec![0.0; SKILL_VOCABULARY.len()];

    let Some(raw) = raw else {
        return out;
    };

    let skills = parse_skill_list(raw);
    if skills.is_empty() {
        if !raw.trim().is_empty() && raw.trim() != "[]" {
            warn!(raw = %truncate(raw, 80), "unparseable skills field, using zero vector");
        }
        return out;
    }

    for skill in &skills {
        let needle = skill.trim().to_lowercase();
        if let Some(idx) = SKILL_VOCABULARY.iter().position(|v| *v == needle) {
            out[idx] = 1.0;
        }
    }

    out
}

/// Parse a skills field that might be a JSON array, or a JSON string that
/// itself contains a JSON array. Returns an empty list for anything else.
pub fn parse_skill_list(raw: &str) -> Vec<String> {
    let val: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    if let Some(arr) = val.as_array() {
        return arr
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
    }

    // Double-encoded: a string holding a JSON array
    if let Some(s) = val.as_str() {
        if let Ok(serde_json::Value::Array(arr)) = serde_json::from_str::<serde_json::Value>(s) {
            return arr
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    Vec::new()
}

/// Closed mapping {entry, intermediate, expert} → {0, 1, 2}; anything else
/// (including absence) is the -1 sentinel.
pub fn featurize_experience_level(raw: Option<&str>) -> f64 {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("entry") => 0.0,
        Some("intermediate") => 1.0,
        Some("expert") => 2.0,
        Some(other) => {
            warn!(value = %other, "unknown experience level, using -1");
            -1.0
        }
        None => -1.0,
    }
}

/// Closed mapping {personal, agency} → {0, 1}; anything else is -1.
pub fn featurize_profile_type(raw: Option<&str>) -> f64 {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("personal") => 0.0,
        Some("agency") => 1.0,
        Some(other) => {
            warn!(value = %other, "unknown profile type, using -1");
            -1.0
        }
        None => -1.0,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
