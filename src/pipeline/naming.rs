//! Naming rules for folders and stored files.
//!
//! Every name that reaches the storage backend goes through this module:
//!
//! * client folder: `slugify(name)-<phone digits>`
//! * service folder: the service name with spaces turned into `_`
//! * stored file: the field label, or the original stem when the field is
//!   unknown, plus `.pdf` for converted images or the original extension
//! * field subfolder: the field label, for fields that carry several files
//!
//! All functions are pure and deterministic: the same submission always maps
//! to the same names, which is what makes resubmission idempotent under the
//! skip-on-existing upload policy.

use crate::submission::UNKNOWN_FIELD_LABEL;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Fallback for names that sanitise to nothing.
pub const FALLBACK_FILE_NAME: &str = "file";
pub const FALLBACK_CLIENT_SLUG: &str = "client";
pub const FALLBACK_SERVICE_NAME: &str = "Service";

/// How many characters of the limit are kept free when a stem is shortened.
const TRUNCATION_HEADROOM: usize = 10;

static RE_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());
static RE_SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").unwrap());
static RE_NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").unwrap());

// ── Filenames ────────────────────────────────────────────────────────────────

/// Make `name` safe as a single path component on common filesystems.
///
/// Characters illegal on Windows become `_`, whitespace runs become a single
/// `_`, and names longer than `max_len` characters are shortened by cutting
/// the stem while keeping the extension.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    if name.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    let cleaned = RE_ILLEGAL.replace_all(name, "_");
    let cleaned = RE_WHITESPACE.replace_all(&cleaned, "_").into_owned();

    if cleaned.chars().count() <= max_len {
        return cleaned;
    }
    let (stem, ext) = split_extension(&cleaned);
    let keep = max_len.saturating_sub(TRUNCATION_HEADROOM);
    let mut out: String = stem.chars().take(keep).collect();
    out.push_str(ext);
    if out.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        out
    }
}

/// Split `name` into `(stem, extension)`, the extension including its dot.
///
/// A leading dot does not start an extension (`.env` has none) and neither
/// does a trailing one.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 && i + 1 < name.len() => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

/// Base name (without extension) for a stored file.
///
/// Uses the field label when there is one; an absent or unknown field falls
/// back to the stem of the file the user uploaded.
pub fn stored_stem(field_label: &str, original_filename: &str, max_len: usize) -> String {
    let unknown = sanitize_filename(&UNKNOWN_FIELD_LABEL.replace(' ', "_"), max_len);
    let from_label = if field_label.trim().is_empty() {
        String::new()
    } else {
        sanitize_filename(&field_label.replace(' ', "_"), max_len)
    };
    if !from_label.is_empty() && from_label != unknown {
        return from_label;
    }
    let (stem, _) = split_extension(base_name(original_filename));
    sanitize_filename(stem, max_len)
}

/// Stored name for a passthrough (non-image) file: stem plus original extension.
pub fn passthrough_name(field_label: &str, original_filename: &str, max_len: usize) -> String {
    let (_, ext) = split_extension(base_name(original_filename));
    format!("{}{}", stored_stem(field_label, original_filename, max_len), ext)
}

/// Stored name for an image converted to PDF.
pub fn pdf_name(field_label: &str, original_filename: &str, max_len: usize) -> String {
    format!("{}.pdf", stored_stem(field_label, original_filename, max_len))
}

/// Name of the per-field subfolder used when a field carries several files.
pub fn field_folder_name(field_label: &str, max_len: usize) -> String {
    sanitize_filename(&field_label.replace(' ', "_"), max_len)
}

/// `RG.pdf`, 2 → `RG(2).pdf`.
pub fn numbered_name(name: &str, n: usize) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}({n}){ext}")
}

/// Last path component of a client-supplied filename.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
}

// ── Folders ──────────────────────────────────────────────────────────────────

/// Lowercase ASCII slug: accents folded, punctuation dropped, separator runs
/// collapsed to `-`, at most `max_len` characters.
pub fn slugify(value: &str, max_len: usize) -> String {
    // Compatibility decomposition splits accents off their base letters;
    // whatever is still non-ASCII afterwards is dropped.
    let folded: String = value.nfkd().filter(char::is_ascii).collect();
    let lowered = folded.trim().to_ascii_lowercase();
    let kept = RE_NON_SLUG.replace_all(&lowered, "");
    let dashed = RE_SLUG_SEPARATORS.replace_all(&kept, "-");
    let mut slug = dashed.trim_matches('-').to_string();

    if slug.len() > max_len {
        slug.truncate(max_len);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        FALLBACK_CLIENT_SLUG.to_string()
    } else {
        slug
    }
}

/// Only the digits of a phone number.
pub fn phone_digits(phone: &str) -> String {
    RE_NON_DIGIT.replace_all(phone, "").into_owned()
}

/// `Maria José`, `(11) 98888-7777` → `maria-jose-11988887777`.
pub fn client_folder_name(client_name: &str, phone: &str, max_len: usize) -> String {
    format!("{}-{}", slugify(client_name, max_len), phone_digits(phone))
}

/// `Aposentadoria por idade` → `Aposentadoria_por_idade`.
pub fn service_folder_name(service: &str, max_len: usize) -> String {
    if service.trim().is_empty() {
        return FALLBACK_SERVICE_NAME.to_string();
    }
    sanitize_filename(&service.replace(' ', "_"), max_len)
}
