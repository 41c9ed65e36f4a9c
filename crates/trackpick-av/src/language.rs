//! Language code helpers.
//!
//! mkvmerge reports ISO 639-2 codes (`jpn`, `fre`) in `language` and BCP 47
//! tags (`ja`, `fr-CA`) in `language_ietf`, while users tend to type
//! whichever form they remember. Matching is done on a canonical key so that
//! every spelling of the same language compares equal.

/// Known aliases: canonical ISO 639-2/B code, the other codes for the same
/// language, and an English display name.
const LANGUAGES: &[(&str, &[&str], &str)] = &[
    ("jpn", &["ja"], "Japanese"),
    ("fre", &["fr", "fra"], "French"),
    ("eng", &["en"], "English"),
    ("ger", &["de", "deu"], "German"),
    ("spa", &["es"], "Spanish"),
    ("ita", &["it"], "Italian"),
    ("por", &["pt"], "Portuguese"),
    ("rus", &["ru"], "Russian"),
    ("chi", &["zh", "zho"], "Chinese"),
    ("kor", &["ko"], "Korean"),
    ("dut", &["nl", "nld"], "Dutch"),
    ("pol", &["pl"], "Polish"),
    ("swe", &["sv"], "Swedish"),
    ("ara", &["ar"], "Arabic"),
    ("hin", &["hi"], "Hindi"),
    ("tha", &["th"], "Thai"),
    ("vie", &["vi"], "Vietnamese"),
    ("tur", &["tr"], "Turkish"),
];

/// Code used for tracks without a language tag.
pub const UNDETERMINED: &str = "und";

/// Canonical form of a language code.
///
/// Lower-cases the input, drops any BCP 47 region or script suffix (`fr-CA`
/// becomes `fr`) and maps known aliases to their ISO 639-2/B code. Unknown
/// codes are returned lower-cased. Empty input maps to [`UNDETERMINED`].
///
/// ```
/// use trackpick_av::language::canonical;
///
/// assert_eq!(canonical("ja"), "jpn");
/// assert_eq!(canonical("FRA"), "fre");
/// assert_eq!(canonical("fr-CA"), "fre");
/// assert_eq!(canonical("tlh"), "tlh");
/// ```
pub fn canonical(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase();
    let primary = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string();

    if primary.is_empty() {
        return UNDETERMINED.to_string();
    }

    for (canon, aliases, _) in LANGUAGES {
        if primary == *canon || aliases.contains(&primary.as_str()) {
            return canon.to_string();
        }
    }

    primary
}

/// Whether two language codes name the same language.
pub fn same_language(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}

/// English display name for a code, falling back to the upper-cased code.
pub fn display_name(code: &str) -> String {
    let canon = canonical(code);
    if canon == UNDETERMINED {
        return "Undetermined".to_string();
    }
    LANGUAGES
        .iter()
        .find(|(c, _, _)| *c == canon)
        .map(|(_, _, name)| name.to_string())
        .unwrap_or_else(|| code.trim().to_uppercase())
}

/// Repair a track name that was decoded as latin-1 although the bytes were
/// UTF-8 (`FranÃ§ais` instead of `Français`).
///
/// The name is returned unchanged when it contains characters outside
/// latin-1 or when re-decoding the bytes as UTF-8 fails.
pub fn repair_track_name(name: &str) -> String {
    if name.is_ascii() {
        return name.to_string();
    }

    let mut bytes = Vec::with_capacity(name.len());
    for ch in name.chars() {
        let cp = ch as u32;
        if cp > 0xFF {
            return name.to_string();
        }
        bytes.push(cp as u8);
    }

    match String::from_utf8(bytes) {
        Ok(repaired) => repaired,
        Err(_) => name.to_string(),
    }
}
