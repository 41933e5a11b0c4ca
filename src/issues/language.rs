//! Language tag validation for `lang` attributes and hreflang annotations

/// ISO 639-1 two-letter language codes
const ISO_639_1: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

/// Checks a language tag such as `en`, `en-GB`, `zh-Hant-TW` or `es-419`
///
/// The primary subtag must be a known ISO 639-1 code. A second subtag may be
/// a script (4 letters), a region (2 letters or 3 digits) or a variant; any
/// further subtags only need to be well-formed. `x-default` is accepted when
/// `allow_x_default` is set, for hreflang annotations.
pub fn is_valid_language(tag: &str, allow_x_default: bool) -> bool {
    let tag = tag.trim();

    if tag.eq_ignore_ascii_case("x-default") {
        return allow_x_default;
    }

    let mut subtags = tag.split(['-', '_']);

    let Some(primary) = subtags.next() else {
        return false;
    };

    if !ISO_639_1.contains(&primary.to_ascii_lowercase().as_str()) {
        return false;
    }

    subtags.all(|subtag| {
        !subtag.is_empty() && subtag.len() <= 8 && subtag.chars().all(|c| c.is_ascii_alphanumeric())
    }) && second_subtag_ok(tag)
}

fn second_subtag_ok(tag: &str) -> bool {
    let Some(second) = tag.split(['-', '_']).nth(1) else {
        return true;
    };

    let letters = second.chars().all(|c| c.is_ascii_alphabetic());
    let digits = second.chars().all(|c| c.is_ascii_digit());

    match second.len() {
        2 => letters,
        3 => digits,
        4 => letters,
        5..=8 => true,
        _ => false,
    }
}
