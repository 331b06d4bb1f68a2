use std::sync::LazyLock;

use regex::Regex;

/// ISO 3166-1 alpha-2 shape: two uppercase ASCII letters, e.g. "US", "GB".
pub static COUNTRY_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("country code regex is valid"));
