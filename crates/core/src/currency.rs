//! ISO 4217 currency labels.

/// (numeric code, alpha-3 code)
const CURRENCIES: &[(u16, &str)] = &[
    (36, "AUD"),
    (124, "CAD"),
    (156, "CNY"),
    (203, "CZK"),
    (208, "DKK"),
    (348, "HUF"),
    (392, "JPY"),
    (398, "KZT"),
    (498, "MDL"),
    (578, "NOK"),
    (752, "SEK"),
    (756, "CHF"),
    (826, "GBP"),
    (840, "USD"),
    (933, "BYN"),
    (941, "RSD"),
    (946, "RON"),
    (949, "TRY"),
    (975, "BGN"),
    (978, "EUR"),
    (980, "UAH"),
    (981, "GEL"),
    (985, "PLN"),
];

/// Alpha-3 code for a numeric currency code.
pub fn currency_alpha(numeric: u16) -> Option<&'static str> {
    CURRENCIES
        .iter()
        .find(|(code, _)| *code == numeric)
        .map(|(_, alpha)| *alpha)
}

/// Numeric code for an alpha-3 currency code (case-insensitive).
pub fn currency_numeric(alpha: &str) -> Option<u16> {
    CURRENCIES
        .iter()
        .find(|(_, a)| a.eq_ignore_ascii_case(alpha.trim()))
        .map(|(code, _)| *code)
}

/// Display label: the alpha-3 code when known, otherwise the number.
pub fn currency_label(numeric: u16) -> String {
    currency_alpha(numeric)
        .map(str::to_string)
        .unwrap_or_else(|| numeric.to_string())
}
