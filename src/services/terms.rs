//! Weather condition → icon search term mapping.
//!
//! Pure functions, no I/O. Both always return a non-empty term.

/// Term used when nothing else matches.
pub const FALLBACK_TERM: &str = "weather";

/// Condition phrase → search term. Order matters for substring matching:
/// the first key contained in the condition wins.
const CONDITION_TERMS: &[(&str, &str)] = &[
    ("clear", "sunny"),
    ("sunny", "sunny"),
    ("partly cloudy", "partly cloudy"),
    ("cloudy", "cloudy"),
    ("overcast", "cloudy"),
    ("mist", "fog"),
    ("fog", "fog"),
    ("rain", "rain"),
    ("light rain", "rain"),
    ("heavy rain", "heavy rain"),
    ("drizzle", "drizzle"),
    ("thunderstorm", "thunderstorm"),
    ("snow", "snow"),
    ("light snow", "snow"),
    ("heavy snow", "heavy snow"),
    ("sleet", "sleet"),
    ("wind", "wind"),
    ("windy", "wind"),
    ("storm", "storm"),
    ("hail", "hail"),
];

/// Map a provider condition label to the primary icon search term.
///
/// Exact (case-insensitive) match first, then the first table key that is a
/// substring of the condition, then [`FALLBACK_TERM`].
pub fn map_condition_to_term(condition: &str) -> &'static str {
    let condition = condition.to_lowercase();

    if let Some((_, term)) = CONDITION_TERMS.iter().find(|(key, _)| *key == condition) {
        return term;
    }

    CONDITION_TERMS
        .iter()
        .find(|(key, _)| condition.contains(key))
        .map(|(_, term)| *term)
        .unwrap_or(FALLBACK_TERM)
}

/// Broader bucket used when a search on the primary term found nothing.
pub fn fallback_term(condition: &str) -> &'static str {
    let condition = condition.to_lowercase();
    let has = |needle: &str| condition.contains(needle);

    if has("rain") || has("shower") {
        "rain"
    } else if has("snow") || has("flurr") {
        "snow"
    } else if has("cloud") {
        "cloud"
    } else if has("sun") || has("clear") {
        "sun"
    } else {
        FALLBACK_TERM
    }
}
