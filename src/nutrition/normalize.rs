//! Brand and item-name normalization for cache keys and scoring.
//!
//! Brands are lower-cased, stripped of punctuation and legal suffixes, and
//! mapped through an alias table to one canonical key, so "McDonald's" and
//! "mcdonalds" land on the same cache entry. Item names keep their semantic
//! content; only case and whitespace are folded.

/// Lowercase alphanumeric characters only. Used for alias lookups where
/// spacing is unreliable ("chick-fil-a" vs "Chick fil A").
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Case/whitespace normalization for item names and descriptions. Semantic
/// content is preserved.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Known brand aliases, keyed by squashed form.
fn brand_alias(squashed: &str) -> Option<&'static str> {
    let canonical = match squashed {
        "mcdonald" | "mcdonalds" => "mcdonalds",
        "chickfila" | "chickfilamenu" | "chickfilachicken" => "chick fil a",
        "wendy" | "wendys" => "wendys",
        "domino" | "dominos" => "dominos",
        "papajohn" | "papajohns" => "papa johns",
        "bk" | "burgerking" => "burger king",
        "kfc" | "kentuckyfriedchicken" => "kfc",
        "arby" | "arbys" => "arbys",
        "tacobell" => "taco bell",
        "pandaexpress" => "panda express",
        "popeyes" | "popeyeslouisianakitchen" => "popeyes",
        "subway" => "subway",
        "jackinthebox" | "jackbox" => "jack in the box",
        "chipotle" | "chipotlemexicangrill" => "chipotle",
        _ => return None,
    };
    Some(canonical)
}

const LEGAL_SUFFIXES: &[&str] = &["inc", "llc", "co", "corp", "ltd"];

/// Canonical brand key: lowercase, punctuation stripped, legal suffixes
/// dropped, whitespace collapsed, aliases applied.
pub fn normalize_brand(raw: &str) -> String {
    let spaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        if LEGAL_SUFFIXES.contains(last) {
            tokens.pop();
        } else {
            break;
        }
    }
    let cleaned = tokens.join(" ");

    match brand_alias(&squash(&cleaned)) {
        Some(canonical) => canonical.to_string(),
        None => cleaned,
    }
}

/// Brands that mean "no real brand" and must not constrain lookups.
pub fn is_generic_brand(brand: &str) -> bool {
    matches!(
        squash(brand).as_str(),
        "" | "home" | "restaurant" | "casualdining" | "upscalerestaurant"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_folds_case_and_whitespace() {
        assert_eq!(normalize_name("  French   Fries "), "french fries");
        assert_eq!(normalize_name("Fries"), "fries");
    }

    #[test]
    fn brand_keeps_spaces_and_drops_punctuation() {
        assert_eq!(normalize_brand("Acme Burgers"), "acme burgers");
        assert_eq!(normalize_brand("Acme  Burgers, Inc."), "acme burgers");
        assert_eq!(normalize_brand("In-N-Out"), "in n out");
    }

    #[test]
    fn brand_aliases_map_to_canonical() {
        assert_eq!(normalize_brand("McDonald's"), "mcdonalds");
        assert_eq!(normalize_brand("McDonald"), "mcdonalds");
        assert_eq!(normalize_brand("BK"), "burger king");
        assert_eq!(normalize_brand("Kentucky Fried Chicken"), "kfc");
        assert_eq!(normalize_brand("Chick-fil-A"), "chick fil a");
    }

    #[test]
    fn generic_brands_are_detected() {
        assert!(is_generic_brand(""));
        assert!(is_generic_brand("Home"));
        assert!(is_generic_brand("casual dining"));
        assert!(is_generic_brand("Upscale Restaurant"));
        assert!(!is_generic_brand("Acme Burgers"));
    }
}
