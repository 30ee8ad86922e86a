use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Slugs for categories, which double as classifier labels and dataset folder names.
    /// Lowercase alphanumeric with single hyphens between segments.
    /// - Valid: "theft", "vandalism", "illegal-parking"
    /// - Invalid: "-theft", "theft-", "car--theft", "Theft", "car_theft", "../x"
    pub static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();

    /// Usernames start with a letter or underscore, then alphanumerics and underscores
    /// - Valid: "juan_dela_cruz", "user123", "_admin", "JuanDC"
    /// - Invalid: "123user", "-user", "user-name", "user name"
    pub static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();

    /// Hex colors used for map markers, "#rgb" or "#rrggbb"
    pub static ref COLOR_REGEX: Regex = Regex::new(r"^#(?:[0-9a-fA-F]{3}){1,2}$").unwrap();
}

/// Longest slug accepted for categories and dataset labels
pub const MAX_SLUG_LENGTH: usize = 64;

/// Derive a slug from a display name: "Illegal Parking!" -> "illegal-parking"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_LENGTH);
    slug.trim_end_matches('-').to_string()
}

pub fn is_valid_slug(value: &str) -> bool {
    value.len() <= MAX_SLUG_LENGTH && SLUG_REGEX.is_match(value)
}

pub fn is_valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_longitude(lng: f64) -> bool {
    lng.is_finite() && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_regex_valid() {
        assert!(SLUG_REGEX.is_match("theft"));
        assert!(SLUG_REGEX.is_match("illegal-parking"));
        assert!(SLUG_REGEX.is_match("a1-b2-c3"));
    }

    #[test]
    fn test_slug_regex_invalid() {
        assert!(!SLUG_REGEX.is_match("-theft")); // starts with hyphen
        assert!(!SLUG_REGEX.is_match("theft-")); // ends with hyphen
        assert!(!SLUG_REGEX.is_match("car--theft")); // double hyphen
        assert!(!SLUG_REGEX.is_match("Theft")); // uppercase
        assert!(!SLUG_REGEX.is_match("car_theft")); // underscore
        assert!(!SLUG_REGEX.is_match("..")); // traversal
        assert!(!SLUG_REGEX.is_match("a/b")); // separator
        assert!(!SLUG_REGEX.is_match("")); // empty
    }

    #[test]
    fn test_username_regex() {
        assert!(USERNAME_REGEX.is_match("juan_dela_cruz"));
        assert!(USERNAME_REGEX.is_match("_admin"));
        assert!(!USERNAME_REGEX.is_match("123user"));
        assert!(!USERNAME_REGEX.is_match("user name"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Illegal Parking!"), "illegal-parking");
        assert_eq!(slugify("  Theft  "), "theft");
        assert_eq!(slugify("Drug--Related / Activity"), "drug-related-activity");
        assert_eq!(slugify("!!!"), "");
        assert!(is_valid_slug(&slugify("Noise Complaint 2")));
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(is_valid_latitude(14.5995));
        assert!(is_valid_longitude(120.9842));
        assert!(!is_valid_latitude(90.5));
        assert!(!is_valid_longitude(-181.0));
        assert!(!is_valid_latitude(f64::NAN));
    }

    #[test]
    fn test_color_regex() {
        assert!(COLOR_REGEX.is_match("#ff0000"));
        assert!(COLOR_REGEX.is_match("#F00"));
        assert!(!COLOR_REGEX.is_match("red"));
        assert!(!COLOR_REGEX.is_match("#ff00"));
    }
}
