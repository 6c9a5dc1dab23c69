/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// A slug is usable as a single storage path segment.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 120
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Intro to X"), "intro-to-x");
        assert_eq!(slugify("  Rust: the *good* parts!  "), "rust-the-good-parts");
        assert_eq!(slugify("Привет"), "");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("intro-to-x"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("Intro"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug(""));
    }
}
