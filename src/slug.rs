//! URL slugs for posts and pages.

const MAX_SLUG_LEN: usize = 80;

/// Lowercases `input`, keeps ASCII alphanumerics and collapses every other run of
/// characters into a single `-`. Never returns an empty string.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        // ASCII only, so byte truncation is a char boundary.
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// The `n`th candidate for `base`: `base`, `base-2`, `base-3`, ...
pub fn candidate(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_title() {
        assert_eq!(slugify("Welcome Back, Students!"), "welcome-back-students");
    }

    #[test]
    fn collapses_and_trims_separators() {
        assert_eq!(slugify("  --Sports   Day -- 2025--  "), "sports-day-2025");
    }

    #[test]
    fn non_ascii_is_dropped() {
        assert_eq!(slugify("Café Menü"), "caf-men");
        assert_eq!(slugify("日本語"), "untitled");
    }

    #[test]
    fn empty_becomes_untitled() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("!!!"), "untitled");
    }

    #[test]
    fn long_titles_are_truncated_cleanly() {
        let title = format!("{} {}", "a".repeat(79), "bbbb");
        let slug = slugify(&title);
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "a".repeat(79));
    }

    #[test]
    fn candidates() {
        assert_eq!(candidate("news", 1), "news");
        assert_eq!(candidate("news", 2), "news-2");
        assert_eq!(candidate("news", 10), "news-10");
    }
}
