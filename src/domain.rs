//! Decide whether a page host is in scope for a configured domain list.

/// Return the first configured domain equal to `current` or a parent of it.
///
/// `"docs.example.org"` matches `"example.org"`; `"notexample.org"` does not.
/// With overlapping entries the earliest one in the configured order wins.
pub fn match_domain<'a>(current: &str, domains: &'a [String]) -> Option<&'a str> {
    return domains
        .iter()
        .find(|domain| {
            return current == domain.as_str()
                || current
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| return prefix.ends_with('.'));
        })
        .map(String::as_str);
}
