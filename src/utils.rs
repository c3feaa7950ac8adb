/// Usernames are non-empty, at most 150 characters, and limited to ASCII
/// alphanumerics plus `@ . + - _`.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 150
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Splits the create-poll choice field on commas, trimming each entry and
/// discarding empties.
pub fn split_choices(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns raw user input into a substring ILIKE pattern, escaping the LIKE
/// metacharacters so the search stays a literal substring match.
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_usernames_with_allowed_symbols() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a.b+c@d-e_f"));
        assert!(is_valid_username(&"x".repeat(150)));
    }

    #[test]
    fn rejects_bad_usernames() {
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"x".repeat(151)));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("semi;colon"));
    }

    #[test]
    fn choices_are_trimmed_and_empties_dropped() {
        assert_eq!(
            split_choices(" Yes , No,,  Maybe  "),
            vec!["Yes", "No", "Maybe"]
        );
        assert!(split_choices("").is_empty());
        assert!(split_choices(" , ,").is_empty());
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(like_pattern("what"), "%what%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
    }
}
