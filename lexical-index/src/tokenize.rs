/// Split text into lexical terms.
///
/// camelCase / PascalCase boundaries (`aB`) and `snake_case` underscores become
/// separators, everything is lowercased, any non-alphanumeric character
/// splits, and terms shorter than two characters are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len() + text.len() / 8);
    let mut prev_lower = false;
    for ch in text.chars() {
        if prev_lower && ch.is_uppercase() {
            spaced.push(' ');
        }
        prev_lower = ch.is_lowercase();
        spaced.push(ch);
    }

    spaced
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_camel_case_split() {
        assert_eq!(tokenize("authenticateUser"), vec!["authenticate", "user"]);
        assert_eq!(tokenize("HttpRequestHandler"), vec!["http", "request", "handler"]);
    }

    #[test]
    fn test_snake_case_split() {
        assert_eq!(tokenize("parse_config_file"), vec!["parse", "config", "file"]);
    }

    #[test]
    fn test_punctuation_and_short_tokens() {
        assert_eq!(
            tokenize("fn a(x: i32) -> Ok(b.value)"),
            vec!["fn", "i32", "ok", "value"]
        );
    }

    #[test]
    fn test_acronym_run_is_not_split() {
        assert_eq!(tokenize("parseHTTPResponse"), vec!["parse", "httpresponse"]);
    }

    #[test]
    fn test_paths() {
        assert_eq!(tokenize("src/auth/login.ts"), vec!["src", "auth", "login", "ts"]);
    }

    #[test]
    fn test_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  a . b ").is_empty());
    }
}
