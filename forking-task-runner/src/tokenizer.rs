use serde_json::Value;

/// Splits a user-supplied command-fragment string into argv tokens.
///
/// If `s` parses as a JSON array of strings, its elements are yielded verbatim. Otherwise `s`
/// is split on whitespace, except while inside a double-quoted region (quote characters are
/// retained in the output). Empty tokens are discarded.
pub fn tokenize(s: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
        if !items.is_empty() && items.iter().all(Value::is_string) {
            return items
                .into_iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
        }
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("-Xmx512m -Xms256m"), vec!["-Xmx512m", "-Xms256m"]);
    }

    #[test]
    fn retains_quotes_and_suppresses_splits_inside_them() {
        // Scenario 4.
        assert_eq!(
            tokenize(r#"-Dfoo=bar -Dbaz="a b c""#),
            vec!["-Dfoo=bar", r#"-Dbaz="a b c""#]
        );
    }

    #[test]
    fn json_array_form_is_yielded_verbatim() {
        // Scenario 4.
        assert_eq!(tokenize(r#"["x","y z"]"#), vec!["x", "y z"]);
    }

    #[test]
    fn collapses_repeated_whitespace_and_discards_empties() {
        assert_eq!(tokenize("  a   b  "), vec!["a", "b"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn round_trips_plain_argv_through_whitespace_join() {
        let argv = vec!["-Xmx1g".to_string(), "-verbose:gc".to_string()];
        assert_eq!(tokenize(&argv.join(" ")), argv);
    }

    #[test]
    fn round_trips_any_argv_through_json_encoding() {
        let argv = vec!["has space".to_string(), r#"has"quote"#.to_string()];
        let encoded = serde_json::to_string(&argv).unwrap();
        assert_eq!(tokenize(&encoded), argv);
    }
}
