//! Formula tokenizer and argument splitter.
//!
//! The tokenizer works on a formula body (the text after `=`). It never
//! fails: an unterminated quote simply swallows the rest of the input.

/// Characters that always form a token of their own outside quotes.
const PUNCTUATION: [char; 7] = ['(', ')', ',', '+', '-', '*', '/'];

fn flush(tokens: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
    current.clear();
}

/// Split a formula body into tokens.
///
/// Quotes are kept as part of the token they delimit, so `"a, b"` stays one
/// token including its quote characters.
pub fn tokenize(formula: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in formula.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if !in_quotes && PUNCTUATION.contains(&ch) {
            flush(&mut tokens, &mut current);
            tokens.push(ch.to_string());
        } else if !in_quotes && ch == ' ' {
            flush(&mut tokens, &mut current);
        } else {
            current.push(ch);
        }
    }
    flush(&mut tokens, &mut current);

    tokens
}

/// Group the token run of a call, `( a , f ( b , c ) )`, into its top-level
/// arguments. The first and last tokens are taken to be the call's own
/// parentheses. Each argument is its tokens joined by single spaces.
pub fn split_arguments(tokens: &[String]) -> Vec<String> {
    let inner = match tokens.len() {
        0..=2 => &[][..],
        len => &tokens[1..len - 1],
    };

    let mut args = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut depth = 0i32;

    for token in inner {
        match token.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            _ => {}
        }

        if token == "," && depth == 0 {
            args.push(current.join(" ").trim().to_string());
            current.clear();
        } else {
            current.push(token);
        }
    }

    if !current.is_empty() {
        args.push(current.join(" ").trim().to_string());
    }

    args
}

/// Raw tokens of a call with its parentheses and commas removed.
///
/// Used by builtins that read their arguments token by token instead of
/// through [`split_arguments`].
pub fn bare_tokens(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !matches!(t.as_str(), "(" | ")" | ","))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_punctuation_and_spaces() {
        assert_eq!(tokenize("2+3*4"), strings(&["2", "+", "3", "*", "4"]));
        assert_eq!(
            tokenize("OSC(\"sine\", 440, 0, 1)"),
            strings(&["OSC", "(", "\"sine\"", ",", "440", ",", "0", ",", "1", ")"])
        );
        assert_eq!(tokenize("  A1   -  B2 "), strings(&["A1", "-", "B2"]));
    }

    #[test]
    fn test_tokenize_keeps_quoted_punctuation() {
        assert_eq!(
            tokenize("CONCAT(\", \", A1)"),
            strings(&["CONCAT", "(", "\", \"", ",", "A1", ")"])
        );
    }

    #[test]
    fn test_tokenize_unterminated_quote_runs_to_end() {
        assert_eq!(tokenize("JS(\"a(b"), strings(&["JS", "(", "\"a(b"]));
    }

    #[test]
    fn test_tokenize_splits_leading_minus() {
        assert_eq!(tokenize("-3"), strings(&["-", "3"]));
        assert_eq!(tokenize("1.5"), strings(&["1.5"]));
        assert_eq!(tokenize("A1:A4"), strings(&["A1:A4"]));
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_split_arguments_respects_nesting() {
        let tokens = tokenize("(A1, OSC(\"sine\", 440, 0, 1), \"x\")");
        assert_eq!(
            split_arguments(&tokens),
            strings(&["A1", "OSC ( \"sine\" , 440 , 0 , 1 )", "\"x\""])
        );
    }

    #[test]
    fn test_split_arguments_empty_call() {
        assert!(split_arguments(&tokenize("()")).is_empty());
        assert!(split_arguments(&[]).is_empty());
    }

    #[test]
    fn test_split_arguments_joins_multi_token_argument() {
        let tokens = tokenize("(-3, A1 * 2)");
        assert_eq!(split_arguments(&tokens), strings(&["- 3", "A1 * 2"]));
    }

    #[test]
    fn test_bare_tokens() {
        let tokens = tokenize("(440, 0.5)");
        assert_eq!(bare_tokens(&tokens), strings(&["440", "0.5"]));
    }
}
