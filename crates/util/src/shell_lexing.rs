//! # Shell-like Lexing
//!
//! Splits command lines such as `$EDITOR` or `$PAGER` values into program
//! arguments. Single and double quotes group words and backslash escapes the
//! next character, as a POSIX shell would; nothing is expanded.

/// Splits `input` into unquoted words.
///
/// # Example
/// ```rust
/// use lumen_util::split_command_line;
///
/// let words = split_command_line(r#"code --wait "--profile=My Work""#);
/// assert_eq!(words, vec!["code", "--wait", "--profile=My Work"]);
/// ```
pub fn split_command_line(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }
        words.push(parse_word(&mut chars));
    }

    words
}

/// Reads one word, stopping at unquoted whitespace. An unterminated quote
/// runs to the end of input.
fn parse_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut word = String::new();
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    while let Some(&c) = chars.peek() {
        if !in_single_quotes && !in_double_quotes && c.is_whitespace() {
            break;
        }
        chars.next();

        match c {
            '\'' if !in_double_quotes => in_single_quotes = !in_single_quotes,
            '"' if !in_single_quotes => in_double_quotes = !in_double_quotes,
            // Inside double quotes only a few characters are escapable.
            '\\' if in_double_quotes => match chars.peek() {
                Some(&next @ ('"' | '\\' | '$' | '`')) => {
                    chars.next();
                    word.push(next);
                }
                _ => word.push('\\'),
            },
            '\\' if !in_single_quotes => match chars.next() {
                Some(next) => word.push(next),
                None => word.push('\\'),
            },
            _ => word.push(c),
        }
    }

    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        assert_eq!(split_command_line("less -R"), vec!["less", "-R"]);
        assert_eq!(split_command_line("  vi  "), vec!["vi"]);
    }

    #[test]
    fn test_quoted_arguments() {
        assert_eq!(
            split_command_line(r#"code --wait "--profile=My Work""#),
            vec!["code", "--wait", "--profile=My Work"]
        );
        assert_eq!(split_command_line("'/opt/My Editor/bin/edit' -n"), vec!["/opt/My Editor/bin/edit", "-n"]);
    }

    #[test]
    fn test_escaped_characters() {
        assert_eq!(split_command_line(r"path\ with\ spaces x"), vec!["path with spaces", "x"]);
        assert_eq!(split_command_line(r#""say \"hi\"" 'a\b'"#), vec![r#"say "hi""#, r"a\b"]);
    }

    #[test]
    fn test_adjacent_quotes_join_one_word() {
        assert_eq!(split_command_line(r#"--name='a b'"c d""#), vec!["--name=a bc d"]);
        assert_eq!(split_command_line("''"), vec![""]);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert_eq!(split_command_line(""), Vec::<String>::new());
        assert_eq!(split_command_line("   \t  \n  "), Vec::<String>::new());
    }
}
