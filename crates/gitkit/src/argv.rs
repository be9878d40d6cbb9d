//! Shell-style splitting of a command line into an argument vector.
//!
//! Only word splitting and quoting: no expansion, no pipes, no
//! redirection. Single quotes are literal; inside double quotes a
//! backslash escapes `"`, `\`, `$` and `` ` ``; outside quotes a backslash
//! escapes any character. A `#` at the start of a word begins a comment.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

/// Split `line` into words.
///
/// ```rust
/// let args = gitkit::split_command_line(r#"config user.name "Test User""#).unwrap();
/// assert_eq!(args, vec!["config", "user.name", "Test User"]);
/// ```
pub fn split(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.peek() {
            None | Some('#') => break,
            Some(_) => words.push(read_word(&mut chars)?),
        }
    }

    Ok(words)
}

fn read_word(chars: &mut Peekable<Chars<'_>>) -> Result<String> {
    let mut word = String::new();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            break;
        }
        chars.next();
        match ch {
            '\'' => read_single_quoted(chars, &mut word)?,
            '"' => read_double_quoted(chars, &mut word)?,
            '\\' => match chars.next() {
                Some(next) => word.push(next),
                None => return Err(Error::usage("unexpected end of line after '\\'")),
            },
            _ => word.push(ch),
        }
    }

    Ok(word)
}

fn read_single_quoted(chars: &mut Peekable<Chars<'_>>, word: &mut String) -> Result<()> {
    for ch in chars.by_ref() {
        if ch == '\'' {
            return Ok(());
        }
        word.push(ch);
    }
    Err(Error::usage("unterminated single quote"))
}

fn read_double_quoted(chars: &mut Peekable<Chars<'_>>, word: &mut String) -> Result<()> {
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => word.push(next),
                Some(next) => {
                    word.push('\\');
                    word.push(next);
                }
                None => break,
            },
            _ => word.push(ch),
        }
    }
    Err(Error::usage("unterminated double quote"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_words() {
        assert_eq!(split("  ls   -a  dir1 ").unwrap(), vec!["ls", "-a", "dir1"]);
        assert!(split("").unwrap().is_empty());
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quotes() {
        assert_eq!(
            split(r#"config user.name "Test User""#).unwrap(),
            vec!["config", "user.name", "Test User"]
        );
        assert_eq!(split("write f 'a \"b\"'").unwrap(), vec!["write", "f", "a \"b\""]);
        assert_eq!(split(r#"x "a\"b\n""#).unwrap(), vec!["x", "a\"b\\n"]);
        // Adjacent quoted parts join into one word
        assert_eq!(split(r#"x ab"c d"'e'"#).unwrap(), vec!["x", "abc de"]);
        assert_eq!(split("x ''").unwrap(), vec!["x", ""]);
    }

    #[test]
    fn test_escapes_outside_quotes() {
        assert_eq!(split(r#"x \"q\" a\ b"#).unwrap(), vec!["x", "\"q\"", "a b"]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(split("pwd # where am I").unwrap(), vec!["pwd"]);
        assert_eq!(split("write f a#b").unwrap(), vec!["write", "f", "a#b"]);
        assert!(split("# only a comment").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated() {
        assert!(matches!(split("x 'open"), Err(Error::Usage(_))));
        assert!(matches!(split("x \"open"), Err(Error::Usage(_))));
        assert!(matches!(split("x \\"), Err(Error::Usage(_))));
    }
}
