use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Unrecognized input and end of file
    Error,
    Eof,

    // Literals
    Identifier,
    Number,
    String,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Pipe,
    And,
    Or,

    // Delimiters
    Semicolon,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Keywords
    Fn,
    Let,
    Return,
    True,
    False,
    If,
    Else,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenType::Error => "invalid token",
            TokenType::Eof => "end of input",
            TokenType::Identifier => "identifier",
            TokenType::Number => "number",
            TokenType::String => "string",
            TokenType::Assign => "=",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Bang => "!",
            TokenType::EqualEqual => "==",
            TokenType::BangEqual => "!=",
            TokenType::Greater => ">",
            TokenType::GreaterEqual => ">=",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::Pipe => "|",
            TokenType::And => "&&",
            TokenType::Or => "||",
            TokenType::Semicolon => ";",
            TokenType::Comma => ",",
            TokenType::Colon => ":",
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::LeftBracket => "[",
            TokenType::RightBracket => "]",
            TokenType::Fn => "fn",
            TokenType::Let => "let",
            TokenType::Return => "return",
            TokenType::True => "true",
            TokenType::False => "false",
            TokenType::If => "if",
            TokenType::Else => "else",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

/// Splits `source` into tokens. Never fails: input that matches no rule
/// becomes an [`TokenType::Error`] token and scanning carries on after it.
/// The last token is always [`TokenType::Eof`].
pub fn tokens(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut remaining = source;
    let mut span = Span::new(1, 1);

    loop {
        let rest = skip_trivia(remaining);
        span = span.advance(&remaining[..remaining.len() - rest.len()]);
        remaining = rest;

        let (token_type, rest) = token(remaining);
        let text = &remaining[..remaining.len() - rest.len()];
        let lexeme = match token_type {
            TokenType::String => &text[1..text.len() - 1],
            _ => text,
        };

        tokens.push(Token {
            token_type,
            lexeme: lexeme.to_string(),
            span,
        });

        if token_type == TokenType::Eof {
            break;
        }

        span = span.advance(text);
        remaining = rest;
    }

    tracing::trace!(count = tokens.len(), "tokenized source");
    tokens
}

fn token(source: &str) -> (TokenType, &str) {
    let Some(first) = source.chars().next() else {
        return (TokenType::Eof, source);
    };

    maximal(
        &[
            // operators
            assign,
            plus,
            minus,
            star,
            slash,
            bang,
            equal_equal,
            bang_equal,
            greater,
            greater_equal,
            less,
            less_equal,
            pipe,
            and,
            or,
            // delimiters
            semicolon,
            comma,
            colon,
            left_paren,
            right_paren,
            left_brace,
            right_brace,
            left_bracket,
            right_bracket,
            // keywords
            fn_,
            let_,
            return_,
            true_,
            false_,
            if_,
            else_,
            // literals
            identifier,
            string,
            number,
        ],
        source,
    )
    .unwrap_or((TokenType::Error, &source[first.len_utf8()..]))
}

/// Runs every rule and keeps the longest match; on a tie the earlier rule
/// wins, which is how keywords beat identifiers of the same length.
fn maximal<'a, T>(parsers: &[fn(&str) -> Option<(T, &str)>], source: &'a str) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn skip_trivia(mut source: &str) -> &str {
    while let Some((_, rest)) = maximal(&[whitespace, line_comment, block_comment], source) {
        source = rest;
    }
    source
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn line_comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn block_comment(source: &str) -> Option<((), &str)> {
    let body = source.strip_prefix("/*")?;
    match body.find("*/") {
        Some(end) => Some(((), &body[end + 2..])),
        None => Some(((), "")),
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            source.strip_prefix($word).map(|rest| ($token, rest))
        }
    };
}

match_literal! { assign, "=", TokenType::Assign }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { star, "*", TokenType::Star }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { bang, "!", TokenType::Bang }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { less, "<", TokenType::Less }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { pipe, "|", TokenType::Pipe }
match_literal! { and, "&&", TokenType::And }
match_literal! { or, "||", TokenType::Or }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { colon, ":", TokenType::Colon }
match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { left_bracket, "[", TokenType::LeftBracket }
match_literal! { right_bracket, "]", TokenType::RightBracket }
match_literal! { fn_, "fn", TokenType::Fn }
match_literal! { let_, "let", TokenType::Let }
match_literal! { return_, "return", TokenType::Return }
match_literal! { true_, "true", TokenType::True }
match_literal! { false_, "false", TokenType::False }
match_literal! { if_, "if", TokenType::If }
match_literal! { else_, "else", TokenType::Else }

fn identifier(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }

    let mut len = first.len_utf8()
        + chars
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    // `io!`, `option?`
    if matches!(source[len..].chars().next(), Some('!' | '?')) {
        len += 1;
    }

    Some((TokenType::Identifier, &source[len..]))
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    if !source.starts_with('"') {
        return None;
    }

    let mut chars = source.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((TokenType::String, &source[i + 1..])),
            '\\' => {
                chars.next();
            }
            _ => {}
        }
    }

    // unterminated: swallow the rest of the input as one bad token
    Some((TokenType::Error, ""))
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let mut len = digits(source);
    if source[len..].starts_with('.') {
        let fraction = digits(&source[len + 1..]);
        if len == 0 && fraction == 0 {
            return None;
        }
        len += 1 + fraction;
    }
    if len == 0 {
        return None;
    }

    let rest = &source[len..];
    if let Some(exponent) = rest.strip_prefix(['e', 'E']) {
        let sign = usize::from(exponent.starts_with(['+', '-']));
        let exponent_digits = digits(&exponent[sign..]);
        if exponent_digits > 0 {
            len += 1 + sign + exponent_digits;
        }
    }

    Some((TokenType::Number, &source[len..]))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(source: &str) -> Vec<TokenType> {
        tokens(source).into_iter().map(|t| t.token_type).collect()
    }

    fn lexemes(source: &str) -> Vec<String> {
        tokens(source).into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn test_tokens() {
        let source = "let x = 1;";
        let expected = vec![
            TokenType::Let,
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Number,
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(types(source), expected);
        assert_eq!(lexemes(source), vec!["let", "x", "=", "1", ";", ""]);
    }

    #[test]
    fn test_tokens_with_comments() {
        let source = "let x = 1; // comment\n/* block\n comment */ x";
        assert_eq!(
            types(source),
            vec![
                TokenType::Let,
                TokenType::Identifier,
                TokenType::Assign,
                TokenType::Number,
                TokenType::Semicolon,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
        let x = &tokens(source)[5];
        assert_eq!(x.span, Span::new(3, 13));
    }

    #[test]
    fn test_tokens_with_string() {
        let source = r#""foobar" "foo bar" "foo \"bar""#;
        assert_eq!(
            types(source),
            vec![
                TokenType::String,
                TokenType::String,
                TokenType::String,
                TokenType::Eof
            ]
        );
        assert_eq!(lexemes(source), vec!["foobar", "foo bar", r#"foo \"bar"#, ""]);
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(types(r#"x "abc"#), vec![TokenType::Identifier, TokenType::Error, TokenType::Eof]);
    }

    #[test]
    fn test_tokens_with_number() {
        assert_eq!(
            lexemes("123 1.23 1.4e5 .5 2E-3 1f 7e"),
            vec!["123", "1.23", "1.4e5", ".5", "2E-3", "1", "f", "7", "e", ""]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let source = "fn let return true false if else iffy _foo f12 io! option? 世界";
        assert_eq!(
            types(source),
            vec![
                TokenType::Fn,
                TokenType::Let,
                TokenType::Return,
                TokenType::True,
                TokenType::False,
                TokenType::If,
                TokenType::Else,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
        assert_eq!(tokens(source)[10].lexeme, "io!");
        assert_eq!(tokens(source)[11].lexeme, "option?");
        assert_eq!(tokens(source)[12].lexeme, "世界");
    }

    #[test]
    fn test_two_character_lookahead() {
        assert_eq!(
            types("=+-*/==!!=>>=<<=|&&||"),
            vec![
                TokenType::Assign,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::EqualEqual,
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Pipe,
                TokenType::And,
                TokenType::Or,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            types(";,:(){}[]"),
            vec![
                TokenType::Semicolon,
                TokenType::Comma,
                TokenType::Colon,
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_unrecognized_characters_keep_scanning() {
        let tokens = tokens("a & b # c");
        let summary: Vec<_> = tokens
            .iter()
            .map(|t| (t.token_type, t.lexeme.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TokenType::Identifier, "a"),
                (TokenType::Error, "&"),
                (TokenType::Identifier, "b"),
                (TokenType::Error, "#"),
                (TokenType::Identifier, "c"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let source = "let x = 1;\n  foo(\"bar\")";
        let spans: Vec<_> = tokens(source).into_iter().map(|t| t.span).collect();
        assert_eq!(
            spans,
            vec![
                Span::new(1, 1),
                Span::new(1, 5),
                Span::new(1, 7),
                Span::new(1, 9),
                Span::new(1, 10),
                Span::new(2, 3),
                Span::new(2, 6),
                Span::new(2, 7),
                Span::new(2, 12),
                Span::new(2, 13),
            ]
        );
    }
}
