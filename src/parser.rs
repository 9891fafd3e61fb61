use std::rc::Rc;

use crate::{
    ast::{Block, Expression, InfixOperator, Module, PrefixOperator, Statement},
    span::Span,
    stack::ensure_sufficient_stack,
    tokenizer::{Token, TokenType},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrors(pub Vec<SyntaxError>);

impl ParseErrors {
    pub fn errors(&self) -> &[SyntaxError] {
        &self.0
    }
}

impl std::error::Error for ParseErrors {}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Found {} errors during parsing", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "- {}", error)?;
        }
        Ok(())
    }
}

impl From<SyntaxError> for ParseErrors {
    fn from(error: SyntaxError) -> Self {
        ParseErrors(vec![error])
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("at line {line}, column {column}: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, got {found}")]
    Expected {
        expected: TokenType,
        found: TokenType,
    },
    #[error("no prefix parse function for {0}")]
    NoPrefix(TokenType),
    #[error("could not parse {0:?} as number")]
    InvalidNumber(String),
    #[error("unrecognized input {0:?}")]
    Unrecognized(String),
}

type ParseResult<'a, T> = Result<(T, &'a [Token]), ParseErrors>;

/// Binding power, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Pipe,       // |
    Logical,    // && ||
    Equality,   // == !=
    Relational, // > >= < <=
    Sum,        // + -
    Product,    // * /
    Prefix,     // -x !x
    Call,       // f(x)
    Index,      // a[x]
}

type PrefixFn = for<'a> fn(&'a [Token]) -> ParseResult<'a, Expression>;
type InfixFn = for<'a> fn(Expression, &'a [Token]) -> ParseResult<'a, Expression>;

fn prefix_rule(token_type: TokenType) -> Option<PrefixFn> {
    let rule: PrefixFn = match token_type {
        TokenType::Identifier => identifier,
        TokenType::Number => number,
        TokenType::String => string,
        TokenType::True | TokenType::False => boolean,
        TokenType::Bang | TokenType::Minus => prefix_expression,
        TokenType::LeftParen => grouped_expression,
        TokenType::LeftBracket => array,
        TokenType::LeftBrace => hash,
        TokenType::If => if_expression,
        TokenType::Fn => function_literal,
        _ => return None,
    };
    Some(rule)
}

fn infix_rule(token_type: TokenType) -> Option<(Precedence, InfixFn)> {
    let precedence = match token_type {
        TokenType::Pipe => Precedence::Pipe,
        TokenType::And | TokenType::Or => Precedence::Logical,
        TokenType::EqualEqual | TokenType::BangEqual => Precedence::Equality,
        TokenType::Greater | TokenType::GreaterEqual | TokenType::Less | TokenType::LessEqual => {
            Precedence::Relational
        }
        TokenType::Plus | TokenType::Minus => Precedence::Sum,
        TokenType::Star | TokenType::Slash => Precedence::Product,
        TokenType::LeftParen => Precedence::Call,
        TokenType::LeftBracket => Precedence::Index,
        _ => return None,
    };
    let rule: InfixFn = match token_type {
        TokenType::LeftParen => call_expression,
        TokenType::LeftBracket => index_expression,
        _ => infix_expression,
    };
    Some((precedence, rule))
}

fn infix_operator(token_type: TokenType) -> Option<InfixOperator> {
    match token_type {
        TokenType::EqualEqual => Some(InfixOperator::Equal),
        TokenType::BangEqual => Some(InfixOperator::NotEqual),
        TokenType::Less => Some(InfixOperator::LessThan),
        TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
        TokenType::Greater => Some(InfixOperator::GreaterThan),
        TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
        TokenType::Plus => Some(InfixOperator::Plus),
        TokenType::Minus => Some(InfixOperator::Minus),
        TokenType::Star => Some(InfixOperator::Multiply),
        TokenType::Slash => Some(InfixOperator::Divide),
        TokenType::And => Some(InfixOperator::And),
        TokenType::Or => Some(InfixOperator::Or),
        TokenType::Pipe => Some(InfixOperator::Pipe),
        _ => None,
    }
}

/// Parses a whole token stream. Statement-level errors are collected and
/// parsing resumes at the next statement, so one call reports every
/// independent syntax error.
pub fn module(tokens: &[Token]) -> Result<Module, ParseErrors> {
    let mut statements = Vec::new();
    let mut errors = Vec::new();
    let mut tokens = tokens;

    while peek(tokens) != TokenType::Eof {
        match statement(tokens) {
            Ok((stmt, rest)) => {
                statements.push(stmt);
                tokens = rest;
            }
            Err(mut err) => {
                errors.append(&mut err.0);
                tokens = synchronize(tokens);
            }
        }
    }

    if !errors.is_empty() {
        tracing::debug!(count = errors.len(), "parse failed");
        return Err(ParseErrors(errors));
    }

    Ok(Module(statements))
}

/// Skips the statement starting at `tokens`: past the next `;` or unmatched
/// `}` at the same nesting level, or up to the next `let`/`return`.
fn synchronize(tokens: &[Token]) -> &[Token] {
    let mut depth = 0usize;
    let mut tokens = advance(tokens);
    while let Some(token) = tokens.first() {
        match token.token_type {
            TokenType::Eof => break,
            TokenType::LeftBrace => depth += 1,
            TokenType::RightBrace if depth == 0 => return advance(tokens),
            TokenType::RightBrace => depth -= 1,
            TokenType::Semicolon if depth == 0 => return advance(tokens),
            TokenType::Let | TokenType::Return if depth == 0 => return tokens,
            _ => {}
        }
        tokens = advance(tokens);
    }
    tokens
}

fn statement(tokens: &[Token]) -> ParseResult<'_, Statement> {
    match peek(tokens) {
        TokenType::Let => let_statement(tokens),
        TokenType::Return => return_statement(tokens),
        _ => expression_statement(tokens),
    }
}

fn let_statement(tokens: &[Token]) -> ParseResult<'_, Statement> {
    let span = span_of(tokens);
    let (name, tokens) = match_identifier(advance(tokens))?;
    let tokens = consume(tokens, TokenType::Assign)?;
    let (value, tokens) = expression(tokens, Precedence::Lowest)?;
    Ok((Statement::Let { name, value, span }, skip_terminator(tokens)))
}

fn return_statement(tokens: &[Token]) -> ParseResult<'_, Statement> {
    let span = span_of(tokens);
    let (value, tokens) = expression(advance(tokens), Precedence::Lowest)?;
    Ok((Statement::Return { value, span }, skip_terminator(tokens)))
}

fn expression_statement(tokens: &[Token]) -> ParseResult<'_, Statement> {
    let span = span_of(tokens);
    let (expression, tokens) = self::expression(tokens, Precedence::Lowest)?;
    Ok((
        Statement::Expression { expression, span },
        skip_terminator(tokens),
    ))
}

fn expression(tokens: &[Token], precedence: Precedence) -> ParseResult<'_, Expression> {
    ensure_sufficient_stack(|| precedence_climb(tokens, precedence))
}

fn precedence_climb(tokens: &[Token], precedence: Precedence) -> ParseResult<'_, Expression> {
    let token_type = peek(tokens);
    let Some(prefix) = prefix_rule(token_type) else {
        let kind = match tokens.first() {
            Some(token) if token_type == TokenType::Error => {
                ParseErrorKind::Unrecognized(token.lexeme.clone())
            }
            _ => ParseErrorKind::NoPrefix(token_type),
        };
        return Err(error_at(tokens, kind).into());
    };

    let (mut left, mut tokens) = prefix(tokens)?;

    while let Some((next, infix)) = infix_rule(peek(tokens)) {
        if next <= precedence {
            break;
        }
        (left, tokens) = infix(left, tokens)?;
    }

    Ok((left, tokens))
}

fn identifier(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (name, rest) = match_identifier(tokens)?;
    Ok((
        Expression::Identifier {
            name,
            span: span_of(tokens),
        },
        rest,
    ))
}

fn number(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let lexeme = tokens.first().map_or("", |t| t.lexeme.as_str());
    let value = lexeme
        .parse()
        .map_err(|_| error_at(tokens, ParseErrorKind::InvalidNumber(lexeme.to_string())))?;
    Ok((
        Expression::Number {
            value,
            span: span_of(tokens),
        },
        advance(tokens),
    ))
}

fn string(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let value = tokens.first().map(|t| t.lexeme.clone()).unwrap_or_default();
    Ok((
        Expression::String {
            value,
            span: span_of(tokens),
        },
        advance(tokens),
    ))
}

fn boolean(tokens: &[Token]) -> ParseResult<'_, Expression> {
    Ok((
        Expression::Boolean {
            value: peek(tokens) == TokenType::True,
            span: span_of(tokens),
        },
        advance(tokens),
    ))
}

fn prefix_expression(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let operator = match peek(tokens) {
        TokenType::Minus => PrefixOperator::Negate,
        _ => PrefixOperator::Not,
    };
    let (right, rest) = expression(advance(tokens), Precedence::Prefix)?;
    Ok((
        Expression::Prefix {
            operator,
            right: Box::new(right),
            span: span_of(tokens),
        },
        rest,
    ))
}

fn grouped_expression(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (expr, tokens) = expression(advance(tokens), Precedence::Lowest)?;
    let tokens = consume(tokens, TokenType::RightParen)?;
    Ok((expr, tokens))
}

fn array(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (elements, rest) = comma_separated(advance(tokens), TokenType::RightBracket, |tokens| {
        expression(tokens, Precedence::Lowest)
    })?;
    Ok((
        Expression::Array {
            elements,
            span: span_of(tokens),
        },
        rest,
    ))
}

fn hash(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (pairs, rest) = comma_separated(advance(tokens), TokenType::RightBrace, |tokens| {
        let (key, tokens) = expression(tokens, Precedence::Lowest)?;
        let tokens = consume(tokens, TokenType::Colon)?;
        let (value, tokens) = expression(tokens, Precedence::Lowest)?;
        Ok(((key, value), tokens))
    })?;
    Ok((
        Expression::Hash {
            pairs,
            span: span_of(tokens),
        },
        rest,
    ))
}

fn if_expression(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let span = span_of(tokens);
    let tokens = consume(advance(tokens), TokenType::LeftParen)?;
    let (condition, tokens) = expression(tokens, Precedence::Lowest)?;
    let tokens = consume(tokens, TokenType::RightParen)?;
    let (consequence, tokens) = block(tokens)?;

    let (alternative, tokens) = if peek(tokens) == TokenType::Else {
        let (alternative, tokens) = block(advance(tokens))?;
        (Some(alternative), tokens)
    } else {
        (None, tokens)
    };

    Ok((
        Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            span,
        },
        tokens,
    ))
}

fn function_literal(tokens: &[Token]) -> ParseResult<'_, Expression> {
    let span = span_of(tokens);
    let tokens = consume(advance(tokens), TokenType::LeftParen)?;
    let (params, tokens) = comma_separated(tokens, TokenType::RightParen, match_identifier)?;
    let (body, tokens) = block(tokens)?;
    Ok((
        Expression::Function {
            params,
            body: Rc::new(body),
            span,
        },
        tokens,
    ))
}

fn block(tokens: &[Token]) -> ParseResult<'_, Block> {
    let span = span_of(tokens);
    let mut tokens = consume(tokens, TokenType::LeftBrace)?;
    let mut statements = Vec::new();

    loop {
        match peek(tokens) {
            TokenType::RightBrace => {
                return Ok((Block { statements, span }, advance(tokens)));
            }
            TokenType::Eof => {
                return Err(error_at(
                    tokens,
                    ParseErrorKind::Expected {
                        expected: TokenType::RightBrace,
                        found: TokenType::Eof,
                    },
                )
                .into());
            }
            _ => {
                let (stmt, rest) = statement(tokens)?;
                statements.push(stmt);
                tokens = rest;
            }
        }
    }
}

fn infix_expression(left: Expression, tokens: &[Token]) -> ParseResult<'_, Expression> {
    let token_type = peek(tokens);
    let (precedence, _) = infix_rule(token_type).ok_or_else(|| {
        error_at(tokens, ParseErrorKind::NoPrefix(token_type))
    })?;
    let operator = infix_operator(token_type)
        .ok_or_else(|| error_at(tokens, ParseErrorKind::NoPrefix(token_type)))?;
    let (right, rest) = expression(advance(tokens), precedence)?;
    Ok((
        Expression::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: span_of(tokens),
        },
        rest,
    ))
}

fn call_expression(function: Expression, tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (args, rest) = comma_separated(advance(tokens), TokenType::RightParen, |tokens| {
        expression(tokens, Precedence::Lowest)
    })?;
    Ok((
        Expression::Call {
            function: Box::new(function),
            args,
            span: span_of(tokens),
        },
        rest,
    ))
}

fn index_expression(left: Expression, tokens: &[Token]) -> ParseResult<'_, Expression> {
    let (index, rest) = expression(advance(tokens), Precedence::Lowest)?;
    let rest = consume(rest, TokenType::RightBracket)?;
    Ok((
        Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
            span: span_of(tokens),
        },
        rest,
    ))
}

/// Items up to and including `close`. The list may be empty and may end with
/// a trailing comma.
fn comma_separated<'a, T>(
    tokens: &'a [Token],
    close: TokenType,
    item: impl Fn(&'a [Token]) -> ParseResult<'a, T>,
) -> ParseResult<'a, Vec<T>> {
    let mut items = Vec::new();
    let mut tokens = tokens;

    loop {
        if peek(tokens) == close {
            return Ok((items, advance(tokens)));
        }

        let (value, rest) = item(tokens)?;
        items.push(value);
        tokens = rest;

        match peek(tokens) {
            TokenType::Comma => tokens = advance(tokens),
            found if found == close => return Ok((items, advance(tokens))),
            found => {
                return Err(error_at(
                    tokens,
                    ParseErrorKind::Expected {
                        expected: close,
                        found,
                    },
                )
                .into())
            }
        }
    }
}

fn consume(tokens: &[Token], token_type: TokenType) -> Result<&[Token], SyntaxError> {
    match peek(tokens) {
        found if found == token_type => Ok(advance(tokens)),
        found => Err(error_at(
            tokens,
            ParseErrorKind::Expected {
                expected: token_type,
                found,
            },
        )),
    }
}

fn match_identifier(tokens: &[Token]) -> ParseResult<'_, String> {
    match tokens.first() {
        Some(token) if token.token_type == TokenType::Identifier => {
            Ok((token.lexeme.clone(), advance(tokens)))
        }
        _ => Err(error_at(
            tokens,
            ParseErrorKind::Expected {
                expected: TokenType::Identifier,
                found: peek(tokens),
            },
        )
        .into()),
    }
}

fn skip_terminator(tokens: &[Token]) -> &[Token] {
    if peek(tokens) == TokenType::Semicolon {
        advance(tokens)
    } else {
        tokens
    }
}

fn peek(tokens: &[Token]) -> TokenType {
    tokens.first().map_or(TokenType::Eof, |t| t.token_type)
}

fn advance(tokens: &[Token]) -> &[Token] {
    tokens.get(1..).unwrap_or_default()
}

fn span_of(tokens: &[Token]) -> Span {
    tokens.first().map(|t| t.span).unwrap_or_default()
}

fn error_at(tokens: &[Token], kind: ParseErrorKind) -> SyntaxError {
    let span = span_of(tokens);
    SyntaxError {
        line: span.line,
        column: span.column,
        kind,
    }
}
