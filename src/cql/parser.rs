//! Recursive-descent CQL parser: builds an [`Ast`] from a token stream,
//! validating each filter's arity as it goes.

use std::iter::Peekable;
use std::vec::IntoIter;

use crate::cql::ast::{Ast, CompareOp, LogicalOp};
use crate::cql::lexer::{tokenize, Token};
use crate::error::PipelineError;

/// Zero-arity keywords recognized bare, without surrounding parentheses.
const BARE_KEYWORDS: &[&str] = &["mate", "check", "stalemate", "wtm", "btm"];

type Tokens = Peekable<IntoIter<Token>>;

fn parse_atom(tokens: &mut Tokens) -> anyhow::Result<Ast> {
    match tokens.next() {
        Some(Token::LParen) => parse_form(tokens),
        Some(Token::Number(n)) => Ok(Ast::Number(n)),
        Some(Token::String(s)) => Ok(Ast::String(s)),
        Some(Token::Piece(set)) => Ok(Ast::Piece(set)),
        Some(Token::Square(set)) => Ok(Ast::Square(set)),
        Some(Token::Ident(name)) if BARE_KEYWORDS.contains(&name.as_str()) => {
            Ok(Ast::Filter(name, Vec::new()))
        }
        other => anyhow::bail!("expected an expression, found {other:?}"),
    }
}

fn expect_rparen(tokens: &mut Tokens) -> anyhow::Result<()> {
    match tokens.next() {
        Some(Token::RParen) => Ok(()),
        other => anyhow::bail!("expected ')', found {other:?}"),
    }
}

fn parse_n(tokens: &mut Tokens, n: usize) -> anyhow::Result<Vec<Ast>> {
    let args = (0..n).map(|_| parse_atom(tokens)).collect::<anyhow::Result<_>>()?;
    expect_rparen(tokens)?;
    Ok(args)
}

/// Parses the inside of a `(...)` form, having already consumed `(`.
fn parse_form(tokens: &mut Tokens) -> anyhow::Result<Ast> {
    if let Some(op) = match tokens.peek() {
        Some(Token::Lt) => Some(CompareOp::Lt),
        Some(Token::Gt) => Some(CompareOp::Gt),
        Some(Token::Le) => Some(CompareOp::Le),
        Some(Token::Ge) => Some(CompareOp::Ge),
        Some(Token::Eq) => Some(CompareOp::Eq),
        _ => None,
    } {
        tokens.next();
        let left = parse_atom(tokens)?;
        let right = parse_atom(tokens)?;
        expect_rparen(tokens)?;
        return Ok(Ast::Comparison(op, Box::new(left), Box::new(right)));
    }

    let Some(Token::Ident(name)) = tokens.next() else {
        anyhow::bail!("expected a filter name after '('");
    };
    match name.as_str() {
        "and" | "or" => {
            let mut children = Vec::new();
            loop {
                match tokens.peek() {
                    Some(Token::RParen) => {
                        tokens.next();
                        break;
                    }
                    _ => children.push(parse_atom(tokens)?),
                }
            }
            let op = if name == "and" { LogicalOp::And } else { LogicalOp::Or };
            Ok(Ast::Logical(op, children))
        }
        "not" => {
            let child = parse_atom(tokens)?;
            expect_rparen(tokens)?;
            Ok(Ast::Logical(LogicalOp::Not, vec![child]))
        }
        "flip" | "flipvertical" | "flipcolor" | "shift" | "shifthorizontal" | "shiftvertical" => {
            let child = parse_atom(tokens)?;
            expect_rparen(tokens)?;
            Ok(Ast::Filter(name, vec![child]))
        }
        "piece" | "attack" => Ok(Ast::Filter(name.clone(), parse_n(tokens, 2)?)),
        "count" | "material" | "result" | "player" | "year" | "elo" => {
            Ok(Ast::Filter(name.clone(), parse_n(tokens, 1)?))
        }
        "between" => Ok(Ast::Filter(name, parse_n(tokens, 2)?)),
        "pin" => Ok(Ast::Filter(name, parse_n(tokens, 3)?)),
        "ray" => {
            let Some(Token::Ident(direction)) = tokens.next() else {
                anyhow::bail!("expected a direction word as ray's first argument");
            };
            let mut args = vec![Ast::Direction(direction)];
            args.extend(parse_n(tokens, 2)?);
            Ok(Ast::Filter(name, args))
        }
        other if BARE_KEYWORDS.contains(&other) => {
            expect_rparen(tokens)?;
            Ok(Ast::Filter(other.to_string(), Vec::new()))
        }
        other => anyhow::bail!("unknown CQL filter '{other}'"),
    }
}

/// Parses a full query: zero or more top-level expressions, implicitly
/// conjoined if there is more than one.
///
/// # Errors
///
/// Returns [`PipelineError::CqlSyntax`] on any malformed token stream. The
/// query is treated as a program, so this is a fatal startup error.
pub fn parse(query: &str) -> anyhow::Result<Ast> {
    let tokens = tokenize(query).map_err(|_| PipelineError::CqlSyntax(0))?;
    let mut tokens: Tokens = tokens.into_iter().peekable();
    let mut top_level = Vec::new();
    while tokens.peek().is_some() {
        top_level.push(parse_atom(&mut tokens).map_err(|_| PipelineError::CqlSyntax(0))?);
    }
    match top_level.len() {
        0 => anyhow::bail!(PipelineError::CqlSyntax(0)),
        1 => Ok(top_level.into_iter().next().unwrap()),
        _ => Ok(Ast::Logical(LogicalOp::And, top_level)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_bare_zero_arity_keyword() {
        assert_eq!(parse("mate").unwrap(), Ast::Filter("mate".to_string(), vec![]));
    }

    #[test]
    fn parses_piece_filter() {
        let ast = parse("(piece K e4)").unwrap();
        let Ast::Filter(name, args) = ast else {
            panic!("expected a filter")
        };
        assert_eq!(name, "piece");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn implicit_top_level_conjunction() {
        let ast = parse("mate (piece Q f7)").unwrap();
        let Ast::Logical(LogicalOp::And, children) = ast else {
            panic!("expected an implicit conjunction")
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn scholars_mate_query_from_s2() {
        let ast = parse("(and mate (piece Q f7))").unwrap();
        let Ast::Logical(LogicalOp::And, children) = ast else {
            panic!("expected 'and'")
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn unknown_filter_is_a_syntax_error() {
        assert!(parse("(bogus x)").is_err());
    }

    #[test]
    fn parses_comparison_of_a_count_filter() {
        let ast = parse("(> (count Q) 1)").unwrap();
        let Ast::Comparison(CompareOp::Gt, left, right) = ast else {
            panic!("expected a comparison")
        };
        assert!(matches!(*left, Ast::Filter(ref name, _) if name == "count"));
        assert!(matches!(*right, Ast::Number(1)));
    }
}
