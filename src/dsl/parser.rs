//! Parser for filter text.
//!
//! Grammar (in rough EBNF):
//!
//! filter     = or_expr
//! or_expr    = and_expr ("|" and_expr)*
//! and_expr   = unary_expr ("&" unary_expr)*
//! unary_expr = "!" unary_expr | primary
//! primary    = "(" filter ")" | "true" | "false" | condition
//! condition  = IDENT operator operand
//! operator   = "=" | "!=" | "<" | "<=" | ">" | ">=" | IDENT
//! operand    = STRING | NUMBER | IDENT

use super::ast::{FieldCondition, Operand, OperandKind, Operator, Pattern, Predicate};
use super::custom::CustomRegistry;
use super::error::PredicateError;
use super::lexer::{Token, tokenize};

/// Parser state.
struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    customs: &'r CustomRegistry,
}

impl<'r> Parser<'r> {
    fn new(tokens: Vec<Token>, customs: &'r CustomRegistry) -> Self {
        Parser {
            tokens,
            pos: 0,
            customs,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(format!("expected {:?}, got {:?}", expected, tok))
        }
    }

    /// Parse the top-level filter expression.
    fn parse_filter(&mut self) -> Result<Predicate, String> {
        self.parse_or_expr()
    }

    /// Parse OR expression: and_expr ("|" and_expr)*
    fn parse_or_expr(&mut self) -> Result<Predicate, String> {
        let mut terms = vec![self.parse_and_expr()?];

        while matches!(self.peek(), Token::Or) {
            self.advance(); // consume |
            terms.push(self.parse_and_expr()?);
        }

        Ok(collapse(terms, Predicate::Or))
    }

    /// Parse AND expression: unary_expr ("&" unary_expr)*
    fn parse_and_expr(&mut self) -> Result<Predicate, String> {
        let mut terms = vec![self.parse_unary_expr()?];

        while matches!(self.peek(), Token::And) {
            self.advance(); // consume &
            terms.push(self.parse_unary_expr()?);
        }

        Ok(collapse(terms, Predicate::And))
    }

    /// Parse unary expression: "!" unary_expr | primary
    fn parse_unary_expr(&mut self) -> Result<Predicate, String> {
        if matches!(self.peek(), Token::Not) {
            self.advance(); // consume !
            let inner = self.parse_unary_expr()?;
            Ok(Predicate::Not(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    /// Parse primary expression: "(" filter ")" | "true" | "false" | condition
    fn parse_primary(&mut self) -> Result<Predicate, String> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance(); // consume (
                let inner = self.parse_filter()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(word) if word == "true" => {
                self.advance();
                Ok(Predicate::And(Vec::new()))
            }
            Token::Ident(word) if word == "false" => {
                self.advance();
                Ok(Predicate::Or(Vec::new()))
            }
            Token::Ident(_) | Token::Str(_) => self.parse_condition(),
            other => Err(format!("unexpected token: {:?}", other)),
        }
    }

    /// Parse condition: (IDENT | STRING) operator operand
    fn parse_condition(&mut self) -> Result<Predicate, String> {
        let field = match self.advance() {
            Token::Ident(name) | Token::Str(name) => name,
            other => return Err(format!("expected field name, got {:?}", other)),
        };

        let op = match self.advance() {
            Token::Eq => Operator::Eq,
            Token::Ne => Operator::Ne,
            Token::Lt => Operator::Lt,
            Token::Le => Operator::Le,
            Token::Gt => Operator::Gt,
            Token::Ge => Operator::Ge,
            Token::Ident(name) => name.parse::<Operator>().map_err(|e| e.to_string())?,
            other => {
                return Err(format!(
                    "expected operator after '{}', got {:?}",
                    field, other
                ));
            }
        };

        let operand = self.parse_operand(&field, op)?;
        Ok(Predicate::Condition(FieldCondition { field, op, operand }))
    }

    /// Parse the operand and coerce it to what the operator expects.
    fn parse_operand(&mut self, field: &str, op: Operator) -> Result<Operand, String> {
        let token = self.advance();
        let wrong = |token: &Token| {
            format!(
                "operator '{}' on '{}' expects {} operand, got {:?}",
                op,
                field,
                op.operand_kind(),
                token
            )
        };

        match (op.operand_kind(), &token) {
            (OperandKind::Text | OperandKind::Date, Token::Str(s) | Token::Number(s)) => {
                Ok(Operand::Text(s.clone()))
            }
            (OperandKind::Pattern, Token::Str(s)) => Ok(Operand::Pattern(Pattern::new(s.clone()))),
            (OperandKind::Number, Token::Number(raw)) => raw
                .parse::<f64>()
                .map(Operand::Number)
                .map_err(|_| wrong(&token)),
            (OperandKind::Bool, Token::Ident(word)) if word == "true" || word == "false" => {
                Ok(Operand::Bool(word == "true"))
            }
            (OperandKind::Custom, Token::Ident(name) | Token::Str(name)) => self
                .customs
                .get(name)
                .cloned()
                .map(Operand::Custom)
                .ok_or_else(|| PredicateError::UnknownCustom(name.clone()).to_string()),
            _ => Err(wrong(&token)),
        }
    }
}

/// One term stays bare; several become a combinator node.
fn collapse(mut terms: Vec<Predicate>, combine: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if terms.len() == 1 {
        terms.pop().unwrap_or(Predicate::And(Vec::new()))
    } else {
        combine(terms)
    }
}

/// Parse filter text into a predicate, without custom functions.
pub fn parse_filter(input: &str) -> Result<Predicate, PredicateError> {
    parse_filter_with(input, &CustomRegistry::default())
}

/// Parse filter text, resolving `custom` operands through `customs`.
pub fn parse_filter_with(
    input: &str,
    customs: &CustomRegistry,
) -> Result<Predicate, PredicateError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Predicate::And(Vec::new()));
    }

    let tokens = tokenize(input).map_err(PredicateError::Syntax)?;
    let mut parser = Parser::new(tokens, customs);
    let predicate = parser.parse_filter().map_err(PredicateError::Syntax)?;

    // Ensure we consumed all tokens
    if !matches!(parser.peek(), Token::Eof) {
        return Err(PredicateError::Syntax(format!(
            "unexpected token after expression: {:?}",
            parser.peek()
        )));
    }

    Ok(predicate)
}
