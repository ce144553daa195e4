use super::{Matcher, PatternError, PatternSpec};
use crate::files::FileRef;

const KIND_FILE: &str = "@file";
const KIND_DIR: &str = "@dir";

/// Logical filter expression over wildcard operands
///
/// Grammar (`!` binds tighter than `&`, which binds tighter than `|`):
///
/// ```text
/// expr    := and ('|' and)*
/// and     := unary ('&' unary)*
/// unary   := '!' unary | primary
/// primary := '(' expr ')' | operand
/// ```
///
/// Operands are wildcard patterns matched against the full file name, or
/// the kind tests `@file` / `@dir`.
#[derive(Debug, Clone)]
pub struct FilterExpr {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Pattern(Matcher),
    IsFile,
    IsDir,
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Not,
    And,
    Or,
    Open,
    Close,
    Operand(String),
}

impl FilterExpr {
    pub fn parse(expr: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        let tokens = tokenize(expr);
        if tokens.is_empty() {
            return Err(malformed(expr, "expression is empty"));
        }

        let mut parser = Parser {
            expr,
            tokens: &tokens,
            pos: 0,
            case_sensitive,
        };
        let root = parser.parse_or()?;
        if parser.pos != tokens.len() {
            return Err(malformed(expr, "unexpected trailing tokens"));
        }

        Ok(Self { root })
    }

    pub fn accepts(&self, file: &FileRef) -> bool {
        eval(&self.root, &file.name, file.is_dir())
    }

    /// Evaluate against a bare name, treating it as a regular file
    pub fn matches_name(&self, name: &str) -> bool {
        eval(&self.root, name, false)
    }
}

fn eval(node: &Node, name: &str, is_dir: bool) -> bool {
    match node {
        Node::Pattern(matcher) => matcher.test(name),
        Node::IsFile => !is_dir,
        Node::IsDir => is_dir,
        Node::Not(inner) => !eval(inner, name, is_dir),
        Node::And(left, right) => eval(left, name, is_dir) && eval(right, name, is_dir),
        Node::Or(left, right) => eval(left, name, is_dir) || eval(right, name, is_dir),
    }
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut operand = String::new();

    let flush = |operand: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = operand.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Operand(trimmed.to_string()));
        }
        operand.clear();
    };

    for ch in expr.chars() {
        let op = match ch {
            '!' => Token::Not,
            '&' => Token::And,
            '|' => Token::Or,
            '(' => Token::Open,
            ')' => Token::Close,
            _ => {
                operand.push(ch);
                continue;
            }
        };
        flush(&mut operand, &mut tokens);
        tokens.push(op);
    }
    flush(&mut operand, &mut tokens);

    tokens
}

struct Parser<'a> {
    expr: &'a str,
    tokens: &'a [Token],
    pos: usize,
    case_sensitive: bool,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Node, PatternError> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node, PatternError> {
        let mut node = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            node = Node::And(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node, PatternError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, PatternError> {
        let expr = self.expr;
        match self.next().cloned() {
            Some(Token::Open) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(node),
                    _ => Err(malformed(expr, "unbalanced parentheses")),
                }
            }
            Some(Token::Operand(text)) => self.operand(&text),
            Some(Token::Close) => Err(malformed(expr, "unbalanced parentheses")),
            Some(_) => Err(malformed(expr, "operator without operand")),
            None => Err(malformed(expr, "unexpected end of expression")),
        }
    }

    fn operand(&self, text: &str) -> Result<Node, PatternError> {
        if text.eq_ignore_ascii_case(KIND_FILE) {
            return Ok(Node::IsFile);
        }
        if text.eq_ignore_ascii_case(KIND_DIR) {
            return Ok(Node::IsDir);
        }

        let spec = PatternSpec::builder()
            .text(text)
            .case_sensitive(self.case_sensitive)
            .include_suffix(true)
            .build();
        Ok(Node::Pattern(Matcher::compile(&spec)?))
    }
}

fn malformed(expr: &str, reason: &str) -> PatternError {
    PatternError::MalformedExpression {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}
