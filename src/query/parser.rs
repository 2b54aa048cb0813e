//! Query parser for converting query strings to [`LexicalQuery`] trees.
//!
//! Grammar:
//!
//! ```text
//! Query   := OrExpr
//! OrExpr  := AndExpr ( "OR" AndExpr )*
//! AndExpr := Unary ( "AND"? Unary )*
//! Unary   := ( "NOT" | "-" ) Unary | Primary
//! Primary := Word | Word"*" | '"' phrase '"' | "(" OrExpr ")"
//! ```
//!
//! `NOT` binds tightest, then `AND` (explicit or implicit between adjacent
//! terms), then `OR`. Operators are recognized only in upper case, so the
//! lowercase words "or" and "not" remain searchable.
//!
//! A negation only narrows the positive terms it is combined with. An `OR`
//! alternative made of negations alone (`a OR NOT b`, `a OR (-b -c)`) would
//! match nothing, so it is rejected as a syntax error.
//!
//! A word the analyzer splits into several terms (`l'aviation`,
//! `air-traffic`) is searched as a phrase. With a trailing `*` the leading
//! terms become plain `AND` terms and only the last one is a prefix, so
//! `l'aviat*` does not require the terms to be adjacent.

use crate::analysis::Analyzer;
use crate::error::{FolioError, Result};
use crate::query::ast::{LexicalQuery, PhraseTerm};

/// Parses query strings using the index's analyzer for term normalization.
#[derive(Debug, Clone)]
pub struct QueryParser {
    analyzer: Analyzer,
}

impl QueryParser {
    /// Create a parser. The analyzer must be the one the index was built with.
    pub fn new(analyzer: Analyzer) -> Self {
        QueryParser { analyzer }
    }

    /// The analyzer used for query terms.
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Parse a query string.
    ///
    /// Empty input, or input whose words all analyze away, yields
    /// [`LexicalQuery::Empty`]. Unbalanced quotes or parentheses and operators
    /// without operands fail with [`FolioError::QuerySyntax`].
    pub fn parse(&self, query_str: &str) -> Result<LexicalQuery> {
        let tokens = lex(query_str)?;
        if tokens.is_empty() {
            return Ok(LexicalQuery::Empty);
        }

        let mut parser = TokenParser {
            tokens,
            cursor: 0,
            end_position: query_str.chars().count(),
            analyzer: &self.analyzer,
        };
        let query = parser.parse_or()?;

        if let Some(token) = parser.peek() {
            return Err(match token.kind {
                TokenKind::RParen => FolioError::query_syntax(token.position, "unbalanced ')'"),
                _ => FolioError::query_syntax(token.position, "unexpected token"),
            });
        }

        Ok(query)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Phrase(String),
    LParen,
    RParen,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
struct QueryToken {
    kind: TokenKind,
    /// Character offset in the query string.
    position: usize,
}

fn lex(input: &str) -> Result<Vec<QueryToken>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(QueryToken { kind: TokenKind::LParen, position: i });
                i += 1;
            }
            ')' => {
                tokens.push(QueryToken { kind: TokenKind::RParen, position: i });
                i += 1;
            }
            '"' => {
                let close = chars[i + 1..].iter().position(|&c| c == '"');
                let Some(len) = close else {
                    return Err(FolioError::query_syntax(i, "unbalanced '\"'"));
                };
                let phrase: String = chars[i + 1..i + 1 + len].iter().collect();
                tokens.push(QueryToken { kind: TokenKind::Phrase(phrase), position: i });
                i += len + 2;
            }
            '-' if chars.get(i + 1).is_some_and(|n| !n.is_whitespace() && *n != ')') => {
                tokens.push(QueryToken { kind: TokenKind::Not, position: i });
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && !matches!(chars[i], '(' | ')' | '"') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let kind = match word.as_str() {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    _ => TokenKind::Word(word),
                };
                tokens.push(QueryToken { kind, position: start });
            }
        }
    }

    Ok(tokens)
}

struct TokenParser<'a> {
    tokens: Vec<QueryToken>,
    cursor: usize,
    end_position: usize,
    analyzer: &'a Analyzer,
}

impl TokenParser<'_> {
    fn peek(&self) -> Option<&QueryToken> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<QueryToken> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Word(_) | TokenKind::Phrase(_) | TokenKind::LParen | TokenKind::Not)
        )
    }

    fn require_operand(&self, operator_position: usize, operator: &str) -> Result<()> {
        if self.starts_operand() {
            Ok(())
        } else {
            Err(FolioError::query_syntax(
                operator_position,
                format!("{operator} requires an operand"),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<LexicalQuery> {
        let mut starts = vec![self.current_position()];
        let mut operands = vec![self.parse_and()?];

        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Or {
                break;
            }
            let position = token.position;
            self.next();
            self.require_operand(position, "OR")?;
            starts.push(self.current_position());
            operands.push(self.parse_and()?);
        }

        if operands.len() > 1 {
            if let Some(i) = operands.iter().position(LexicalQuery::is_exclusion_only) {
                return Err(FolioError::query_syntax(
                    starts[i],
                    "an OR alternative cannot consist of negations only",
                ));
            }
        }

        Ok(LexicalQuery::or(operands))
    }

    fn current_position(&self) -> usize {
        self.peek().map_or(self.end_position, |t| t.position)
    }

    fn parse_and(&mut self) -> Result<LexicalQuery> {
        let mut operands = vec![self.parse_unary()?];

        loop {
            match self.peek() {
                Some(token) if token.kind == TokenKind::And => {
                    let position = token.position;
                    self.next();
                    self.require_operand(position, "AND")?;
                    operands.push(self.parse_unary()?);
                }
                Some(_) if self.starts_operand() => operands.push(self.parse_unary()?),
                _ => break,
            }
        }

        Ok(LexicalQuery::and(operands))
    }

    fn parse_unary(&mut self) -> Result<LexicalQuery> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Not {
                let position = token.position;
                self.next();
                self.require_operand(position, "NOT")?;
                return Ok(LexicalQuery::not(self.parse_unary()?));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<LexicalQuery> {
        let Some(token) = self.next() else {
            return Err(FolioError::query_syntax(self.end_position, "unexpected end of query"));
        };

        match token.kind {
            TokenKind::LParen => {
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
                    return Err(FolioError::query_syntax(token.position, "empty group"));
                }
                let inner = self.parse_or()?;
                match self.next() {
                    Some(QueryToken { kind: TokenKind::RParen, .. }) => Ok(inner),
                    _ => Err(FolioError::query_syntax(token.position, "unbalanced '('")),
                }
            }
            TokenKind::Word(word) => Ok(self.word_query(&word)),
            TokenKind::Phrase(text) => Ok(self.phrase_query(&text)),
            TokenKind::RParen => Err(FolioError::query_syntax(token.position, "unbalanced ')'")),
            TokenKind::And | TokenKind::Or => Err(FolioError::query_syntax(
                token.position,
                "operator without left operand",
            )),
            TokenKind::Not => Err(FolioError::query_syntax(token.position, "NOT requires an operand")),
        }
    }

    fn word_query(&self, word: &str) -> LexicalQuery {
        if let Some(stem) = word.strip_suffix('*') {
            let stem = stem.trim_end_matches('*');
            let mut terms = self.analyzer.terms(stem);
            let Some(last) = terms.pop() else {
                return LexicalQuery::Empty;
            };
            let mut operands: Vec<LexicalQuery> = terms.into_iter().map(LexicalQuery::Term).collect();
            operands.push(LexicalQuery::Prefix(last));
            return LexicalQuery::and(operands);
        }

        self.phrase_query(word)
    }

    /// Text analyzing to several terms becomes a phrase, one term a term query.
    fn phrase_query(&self, text: &str) -> LexicalQuery {
        let tokens = self.analyzer.analyze(text);
        match tokens.len() {
            0 => LexicalQuery::Empty,
            1 => LexicalQuery::Term(tokens[0].term.clone()),
            _ => {
                let base = tokens[0].position;
                LexicalQuery::Phrase(
                    tokens
                        .into_iter()
                        .map(|t| PhraseTerm {
                            offset: t.position - base,
                            term: t.term,
                        })
                        .collect(),
                )
            }
        }
    }
}
