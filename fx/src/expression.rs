//! Arithmetic expression evaluation for the converter input.
//!
//! Grammar, after normalization:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! number := digits ['.' digits] | '.' digits
//! ```

use crate::error::EvaluationError;
use crate::normalize::normalize_expression;

/// Evaluate a user-entered arithmetic string.
///
/// The input is normalized first (decimal commas, non-ASCII digits,
/// percent signs). Empty, malformed, and non-finite results are errors.
pub fn evaluate(input: &str) -> Result<f64, EvaluationError> {
    let normalized = normalize_expression(input);
    let mut parser = Parser::new(&normalized);

    if parser.at_end() {
        return Err(EvaluationError::Empty);
    }

    let value = parser.expr()?;
    parser.skip_whitespace();

    if let Some((position, found)) = parser.peek_indexed() {
        return Err(if found == ')' {
            EvaluationError::UnbalancedParenthesis(position)
        } else {
            EvaluationError::UnexpectedCharacter { found, position }
        });
    }

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NotFinite)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        let mut parser = Self {
            chars: input.chars().collect(),
            pos: 0,
        };
        parser.skip_whitespace();
        parser
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn peek_indexed(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).map(|c| (self.pos, *c))
    }

    fn expr(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, EvaluationError> {
        match self.peek() {
            None => Err(EvaluationError::UnexpectedEnd),
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                let open = self.pos;
                self.pos += 1;
                let value = self.expr()?;
                match self.peek() {
                    Some(')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(EvaluationError::UnbalancedParenthesis(open)),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(found) => Err(EvaluationError::UnexpectedCharacter {
                found,
                position: self.pos,
            }),
        }
    }

    fn number(&mut self) -> Result<f64, EvaluationError> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_digit = false;

        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() {
                seen_digit = true;
            } else if c == '.' && !seen_dot {
                seen_dot = true;
            } else {
                break;
            }
            self.pos += 1;
        }

        if !seen_digit {
            return Err(EvaluationError::UnexpectedCharacter {
                found: '.',
                position: start,
            });
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| EvaluationError::UnexpectedCharacter {
                found: self.chars[start],
                position: start,
            })
    }
}
