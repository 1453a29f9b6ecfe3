//! Restricted arithmetic evaluator.
//!
//! Parses `+ - * / **`, unary minus, parentheses, and real literals into a
//! small [`Expr`] tree and reduces it to an `f64`. The grammar has no names,
//! calls, attribute access, or strings: anything outside it is rejected with
//! [`CalcError::UnsupportedExpression`] while parsing, so evaluation can only
//! ever perform arithmetic.
//!
//! Precedence follows Python, from loosest to tightest:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '-' factor | power
//! power  := atom ('**' factor)?
//! atom   := NUMBER | '(' expr ')'
//! ```
//!
//! so `-2**2` is `-4`, `2**-1` is `0.5`, and `2**3**2` is `512`.

/// Maximum nesting of parentheses, unary operators, and exponents.
const MAX_DEPTH: usize = 100;

/// Maximum number of tokens in a single expression.
const MAX_TOKENS: usize = 4096;

/// Errors from parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    /// The input uses a construct outside the arithmetic grammar.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// The input is not well-formed arithmetic.
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite real number")]
    NonFinite,
}

/// Unary operators the evaluator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

/// Binary operators the evaluator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Reduce the tree to a single value.
    pub fn eval(&self) -> Result<f64, CalcError> {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => -operand.eval()?,
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval()?;
                let r = rhs.eval()?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return Err(CalcError::DivisionByZero);
                        }
                        l / r
                    }
                    BinaryOp::Pow => {
                        if l == 0.0 && r < 0.0 {
                            return Err(CalcError::DivisionByZero);
                        }
                        l.powf(r)
                    }
                }
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CalcError::NonFinite)
        }
    }
}

/// Parse and evaluate an arithmetic expression.
///
/// The result is always a float, whatever the literal types.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    parse(expression)?.eval()
}

/// Parse an expression into its tree without evaluating it.
pub fn parse(expression: &str) -> Result<Expr, CalcError> {
    let tokens = Lexer::new(expression).tokenize()?;
    if tokens.is_empty() {
        return Err(CalcError::Syntax("empty expression".to_string()));
    }
    if tokens.len() > MAX_TOKENS {
        return Err(CalcError::Syntax(format!(
            "expression longer than {MAX_TOKENS} tokens"
        )));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(unexpected(tok)),
    }
}

// ── Lexer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleStar,
    LParen,
    RParen,
    /// Identifier or keyword (`x`, `and`, `__import__`).
    Name(String),
    /// Quoted string literal.
    Str,
    /// Punctuation that is valid outside the grammar (`%`, `//`, `<`, `.`).
    Operator(String),
}

/// Punctuation that forms operators or delimiters outside the grammar.
const FOREIGN_PUNCTUATION: &str = "%@&|^~<>=!.,:;[]{}";

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn tokenize(mut self) -> Result<Vec<Token>, CalcError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_at(0) {
            let token = match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    Token::DoubleStar
                }
                '*' => self.single(Token::Star),
                '/' if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    Token::Operator("//".to_string())
                }
                '/' => self.single(Token::Slash),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '\'' | '"' => self.string(c)?,
                c if c.is_alphabetic() || c == '_' => Token::Name(self.word()),
                c if FOREIGN_PUNCTUATION.contains(c) => self.single(Token::Operator(c.to_string())),
                other => {
                    return Err(CalcError::Syntax(format!("invalid character {other:?}")));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_at(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn string(&mut self, quote: char) -> Result<Token, CalcError> {
        self.pos += 1;
        while let Some(c) = self.peek_at(0) {
            self.pos += 1;
            match c {
                '\\' => self.pos += 1,
                c if c == quote => return Ok(Token::Str),
                _ => {}
            }
        }
        Err(CalcError::Syntax("unterminated string literal".to_string()))
    }

    fn number(&mut self) -> Result<Token, CalcError> {
        let start = self.pos;
        while let Some(c) = self.peek_at(0) {
            let exponent = matches!(c, 'e' | 'E')
                && match self.peek_at(1) {
                    Some('+' | '-') => self.peek_at(2).is_some_and(|d| d.is_ascii_digit()),
                    Some(d) => d.is_ascii_digit(),
                    None => false,
                };
            if exponent {
                self.pos += if matches!(self.peek_at(1), Some('+' | '-')) {
                    2
                } else {
                    1
                };
            } else if c.is_ascii_digit() || c == '.' || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        // `2j`, `0x1f` and friends are literals too, just not real decimals.
        if self
            .peek_at(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            let suffix = self.word();
            return Err(CalcError::UnsupportedExpression(format!(
                "literal `{text}{suffix}`"
            )));
        }

        parse_number(&text).map(Token::Number)
    }
}

fn parse_number(text: &str) -> Result<f64, CalcError> {
    let invalid = || CalcError::Syntax(format!("invalid number literal `{text}`"));

    // Underscores may only separate two digits.
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c == '_' {
            let before = i.checked_sub(1).and_then(|j| chars.get(j));
            let after = chars.get(i + 1);
            if !before.is_some_and(char::is_ascii_digit) || !after.is_some_and(char::is_ascii_digit)
            {
                return Err(invalid());
            }
        }
    }

    text.replace('_', "").parse::<f64>().map_err(|_| invalid())
}

// ── Parser ──────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn descend(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::Syntax(format!(
                "expression nested deeper than {MAX_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn factor(&mut self) -> Result<Expr, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.descend()?;
                let operand = self.factor()?;
                self.depth -= 1;
                Ok(Expr::unary(UnaryOp::Neg, operand))
            }
            Some(Token::Plus) => Err(CalcError::UnsupportedExpression(
                "unary operator `+`".to_string(),
            )),
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, CalcError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::DoubleStar) {
            return Ok(base);
        }
        self.pos += 1;
        self.descend()?;
        let exponent = self.factor()?;
        self.depth -= 1;
        Ok(Expr::binary(BinaryOp::Pow, base, exponent))
    }

    fn atom(&mut self) -> Result<Expr, CalcError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(tok) => Err(unexpected(&tok)),
                    None => Err(CalcError::Syntax("unclosed parenthesis".to_string())),
                }
            }
            Some(tok) => Err(unexpected(&tok)),
            None => Err(CalcError::Syntax("unexpected end of expression".to_string())),
        }
    }
}

/// Classify a token that cannot appear where it was found.
fn unexpected(tok: &Token) -> CalcError {
    match tok {
        Token::Name(name) => CalcError::UnsupportedExpression(format!("name `{name}`")),
        Token::Str => CalcError::UnsupportedExpression("string literal".to_string()),
        Token::Operator(op) => CalcError::UnsupportedExpression(format!("operator `{op}`")),
        Token::LParen => CalcError::UnsupportedExpression("call".to_string()),
        Token::Number(n) => CalcError::Syntax(format!("unexpected number {n}")),
        Token::RParen => CalcError::Syntax("unmatched `)`".to_string()),
        Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::DoubleStar => {
            CalcError::Syntax("operator without operand".to_string())
        }
    }
}
