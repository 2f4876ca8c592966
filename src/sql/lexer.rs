/// SQL lexer - converts SQL text into a token stream with positions
use super::token::{Token, TokenType};
use crate::error::{DbError, Result};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, line, column));
        }

        let ch = self.current_char();

        // Skip comments
        if ch == '-' && self.peek_char() == Some('-') {
            self.skip_line_comment();
            return self.next_token();
        }

        if ch == '/' && self.peek_char() == Some('*') {
            self.skip_block_comment()?;
            return self.next_token();
        }

        let token_type = match ch {
            '\'' => self.read_string()?,

            '0'..='9' => self.read_number()?,

            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),

            '=' => {
                self.advance();
                TokenType::Eq
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ne
                } else {
                    return Err(self.error(line, column, "Unexpected character '!'"));
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Le
                } else if self.current_char() == '>' {
                    self.advance();
                    TokenType::Ne
                } else {
                    TokenType::Lt
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            '+' => {
                self.advance();
                TokenType::Plus
            }
            '-' => {
                self.advance();
                TokenType::Minus
            }
            '*' => {
                self.advance();
                TokenType::Star
            }
            '/' => {
                self.advance();
                TokenType::Slash
            }
            '(' => {
                self.advance();
                TokenType::LParen
            }
            ')' => {
                self.advance();
                TokenType::RParen
            }
            ',' => {
                self.advance();
                TokenType::Comma
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            '.' => {
                self.advance();
                TokenType::Dot
            }
            _ => {
                return Err(self.error(line, column, &format!("Unexpected character '{}'", ch)));
            }
        };

        Ok(Token::new(token_type, line, column))
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        if self.position + 1 < self.input.len() {
            Some(self.input[self.position + 1])
        } else {
            None
        }
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn error(&self, line: usize, column: usize, message: &str) -> DbError {
        DbError::Syntax {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
        if !self.is_eof() {
            self.advance(); // skip newline
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let line = self.line;
        let column = self.column;
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance(); // skip '*'
                self.advance(); // skip '/'
                return Ok(());
            }
            self.advance();
        }

        Err(self.error(line, column, "Unterminated block comment"))
    }

    /// Single-quoted string; a doubled quote escapes one quote
    fn read_string(&mut self) -> Result<TokenType> {
        let line = self.line;
        let column = self.column;
        self.advance(); // skip opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(self.error(line, column, "Unterminated string literal"));
            }
            if self.current_char() == '\'' {
                if self.peek_char() == Some('\'') {
                    value.push('\'');
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance(); // skip closing quote
                break;
            }
            value.push(self.current_char());
            self.advance();
        }

        Ok(TokenType::StringLiteral(value))
    }

    fn read_number(&mut self) -> Result<TokenType> {
        let line = self.line;
        let column = self.column;
        let mut value = String::new();
        let mut has_dot = false;

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.'
                && !has_dot
                && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            value
                .parse::<f64>()
                .map(TokenType::FloatLiteral)
                .map_err(|_| self.error(line, column, &format!("Invalid number '{}'", value)))
        } else {
            value
                .parse::<i64>()
                .map(TokenType::IntLiteral)
                .map_err(|_| self.error(line, column, &format!("Invalid number '{}'", value)))
        }
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexer_simple_select() {
        let mut lexer = Lexer::new("SELECT * FROM users");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens.len(), 5); // SELECT, *, FROM, users, EOF
        assert!(matches!(tokens[0].token_type, TokenType::Select));
        assert!(matches!(tokens[1].token_type, TokenType::Star));
        assert!(matches!(tokens[2].token_type, TokenType::From));
        assert!(matches!(tokens[3].token_type, TokenType::Identifier(_)));
        assert!(matches!(tokens[4].token_type, TokenType::Eof));
    }

    #[test]
    fn test_lexer_number_literals() {
        let mut lexer = Lexer::new("42 3.5");
        let tokens = lexer.tokenize().unwrap();

        assert!(matches!(tokens[0].token_type, TokenType::IntLiteral(42)));
        assert!(matches!(tokens[1].token_type, TokenType::FloatLiteral(f) if f == 3.5));
    }

    #[test]
    fn test_lexer_string_literal_with_escape() {
        let mut lexer = Lexer::new("SELECT 'it''s fine'");
        let tokens = lexer.tokenize().unwrap();

        assert!(
            matches!(tokens[1].token_type, TokenType::StringLiteral(ref s) if s == "it's fine")
        );
    }

    #[test]
    fn test_lexer_operators() {
        let mut lexer = Lexer::new("= != <> < <= > >= + - * /");
        let tokens = lexer.tokenize().unwrap();

        assert!(matches!(tokens[0].token_type, TokenType::Eq));
        assert!(matches!(tokens[1].token_type, TokenType::Ne));
        assert!(matches!(tokens[2].token_type, TokenType::Ne));
        assert!(matches!(tokens[3].token_type, TokenType::Lt));
        assert!(matches!(tokens[4].token_type, TokenType::Le));
        assert!(matches!(tokens[5].token_type, TokenType::Gt));
        assert!(matches!(tokens[6].token_type, TokenType::Ge));
        assert!(matches!(tokens[7].token_type, TokenType::Plus));
        assert!(matches!(tokens[8].token_type, TokenType::Minus));
        assert!(matches!(tokens[9].token_type, TokenType::Star));
        assert!(matches!(tokens[10].token_type, TokenType::Slash));
    }

    #[test]
    fn test_lexer_comments_skipped() {
        let mut lexer = Lexer::new("SELECT * -- trailing comment\nFROM /* block */ users");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens.len(), 5);
        assert!(matches!(tokens[2].token_type, TokenType::From));
    }

    #[test]
    fn test_lexer_positions() {
        let mut lexer = Lexer::new("SELECT\n  name");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let mut lexer = Lexer::new("SELECT 'oops");
        let err = lexer.tokenize().unwrap_err();
        assert!(matches!(err, DbError::Syntax { .. }));
    }

    #[test]
    fn test_lexer_invalid_character() {
        let mut lexer = Lexer::new("SELECT #");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_lexer_keywords_case_insensitive() {
        let mut lexer = Lexer::new("select Select SELECT");
        let tokens = lexer.tokenize().unwrap();
        for token in &tokens[..3] {
            assert!(matches!(token.token_type, TokenType::Select));
        }
    }
}
