/// SQL parser - converts tokens into an AST
///
/// Statements are parsed by recursive descent; expressions use Pratt
/// parsing driven by operator precedence. Exactly one statement is
/// accepted per input.
use super::ast::*;
use super::token::{Token, TokenType};
use crate::error::{DbError, Result};
use crate::types::{ColumnDef, ColumnType, Value};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse a single SQL statement; trailing input is a syntax error
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;

        // Optional terminating semicolon
        self.match_token(TokenType::Semicolon);

        if !matches!(self.current().token_type, TokenType::Eof) {
            return Err(self.error("Unexpected input after end of statement"));
        }

        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match &self.current().token_type {
            TokenType::Select => Ok(Statement::Select(self.parse_select()?)),
            TokenType::Insert => Ok(Statement::Insert(self.parse_insert()?)),
            TokenType::Update => Ok(Statement::Update(self.parse_update()?)),
            TokenType::Delete => Ok(Statement::Delete(self.parse_delete()?)),
            TokenType::Create => self.parse_create(),
            TokenType::Drop => self.parse_drop(),
            TokenType::Show => self.parse_show(),
            TokenType::Describe => self.parse_describe(),
            TokenType::Truncate => self.parse_truncate(),
            _ => Err(self.error(
                "Expected SELECT, INSERT, UPDATE, DELETE, CREATE, DROP, SHOW, DESCRIBE, or TRUNCATE",
            )),
        }
    }

    // -----------------------------------------------------------------------
    // SELECT
    // -----------------------------------------------------------------------

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenType::Select)?;

        let distinct = self.match_token(TokenType::Distinct);
        let columns = self.parse_select_columns()?;

        self.expect(TokenType::From)?;
        let from = self.parse_table_ref()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenType::Group) {
            self.expect(TokenType::By)?;
            Some(self.parse_column_name_list()?)
        } else {
            None
        };

        let having = if self.match_token(TokenType::Having) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        let limit = if self.match_token(TokenType::Limit) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        let offset = if self.match_token(TokenType::Offset) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        Ok(SelectStmt {
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut columns = Vec::new();

        loop {
            if matches!(self.current().token_type, TokenType::Star) {
                self.advance();
                columns.push(SelectColumn::Star);
            } else {
                let expr = self.parse_expr(0)?;
                let alias = if self.match_token(TokenType::As) {
                    Some(self.parse_identifier()?)
                } else {
                    None
                };
                columns.push(SelectColumn::Expr(expr, alias));
            }

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = Vec::new();

        loop {
            let expr = self.parse_expr(0)?;
            let asc = if self.match_token(TokenType::Desc) {
                false
            } else {
                self.match_token(TokenType::Asc); // optional
                true
            };

            order_by.push(OrderByExpr { expr, asc });

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(order_by)
    }

    /// `table1 [AS a] (JOIN | LEFT [OUTER] JOIN) table2 [AS b] ON cond ...`
    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let mut left = self.parse_single_table()?;

        while self.is_join_keyword() {
            let join_type = self.parse_join_type()?;
            let right = self.parse_single_table()?;

            self.expect(TokenType::On)?;
            let on_condition = self.parse_expr(0)?;

            left = TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                join_type,
                on_condition,
            };
        }

        Ok(left)
    }

    fn parse_single_table(&mut self) -> Result<TableRef> {
        let name = self.parse_identifier()?;

        let alias = if self.match_token(TokenType::As) {
            Some(self.parse_identifier()?)
        } else if matches!(self.current().token_type, TokenType::Identifier(_)) {
            // Implicit alias (without AS)
            Some(self.parse_identifier()?)
        } else {
            None
        };

        Ok(TableRef::Table { name, alias })
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.current().token_type,
            TokenType::Join | TokenType::Inner | TokenType::Left
        )
    }

    fn parse_join_type(&mut self) -> Result<JoinType> {
        match self.current().token_type {
            TokenType::Inner => {
                self.advance();
                self.expect(TokenType::Join)?;
                Ok(JoinType::Inner)
            }
            TokenType::Left => {
                self.advance();
                self.match_token(TokenType::Outer); // OUTER is optional
                self.expect(TokenType::Join)?;
                Ok(JoinType::Left)
            }
            TokenType::Join => {
                self.advance();
                Ok(JoinType::Inner)
            }
            _ => Err(self.error("Expected JOIN keyword")),
        }
    }

    // -----------------------------------------------------------------------
    // DML
    // -----------------------------------------------------------------------

    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenType::Insert)?;
        self.expect(TokenType::Into)?;

        let table = self.parse_identifier()?;

        let columns = if matches!(self.current().token_type, TokenType::LParen) {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(TokenType::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(TokenType::Values)?;

        let mut values = Vec::new();
        loop {
            self.expect(TokenType::LParen)?;
            let row = self.parse_expr_list()?;
            self.expect(TokenType::RParen)?;
            values.push(row);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(InsertStmt {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenType::Update)?;
        let table = self.parse_identifier()?;
        self.expect(TokenType::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect(TokenType::Eq)?;
            let expr = self.parse_expr(0)?;
            assignments.push((column, expr));

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        Ok(UpdateStmt {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenType::Delete)?;
        self.expect(TokenType::From)?;
        let table = self.parse_identifier()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        Ok(DeleteStmt {
            table,
            where_clause,
        })
    }

    // -----------------------------------------------------------------------
    // DDL
    // -----------------------------------------------------------------------

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenType::Create)?;

        match &self.current().token_type {
            TokenType::Table => Ok(Statement::CreateTable(self.parse_create_table()?)),
            TokenType::Index => Ok(Statement::CreateIndex(self.parse_create_index(false)?)),
            TokenType::Unique => {
                self.advance();
                Ok(Statement::CreateIndex(self.parse_create_index(true)?))
            }
            _ => Err(self.error("Expected TABLE or INDEX after CREATE")),
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect(TokenType::Table)?;
        let table = self.parse_identifier()?;

        self.expect(TokenType::LParen)?;
        let columns = self.parse_column_defs()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateTableStmt { table, columns })
    }

    fn parse_column_defs(&mut self) -> Result<Vec<ColumnDef>> {
        let mut columns = Vec::new();

        loop {
            let name = self.parse_identifier()?;
            let col_type = self.parse_data_type()?;
            let mut col = ColumnDef::new(name, col_type);

            // Constraints may appear in any order
            loop {
                match &self.current().token_type {
                    TokenType::Not => {
                        self.advance();
                        self.expect(TokenType::Null)?;
                        col.not_null = true;
                    }
                    TokenType::Unique => {
                        self.advance();
                        col.unique = true;
                    }
                    TokenType::Primary => {
                        self.advance();
                        self.expect(TokenType::Key)?;
                        col.primary_key = true;
                        col.not_null = true;
                        col.unique = true;
                    }
                    TokenType::Default => {
                        self.advance();
                        col.default = Some(self.parse_literal_value()?);
                    }
                    _ => break,
                }
            }

            columns.push(col);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_data_type(&mut self) -> Result<ColumnType> {
        let data_type = match &self.current().token_type {
            TokenType::Integer => ColumnType::Integer,
            TokenType::Float => ColumnType::Float,
            TokenType::Text => ColumnType::Text,
            TokenType::Boolean => ColumnType::Boolean,
            TokenType::Date => ColumnType::Date,
            TokenType::Timestamp => ColumnType::Timestamp,
            TokenType::Varchar => {
                self.advance();
                if self.match_token(TokenType::LParen) {
                    let size = self.parse_usize()?;
                    self.expect(TokenType::RParen)?;
                    return Ok(ColumnType::Varchar(size));
                }
                // Bare VARCHAR behaves as unbounded text
                return Ok(ColumnType::Text);
            }
            _ => return Err(self.error("Expected data type")),
        };

        self.advance();
        Ok(data_type)
    }

    /// DEFAULT accepts a constant literal (optionally signed) or NULL
    fn parse_literal_value(&mut self) -> Result<Value> {
        let negate = if self.match_token(TokenType::Minus) {
            true
        } else {
            self.match_token(TokenType::Plus);
            false
        };

        let value = match &self.current().token_type {
            TokenType::IntLiteral(i) => Value::Integer(*i),
            TokenType::FloatLiteral(f) => Value::Float(*f),
            TokenType::StringLiteral(s) => Value::Text(s.clone()),
            TokenType::True => Value::Bool(true),
            TokenType::False => Value::Bool(false),
            TokenType::Null => Value::Null,
            _ => return Err(self.error("Expected literal value")),
        };
        self.advance();

        if negate {
            return match value {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                _ => Err(self.error("Cannot negate non-numeric literal")),
            };
        }

        Ok(value)
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<CreateIndexStmt> {
        self.expect(TokenType::Index)?;
        let index_name = self.parse_identifier()?;
        self.expect(TokenType::On)?;
        let table = self.parse_identifier()?;
        self.expect(TokenType::LParen)?;
        let column = self.parse_identifier()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateIndexStmt {
            index_name,
            table,
            column,
            unique,
        })
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(TokenType::Drop)?;

        match &self.current().token_type {
            TokenType::Table => {
                self.advance();
                let table = self.parse_identifier()?;
                Ok(Statement::DropTable(DropTableStmt { table }))
            }
            TokenType::Index => {
                self.advance();
                let index_name = self.parse_identifier()?;
                Ok(Statement::DropIndex(DropIndexStmt { index_name }))
            }
            _ => Err(self.error("Expected TABLE or INDEX after DROP")),
        }
    }

    fn parse_show(&mut self) -> Result<Statement> {
        self.expect(TokenType::Show)?;

        if self.match_token(TokenType::Tables) {
            Ok(Statement::ShowTables)
        } else {
            Err(self.error("Expected TABLES after SHOW"))
        }
    }

    fn parse_describe(&mut self) -> Result<Statement> {
        self.expect(TokenType::Describe)?;
        let table_name = self.parse_identifier()?;
        Ok(Statement::DescribeTable(table_name))
    }

    fn parse_truncate(&mut self) -> Result<Statement> {
        self.expect(TokenType::Truncate)?;
        self.match_token(TokenType::Table); // TABLE keyword is optional
        let table = self.parse_identifier()?;
        Ok(Statement::Truncate(TruncateStmt { table }))
    }

    // -----------------------------------------------------------------------
    // Expressions (Pratt parsing)
    // -----------------------------------------------------------------------

    /// Comparison-level precedence: IS/IN/BETWEEN/LIKE attach here, and the
    /// NOT prefix parses its operand at this level so `NOT a = 1` negates
    /// the whole comparison.
    const CMP_PRECEDENCE: u8 = 3;

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_prefix_expr()?;

        loop {
            if let Some(op) = self.peek_binary_op() {
                let precedence = op.precedence();
                if precedence < min_precedence {
                    break;
                }

                self.advance(); // consume operator
                let right = self.parse_expr(precedence + 1)?;

                left = Expr::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                };
                continue;
            }

            if min_precedence <= Self::CMP_PRECEDENCE {
                if let Some(expr) = self.try_parse_postfix(&left)? {
                    left = expr;
                    continue;
                }
            }

            break;
        }

        Ok(left)
    }

    fn parse_prefix_expr(&mut self) -> Result<Expr> {
        match &self.current().token_type {
            TokenType::Not => {
                self.advance();
                let expr = self.parse_expr(Self::CMP_PRECEDENCE)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(expr),
                })
            }
            TokenType::Minus => {
                self.advance();
                let expr = self.parse_expr(6)?; // unary sign binds tightest
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(expr),
                })
            }
            TokenType::Plus => {
                self.advance();
                let expr = self.parse_expr(6)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Plus,
                    expr: Box::new(expr),
                })
            }

            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::RParen)?;
                Ok(expr)
            }

            TokenType::IntLiteral(i) => {
                let i = *i;
                self.advance();
                Ok(Expr::Literal(Value::Integer(i)))
            }
            TokenType::FloatLiteral(f) => {
                let f = *f;
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            TokenType::StringLiteral(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }

            TokenType::Identifier(_) => {
                let name = self.parse_identifier()?;

                // Qualified column name (alias.column)
                if matches!(self.current().token_type, TokenType::Dot) {
                    self.advance();
                    let column = self.parse_identifier()?;
                    return Ok(Expr::Column(format!("{}.{}", name, column)));
                }

                // Function call
                if matches!(self.current().token_type, TokenType::LParen) {
                    self.advance();

                    let distinct = self.match_token(TokenType::Distinct);

                    let args = if matches!(self.current().token_type, TokenType::RParen) {
                        Vec::new()
                    } else if matches!(self.current().token_type, TokenType::Star) {
                        self.advance();
                        vec![Expr::Wildcard]
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect(TokenType::RParen)?;

                    return Ok(Expr::FunctionCall {
                        name,
                        args,
                        distinct,
                    });
                }

                Ok(Expr::Column(name))
            }

            _ => Err(self.error("Expected expression")),
        }
    }

    /// IS [NOT] NULL, [NOT] IN, [NOT] BETWEEN, [NOT] LIKE
    fn try_parse_postfix(&mut self, left: &Expr) -> Result<Option<Expr>> {
        match &self.current().token_type {
            TokenType::Is => {
                self.advance();
                let negated = self.match_token(TokenType::Not);
                self.expect(TokenType::Null)?;
                Ok(Some(Expr::IsNull {
                    expr: Box::new(left.clone()),
                    negated,
                }))
            }
            TokenType::In => {
                self.advance();
                Ok(Some(self.parse_in_tail(left.clone(), false)?))
            }
            TokenType::Between => {
                self.advance();
                Ok(Some(self.parse_between_tail(left.clone(), false)?))
            }
            TokenType::Like => {
                self.advance();
                Ok(Some(self.parse_like_tail(left.clone(), false)?))
            }
            TokenType::Not => {
                // Only consume NOT when it introduces IN / BETWEEN / LIKE
                let next = self.peek_next();
                if matches!(
                    next,
                    Some(TokenType::In) | Some(TokenType::Between) | Some(TokenType::Like)
                ) {
                    self.advance(); // NOT
                    match self.current().token_type.clone() {
                        TokenType::In => {
                            self.advance();
                            Ok(Some(self.parse_in_tail(left.clone(), true)?))
                        }
                        TokenType::Between => {
                            self.advance();
                            Ok(Some(self.parse_between_tail(left.clone(), true)?))
                        }
                        TokenType::Like => {
                            self.advance();
                            Ok(Some(self.parse_like_tail(left.clone(), true)?))
                        }
                        _ => unreachable!(),
                    }
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_in_tail(&mut self, expr: Expr, negated: bool) -> Result<Expr> {
        self.expect(TokenType::LParen)?;
        let list = self.parse_expr_list()?;
        self.expect(TokenType::RParen)?;
        Ok(Expr::In {
            expr: Box::new(expr),
            list,
            negated,
        })
    }

    fn parse_between_tail(&mut self, expr: Expr, negated: bool) -> Result<Expr> {
        let low = self.parse_expr(Self::CMP_PRECEDENCE + 1)?;
        self.expect(TokenType::And)?;
        let high = self.parse_expr(Self::CMP_PRECEDENCE + 1)?;
        Ok(Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    fn parse_like_tail(&mut self, expr: Expr, negated: bool) -> Result<Expr> {
        let pattern = self.parse_expr(Self::CMP_PRECEDENCE + 1)?;
        Ok(Expr::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            negated,
        })
    }

    fn peek_binary_op(&self) -> Option<BinaryOperator> {
        match &self.current().token_type {
            TokenType::Eq => Some(BinaryOperator::Eq),
            TokenType::Ne => Some(BinaryOperator::Ne),
            TokenType::Lt => Some(BinaryOperator::Lt),
            TokenType::Gt => Some(BinaryOperator::Gt),
            TokenType::Le => Some(BinaryOperator::Le),
            TokenType::Ge => Some(BinaryOperator::Ge),
            TokenType::And => Some(BinaryOperator::And),
            TokenType::Or => Some(BinaryOperator::Or),
            TokenType::Plus => Some(BinaryOperator::Add),
            TokenType::Minus => Some(BinaryOperator::Sub),
            TokenType::Star => Some(BinaryOperator::Mul),
            TokenType::Slash => Some(BinaryOperator::Div),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn parse_identifier(&mut self) -> Result<String> {
        if let TokenType::Identifier(name) = &self.current().token_type {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("Expected identifier"))
        }
    }

    /// Possibly-qualified column name (`col` or `alias.col`)
    fn parse_column_name(&mut self) -> Result<String> {
        let name = self.parse_identifier()?;
        if self.match_token(TokenType::Dot) {
            let column = self.parse_identifier()?;
            Ok(format!("{}.{}", name, column))
        } else {
            Ok(name)
        }
    }

    fn parse_column_name_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_column_name()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expr(0)?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_usize(&mut self) -> Result<usize> {
        if let TokenType::IntLiteral(n) = self.current().token_type {
            if n < 0 {
                return Err(self.error("Expected non-negative integer"));
            }
            self.advance();
            Ok(n as usize)
        } else {
            Err(self.error("Expected integer"))
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_next(&self) -> Option<&TokenType> {
        self.tokens.get(self.position + 1).map(|t| &t.token_type)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if std::mem::discriminant(&self.current().token_type)
            == std::mem::discriminant(&token_type)
        {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if std::mem::discriminant(&self.current().token_type)
            == std::mem::discriminant(&token_type)
        {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("Expected {:?}", token_type)))
        }
    }

    fn error(&self, msg: &str) -> DbError {
        let token = self.current();
        DbError::Syntax {
            message: msg.to_string(),
            line: token.line,
            column: token.column,
        }
    }
}
