/// GritDB SQL engine
///
/// Architecture:
/// - Lexer: SQL text -> positioned tokens
/// - Parser: tokens -> AST
/// - Evaluator: expressions under three-valued logic
/// - Executor: statements against the database core
pub mod ast;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOperator, Expr, SelectStmt, Statement};
pub use evaluator::ExprEvaluator;
pub use executor::{QueryExecutor, QueryResult};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenType};

use crate::database::GritDB;
use crate::error::Result;

/// Parse and execute one SQL statement
pub fn execute_sql(db: &mut GritDB, sql: &str) -> Result<QueryResult> {
    let mut lexer = Lexer::new(sql);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens);
    let statement = parser.parse()?;
    let mut executor = QueryExecutor::new(db);
    executor.execute(statement)
}
