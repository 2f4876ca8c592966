/// Abstract syntax tree for SQL statements
///
/// Nodes derive `PartialEq` and print back to valid SQL, so a printed
/// statement reparses to an identical tree.
use crate::types::{ColumnDef, Value};
use std::fmt;

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    DropTable(DropTableStmt),
    DropIndex(DropIndexStmt),
    ShowTables,
    DescribeTable(String),
    Truncate(TruncateStmt),
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: TableRef,
    pub where_clause: Option<Expr>,
    pub group_by: Option<Vec<String>>,
    pub having: Option<Expr>,
    pub order_by: Option<Vec<OrderByExpr>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Table reference in FROM (single table or JOIN chain)
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: String,
        alias: Option<String>,
    },
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        join_type: JoinType,
        on_condition: Expr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// `*`
    Star,
    /// Expression with optional alias
    Expr(Expr, Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    /// true = ASC, false = DESC
    pub asc: bool,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    /// None means schema column order
    pub columns: Option<Vec<String>>,
    /// One inner Vec per VALUES row
    pub values: Vec<Vec<Expr>>,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Option<Expr>,
}

/// CREATE TABLE statement (reuses the catalog column definition)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

/// CREATE [UNIQUE] INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub index_name: String,
    pub table: String,
    pub column: String,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStmt {
    pub index_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TruncateStmt {
    pub table: String,
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, possibly qualified (`alias.col`)
    Column(String),

    /// Literal value
    Literal(Value),

    /// `*` inside an aggregate call (`COUNT(*)`)
    Wildcard,

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    /// Function call; `distinct` covers `COUNT(DISTINCT col)`
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

impl BinaryOperator {
    /// Operator precedence (higher = tighter binding)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Le
            | BinaryOperator::Ge => 3,
            BinaryOperator::Add | BinaryOperator::Sub => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }
}

impl Expr {
    /// Whether this expression is an aggregate function call
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expr::FunctionCall { name, .. } => matches!(
                name.to_uppercase().as_str(),
                "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
            ),
            _ => false,
        }
    }

    /// Whether any aggregate call appears in this expression tree
    pub fn contains_aggregate(&self) -> bool {
        if self.is_aggregate() {
            return true;
        }
        match self {
            Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::UnaryOp { expr, .. } => expr.contains_aggregate(),
            Expr::FunctionCall { args, .. } => args.iter().any(|a| a.contains_aggregate()),
            Expr::In { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(|e| e.contains_aggregate())
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
            Expr::IsNull { expr, .. } => expr.contains_aggregate(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// SQL printing
// ---------------------------------------------------------------------------

fn fmt_literal(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => write!(f, "NULL"),
        Value::Integer(i) => write!(f, "{}", i),
        // {:?} keeps the decimal point so the literal reparses as a float
        Value::Float(v) => write!(f, "{:?}", v),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        Value::Date(d) => write!(f, "'{}'", d),
        Value::Timestamp(ts) => write!(f, "'{}'", ts),
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(value) => fmt_literal(value, f),
            Expr::Wildcard => write!(f, "*"),
            Expr::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "(NOT {})", expr),
                UnaryOperator::Minus => write!(f, "(-{})", expr),
                UnaryOperator::Plus => write!(f, "(+{})", expr),
            },
            Expr::FunctionCall {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                write!(f, "({}{} IN (", expr, if *negated { " NOT" } else { "" })?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "))")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "({}{} BETWEEN {} AND {})",
                expr,
                if *negated { " NOT" } else { "" },
                low,
                high
            ),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "({}{} LIKE {})",
                expr,
                if *negated { " NOT" } else { "" },
                pattern
            ),
            Expr::IsNull { expr, negated } => write!(
                f,
                "({} IS{} NULL)",
                expr,
                if *negated { " NOT" } else { "" }
            ),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Table { name, alias } => {
                write!(f, "{}", name)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            TableRef::Join {
                left,
                right,
                join_type,
                on_condition,
            } => {
                let kw = match join_type {
                    JoinType::Inner => "JOIN",
                    JoinType::Left => "LEFT JOIN",
                };
                write!(f, "{} {} {} ON {}", left, kw, right, on_condition)
            }
        }
    }
}

impl fmt::Display for SelectStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match col {
                SelectColumn::Star => write!(f, "*")?,
                SelectColumn::Expr(expr, alias) => {
                    write!(f, "{}", expr)?;
                    if let Some(alias) = alias {
                        write!(f, " AS {}", alias)?;
                    }
                }
            }
        }
        write!(f, " FROM {}", self.from)?;
        if let Some(pred) = &self.where_clause {
            write!(f, " WHERE {}", pred)?;
        }
        if let Some(cols) = &self.group_by {
            write!(f, " GROUP BY {}", cols.join(", "))?;
        }
        if let Some(pred) = &self.having {
            write!(f, " HAVING {}", pred)?;
        }
        if let Some(items) = &self.order_by {
            write!(f, " ORDER BY ")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", item.expr, if item.asc { "ASC" } else { "DESC" })?;
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => write!(f, "{}", s),
            Statement::Insert(i) => {
                write!(f, "INSERT INTO {}", i.table)?;
                if let Some(cols) = &i.columns {
                    write!(f, " ({})", cols.join(", "))?;
                }
                write!(f, " VALUES ")?;
                for (ri, row) in i.values.iter().enumerate() {
                    if ri > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    for (vi, val) in row.iter().enumerate() {
                        if vi > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", val)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Statement::Update(u) => {
                write!(f, "UPDATE {} SET ", u.table)?;
                for (i, (col, expr)) in u.assignments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", col, expr)?;
                }
                if let Some(pred) = &u.where_clause {
                    write!(f, " WHERE {}", pred)?;
                }
                Ok(())
            }
            Statement::Delete(d) => {
                write!(f, "DELETE FROM {}", d.table)?;
                if let Some(pred) = &d.where_clause {
                    write!(f, " WHERE {}", pred)?;
                }
                Ok(())
            }
            Statement::CreateTable(c) => {
                write!(f, "CREATE TABLE {} (", c.table)?;
                for (i, col) in c.columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", col.name, col.col_type)?;
                    if col.primary_key {
                        write!(f, " PRIMARY KEY")?;
                    } else {
                        if col.not_null {
                            write!(f, " NOT NULL")?;
                        }
                        if col.unique {
                            write!(f, " UNIQUE")?;
                        }
                    }
                    if let Some(default) = &col.default {
                        write!(f, " DEFAULT ")?;
                        fmt_literal(default, f)?;
                    }
                }
                write!(f, ")")
            }
            Statement::CreateIndex(c) => write!(
                f,
                "CREATE {}INDEX {} ON {} ({})",
                if c.unique { "UNIQUE " } else { "" },
                c.index_name,
                c.table,
                c.column
            ),
            Statement::DropTable(d) => write!(f, "DROP TABLE {}", d.table),
            Statement::DropIndex(d) => write!(f, "DROP INDEX {}", d.index_name),
            Statement::ShowTables => write!(f, "SHOW TABLES"),
            Statement::DescribeTable(t) => write!(f, "DESCRIBE {}", t),
            Statement::Truncate(t) => write!(f, "TRUNCATE TABLE {}", t.table),
        }
    }
}
