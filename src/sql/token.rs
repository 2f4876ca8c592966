/// Token types for the SQL lexer
use phf::phf_map;

// Perfect hash map for O(1) case-insensitive keyword lookup
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "values" => TokenType::Values,
    "update" => TokenType::Update,
    "set" => TokenType::Set,
    "delete" => TokenType::Delete,
    "create" => TokenType::Create,
    "drop" => TokenType::Drop,
    "table" => TokenType::Table,
    "index" => TokenType::Index,
    "on" => TokenType::On,
    "unique" => TokenType::Unique,
    "primary" => TokenType::Primary,
    "key" => TokenType::Key,
    "default" => TokenType::Default,
    "not" => TokenType::Not,
    "null" => TokenType::Null,
    "true" => TokenType::True,
    "false" => TokenType::False,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "like" => TokenType::Like,
    "in" => TokenType::In,
    "between" => TokenType::Between,
    "is" => TokenType::Is,
    "as" => TokenType::As,
    "order" => TokenType::Order,
    "by" => TokenType::By,
    "group" => TokenType::Group,
    "having" => TokenType::Having,
    "limit" => TokenType::Limit,
    "offset" => TokenType::Offset,
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    "join" => TokenType::Join,
    "left" => TokenType::Left,
    "inner" => TokenType::Inner,
    "outer" => TokenType::Outer,
    "distinct" => TokenType::Distinct,
    "show" => TokenType::Show,
    "tables" => TokenType::Tables,
    "describe" => TokenType::Describe,
    "truncate" => TokenType::Truncate,
    "integer" => TokenType::Integer,
    "int" => TokenType::Integer,
    "float" => TokenType::Float,
    "real" => TokenType::Float,
    "double" => TokenType::Float,
    "varchar" => TokenType::Varchar,
    "text" => TokenType::Text,
    "string" => TokenType::Text,
    "boolean" => TokenType::Boolean,
    "bool" => TokenType::Boolean,
    "date" => TokenType::Date,
    "timestamp" => TokenType::Timestamp,
    "datetime" => TokenType::Timestamp,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Drop,
    Table,
    Index,
    On,
    Unique,
    Primary,
    Key,
    Default,
    Not,
    Null,
    True,
    False,
    And,
    Or,
    Like,
    In,
    Between,
    Is,
    As,
    Order,
    By,
    Group,
    Having,
    Limit,
    Offset,
    Asc,
    Desc,
    Join,
    Left,
    Inner,
    Outer,
    Distinct,
    Show,
    Tables,
    Describe,
    Truncate,

    // Data type keywords
    Integer,
    Float,
    Varchar,
    Text,
    Boolean,
    Date,
    Timestamp,

    // Operators
    Eq,    // =
    Ne,    // != or <>
    Lt,    // <
    Gt,    // >
    Le,    // <=
    Ge,    // >=
    Plus,  // +
    Minus, // -
    Star,  // *
    Slash, // /

    // Delimiters
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .

    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier(String),

    // Special
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, line: usize, column: usize) -> Self {
        Self {
            token_type,
            line,
            column,
        }
    }
}

impl TokenType {
    /// Keyword lookup, case-insensitive
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }
}
