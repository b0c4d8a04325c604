use std::fmt;
use std::sync::Arc;
use logos::Logos;
use crate::span::Spanned;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\f\r]+")]  // 水平タブ、フォームフィード、キャリッジリターンを無視
#[logos(skip r"\x{3000}")]  // 全角スペース
#[logos(skip r"//[^\n]*")]  // 行コメント
pub enum TokenKind {
    // 改行の特別処理
    #[regex(r"[\n]*\n[ \t\f\r]*", |_| ())]
    NewLine,

    // キーワード
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("object")]
    Object,
    #[token("typealias")]
    TypeAlias,
    #[token("constructor")]
    Constructor,
    #[token("fun")]
    Fun,
    #[token("val")]
    Val,
    #[token("var")]
    Var,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("return")]
    Return,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("dynamic")]
    Dynamic,

    // 修飾子
    #[token("suspend")]
    Suspend,
    #[token("inline")]
    Inline,
    #[token("value")]
    Value,
    #[token("data")]
    Data,
    #[token("companion")]
    Companion,
    #[token("override")]
    Override,
    #[token("enum")]
    Enum,
    #[token("annotation")]
    Annotation,
    #[token("public")]
    Public,
    #[token("internal")]
    Internal,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("open")]
    Open,
    #[token("final")]
    Final,
    #[token("abstract")]
    Abstract,
    #[token("sealed")]
    Sealed,
    #[token("vararg")]
    Vararg,
    #[token("reified")]
    Reified,
    #[token("in")]
    In,
    #[token("out")]
    Out,

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    BoolLiteral(bool),

    #[token("null")]
    NullLiteral,

    // リテラル
    #[regex(r"([\p{XID_Start}]|_)[\p{XID_Continue}]*", |lex| Arc::from(lex.slice()))]
    Identifier(Arc<str>),

    #[regex(r"\d+", |lex| Arc::from(lex.slice()))]
    IntLiteral(Arc<str>),

    #[regex(r"\d+L", |lex| {
        let slice = lex.slice();
        Arc::from(&slice[..slice.len()-1])
    })]
    LongLiteral(Arc<str>),

    #[regex(r"\d+\.\d+", |lex| Arc::from(lex.slice()))]
    DoubleLiteral(Arc<str>),

    #[regex(r"\d+(\.\d+)?[fF]", |lex| {
        let slice = lex.slice();
        Arc::from(&slice[..slice.len()-1])
    })]
    FloatLiteral(Arc<str>),

    #[regex(r"'[^'\\]'", |lex| lex.slice().chars().nth(1))]
    CharLiteral(char),

    #[regex(r#""[^"]*""#, |lex| {
        let slice = lex.slice();
        Arc::from(&slice[1..slice.len()-1])
    })]
    StringLiteral(Arc<str>),

    // 区切り文字
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("?.")]
    SafeDot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("?")]
    Question,
    #[token("@")]
    At,
    #[token("=")]
    Equal,
    #[token("*")]
    Asterisk,
    #[token("+")]
    Plus,
    #[token("->")]
    Arrow,
}

pub type Token = Spanned<TokenKind>;

impl TokenKind {
    /// 修飾子リストに現れうるトークンかどうか
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Suspend
                | TokenKind::Inline
                | TokenKind::Value
                | TokenKind::Data
                | TokenKind::Companion
                | TokenKind::Override
                | TokenKind::Enum
                | TokenKind::Annotation
                | TokenKind::Public
                | TokenKind::Internal
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Open
                | TokenKind::Final
                | TokenKind::Abstract
                | TokenKind::Sealed
                | TokenKind::Vararg
                | TokenKind::Reified
                | TokenKind::In
                | TokenKind::Out
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::IntLiteral(value) => write!(f, "{}", value),
            TokenKind::LongLiteral(value) => write!(f, "{}L", value),
            TokenKind::DoubleLiteral(value) => write!(f, "{}", value),
            TokenKind::FloatLiteral(value) => write!(f, "{}f", value),
            TokenKind::CharLiteral(value) => write!(f, "'{}'", value),
            TokenKind::StringLiteral(value) => write!(f, "\"{}\"", value),
            TokenKind::BoolLiteral(value) => write!(f, "{}", value),
            TokenKind::NullLiteral => write!(f, "null"),
            TokenKind::Package => write!(f, "package"),
            TokenKind::Import => write!(f, "import"),
            TokenKind::Class => write!(f, "class"),
            TokenKind::Interface => write!(f, "interface"),
            TokenKind::Object => write!(f, "object"),
            TokenKind::TypeAlias => write!(f, "typealias"),
            TokenKind::Constructor => write!(f, "constructor"),
            TokenKind::Fun => write!(f, "fun"),
            TokenKind::Val => write!(f, "val"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::This => write!(f, "this"),
            TokenKind::Super => write!(f, "super"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Do => write!(f, "do"),
            TokenKind::Break => write!(f, "break"),
            TokenKind::Continue => write!(f, "continue"),
            TokenKind::Dynamic => write!(f, "dynamic"),
            TokenKind::Suspend => write!(f, "suspend"),
            TokenKind::Inline => write!(f, "inline"),
            TokenKind::Value => write!(f, "value"),
            TokenKind::Data => write!(f, "data"),
            TokenKind::Companion => write!(f, "companion"),
            TokenKind::Override => write!(f, "override"),
            TokenKind::Enum => write!(f, "enum"),
            TokenKind::Annotation => write!(f, "annotation"),
            TokenKind::Public => write!(f, "public"),
            TokenKind::Internal => write!(f, "internal"),
            TokenKind::Protected => write!(f, "protected"),
            TokenKind::Private => write!(f, "private"),
            TokenKind::Open => write!(f, "open"),
            TokenKind::Final => write!(f, "final"),
            TokenKind::Abstract => write!(f, "abstract"),
            TokenKind::Sealed => write!(f, "sealed"),
            TokenKind::Vararg => write!(f, "vararg"),
            TokenKind::Reified => write!(f, "reified"),
            TokenKind::In => write!(f, "in"),
            TokenKind::Out => write!(f, "out"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::Less => write!(f, "<"),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::SafeDot => write!(f, "?."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::At => write!(f, "@"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::NewLine => write!(f, "\n"),
        }
    }
}
impl Token {
    pub fn identifier(self) -> Result<Spanned<Arc<str>>, Token> {
        match self.inner {
            TokenKind::Identifier(name) => Ok(Spanned::new(name, self.span)),
            _ => Err(self),
        }
    }
    pub fn string_literal(self) -> Result<Spanned<Arc<str>>, Token> {
        match self.inner {
            TokenKind::StringLiteral(value) => Ok(Spanned::new(value, self.span)),
            _ => Err(self),
        }
    }
}
