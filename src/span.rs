use std::fmt;
use logos::Span as LogosSpan;

/// 1始まりの行と列
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// ソース上の範囲
///
/// 合成されたノードは範囲を持たないため、ノード側では `Option<Span>` として保持します。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}
impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// 字句解析器のバイト範囲を行と列に直します
    pub fn from_logos_span(span: LogosSpan, source: &str) -> Self {
        let position_after = |text: &str, from: Position| match text.rfind('\n') {
            Some(newline) => Position::new(
                from.line + text.matches('\n').count(),
                text[newline + 1..].chars().count() + 1,
            ),
            None => Position::new(from.line, from.column + text.chars().count()),
        };
        let start = position_after(&source[..span.start], Position::new(1, 1));
        let end = position_after(&source[span.start..span.end], start);
        Span { start, end }
    }

    pub fn with_lc(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self::new(Position::new(start_line, start_column), Position::new(end_line, end_column))
    }
}

/// 範囲付きの値。字句解析器のトークンに使います
#[derive(Clone, PartialEq)]
pub struct Spanned<T> {
    pub inner: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(inner: T, span: Span) -> Self {
        Self { inner, span }
    }
}

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {:?}", self.inner, self.span)
    }
}
