use crate::span::{Span, Spanned};
use crate::token::{Token, TokenKind};
use std::iter::Peekable;

struct LexerCore<'a> {
    logos_lexer: logos::SpannedIter<'a, TokenKind>
}
impl<'a> Iterator for LexerCore<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (token, range) = self.logos_lexer.next()?;
            // 認識できない文字は読み飛ばす
            let Ok(token) = token else { continue };
            let span = Span::from_logos_span(range, self.logos_lexer.source());
            return Some(Spanned::new(token, span));
        }
    }
}

/// 生の構文の葉を切り出す字句解析器
///
/// 連続する改行は一つの `NewLine` にまとめます。
pub struct Lexer<'a> {
    core: Peekable<LexerCore<'a>>
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            core: LexerCore {
                logos_lexer: logos::Lexer::new(input).spanned(),
            }.peekable(),
        }
    }

    /// 改行を含まないトークン列
    pub fn significant(input: &'a str) -> impl Iterator<Item = Token> + 'a {
        Lexer::new(input).filter(|token| token.inner != TokenKind::NewLine)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;
    fn next(&mut self) -> Option<Self::Item> {
        let next = self.core.next()?;
        if next.inner != TokenKind::NewLine {
            return Some(next);
        }
        while let Some(token) = self.core.peek() {
            if token.inner != TokenKind::NewLine {
                break;
            }
            _ = self.core.next();
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_modifier_tokens() {
        let input = "public suspend inline override fun";
        let tokens: Vec<Token> = Lexer::new(input).collect();

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].inner, TokenKind::Public);
        assert_eq!(tokens[1].inner, TokenKind::Suspend);
        assert_eq!(tokens[2].inner, TokenKind::Inline);
        assert_eq!(tokens[3].inner, TokenKind::Override);
        assert_eq!(tokens[4].inner, TokenKind::Fun);
        assert!(tokens[..4].iter().all(|token| token.inner.is_modifier()));
        assert!(!tokens[4].inner.is_modifier());
    }

    #[test]
    fn test_literals() {
        let input = r#"42 7L 1.5 2.5f 'c' "text" null true"#;
        let tokens: Vec<Token> = Lexer::new(input).collect();

        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[0].inner, TokenKind::IntLiteral(Arc::from("42")));
        assert_eq!(tokens[1].inner, TokenKind::LongLiteral(Arc::from("7")));
        assert_eq!(tokens[2].inner, TokenKind::DoubleLiteral(Arc::from("1.5")));
        assert_eq!(tokens[3].inner, TokenKind::FloatLiteral(Arc::from("2.5")));
        assert_eq!(tokens[4].inner, TokenKind::CharLiteral('c'));
        assert_eq!(tokens[5].inner, TokenKind::StringLiteral(Arc::from("text")));
        assert_eq!(tokens[6].inner, TokenKind::NullLiteral);
        assert_eq!(tokens[7].inner, TokenKind::BoolLiteral(true));
    }

    #[test]
    fn test_identifiers_are_not_keywords() {
        let input = "inner interface_ value";
        let tokens: Vec<Token> = Lexer::new(input).collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].inner, TokenKind::Identifier(Arc::from("inner")));
        assert_eq!(tokens[1].inner, TokenKind::Identifier(Arc::from("interface_")));
        assert_eq!(tokens[2].inner, TokenKind::Value);
    }

    #[test]
    fn test_newlines() {
        let input = "val x = 42\n\n\nvar y";
        let tokens: Vec<Token> = Lexer::new(input).collect();

        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[4].inner, TokenKind::NewLine);
        assert_eq!(tokens[5].inner, TokenKind::Var);
        assert_eq!(Lexer::significant(input).count(), 6);
    }

    #[test]
    fn test_spans() {
        let tokens: Vec<Token> = Lexer::new("fun\n  f").collect();
        assert_eq!(tokens[2].span, Span::with_lc(2, 3, 2, 4));
    }
}
