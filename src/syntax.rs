//! 外部の構文解析器から受け取る生の構文木
//!
//! 生の木は翻訳単位ごとの `typed_arena::Arena` に確保され、
//! 木の構築が終わればアリーナごと捨てられます。

use std::sync::Arc;
use typed_arena::Arena;
use crate::errors::InternalError;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::TokenKind;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum RawKind {
    File,
    PackageDirective,
    ImportDirective,
    ImportAlias,
    ModifierList,
    AnnotationEntry,
    /// `token` がキーワード（`class`/`interface`/`object`/`enum`/`annotation`）を表す
    Class,
    TypeAlias,
    PrimaryConstructor,
    SecondaryConstructor,
    ConstructorDelegationCall,
    Function,
    Property,
    DestructuringDeclaration,
    DestructuringEntry,
    Parameter,
    TypeParameter,
    Receiver,
    SuperTypeEntry,
    TypeReference,
    UserType,
    FunctionType,
    NullableType,
    DynamicType,
    TypeProjection,
    Block,
    Constant,
    StringTemplate,
    LiteralStringEntry,
    ExpressionStringEntry,
    NameReference,
    Call,
    DotQualified,
    This,
    Return,
    While,
    DoWhile,
    Break,
    Continue,
    /// 修飾子などの一つのトークン
    Token,
}

/// 生の構文木のノード
#[derive(Debug)]
pub struct RawNode<'s> {
    pub kind: RawKind,
    pub token: Option<TokenKind>,
    pub text: Arc<str>,
    pub span: Option<Span>,
    pub children: Vec<&'s RawNode<'s>>,
}

impl<'s> RawNode<'s> {
    pub fn children_of(&self, kind: RawKind) -> impl Iterator<Item = &'s RawNode<'s>> + '_ {
        self.children.iter().copied().filter(move |child| child.kind == kind)
    }
    pub fn child_of(&self, kind: RawKind) -> Option<&'s RawNode<'s>> {
        self.children_of(kind).next()
    }
    /// ラベルや別名のような省略可能な文字列
    pub fn optional_text(&self) -> Option<Arc<str>> {
        (!self.text.is_empty()).then(|| self.text.clone())
    }
    pub fn malformed(&self, reason: impl Into<String>) -> InternalError {
        InternalError::MalformedSyntax { kind: format!("{:?}", self.kind), reason: reason.into() }
    }
}

/// 生の構文木を組み立てるための薄い道具
///
/// 外部の構文解析器もテストも、これを通して翻訳単位のアリーナに生のノードを置きます。
pub struct RawTreeBuilder<'s> {
    arena: &'s Arena<RawNode<'s>>,
}

impl<'s> RawTreeBuilder<'s> {
    pub fn new(arena: &'s Arena<RawNode<'s>>) -> Self {
        Self { arena }
    }

    pub fn node(&self, kind: RawKind, text: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.arena.alloc(RawNode { kind, token: None, text: Arc::from(text), span: None, children })
    }

    pub fn tagged(&self, kind: RawKind, token: TokenKind, text: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.arena.alloc(RawNode { kind, token: Some(token), text: Arc::from(text), span: None, children })
    }

    pub fn with_span(&self, node: &'s RawNode<'s>, span: Span) -> &'s RawNode<'s> {
        self.arena.alloc(RawNode {
            kind: node.kind,
            token: node.token.clone(),
            text: node.text.clone(),
            span: Some(span),
            children: node.children.clone(),
        })
    }

    /// 修飾子を並べた文字列を字句解析し、トークンごとの葉を持つ修飾子リストを作ります
    pub fn modifiers(&self, source: &str, annotations: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        let mut children: Vec<&'s RawNode<'s>> = Lexer::significant(source)
            .map(|token| &*self.arena.alloc(RawNode {
                kind: RawKind::Token,
                text: Arc::from(token.inner.to_string()),
                token: Some(token.inner),
                span: Some(token.span),
                children: vec![],
            }))
            .collect();
        children.extend(annotations);
        self.node(RawKind::ModifierList, "", children)
    }

    /// リテラルを字句解析して定数ノードを作ります
    pub fn constant(&self, source: &str) -> Result<&'s RawNode<'s>, InternalError> {
        let mut tokens = Lexer::significant(source);
        let token = match (tokens.next(), tokens.next()) {
            (Some(token), None) => token,
            _ => return Err(InternalError::MalformedSyntax {
                kind: "Constant".to_string(),
                reason: format!("`{}` is not a single literal", source),
            }),
        };
        Ok(self.arena.alloc(RawNode {
            kind: RawKind::Constant,
            token: Some(token.inner),
            text: Arc::from(source),
            span: Some(token.span),
            children: vec![],
        }))
    }

    pub fn name(&self, name: &str) -> &'s RawNode<'s> {
        self.node(RawKind::NameReference, name, vec![])
    }

    pub fn user_type(&self, qualified_name: &str, arguments: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        let user_type = self.node(RawKind::UserType, qualified_name, arguments);
        self.node(RawKind::TypeReference, "", vec![user_type])
    }

    pub fn nullable_type(&self, qualified_name: &str) -> &'s RawNode<'s> {
        let user_type = self.node(RawKind::UserType, qualified_name, vec![]);
        let nullable = self.node(RawKind::NullableType, "", vec![user_type]);
        self.node(RawKind::TypeReference, "", vec![nullable])
    }

    pub fn call(&self, callee: &str, arguments: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.node(RawKind::Call, callee, arguments)
    }

    pub fn dot(&self, receiver: &'s RawNode<'s>, selector: &'s RawNode<'s>) -> &'s RawNode<'s> {
        self.tagged(RawKind::DotQualified, TokenKind::Dot, "", vec![receiver, selector])
    }

    pub fn literal_entry(&self, text: &str) -> &'s RawNode<'s> {
        self.node(RawKind::LiteralStringEntry, text, vec![])
    }

    pub fn expression_entry(&self, expression: &'s RawNode<'s>) -> &'s RawNode<'s> {
        self.node(RawKind::ExpressionStringEntry, "", vec![expression])
    }

    pub fn template(&self, entries: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.node(RawKind::StringTemplate, "", entries)
    }

    pub fn block(&self, statements: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.node(RawKind::Block, "", statements)
    }

    pub fn parameter(&self, name: &str, type_reference: &'s RawNode<'s>) -> &'s RawNode<'s> {
        self.node(RawKind::Parameter, name, vec![type_reference])
    }

    pub fn property(&self, name: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.tagged(RawKind::Property, TokenKind::Val, name, children)
    }

    pub fn function(&self, name: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.node(RawKind::Function, name, children)
    }

    pub fn class(&self, name: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.tagged(RawKind::Class, TokenKind::Class, name, children)
    }

    pub fn file(&self, name: &str, children: Vec<&'s RawNode<'s>>) -> &'s RawNode<'s> {
        self.node(RawKind::File, name, children)
    }
}

/// 一つのファイルの生の構文木を遅延して作る外部の構文解析器
///
/// 翻訳単位を処理するタスクへ渡されるので `Send` が必要です。
pub trait SyntaxSource: Send {
    fn file_name(&self) -> &str;
    fn produce<'s>(&self, builder: &RawTreeBuilder<'s>) -> Result<&'s RawNode<'s>, InternalError>;
}

/// クロージャで生の木を組み立てる `SyntaxSource`
pub struct FnSyntaxSource<F> {
    name: String,
    build: F,
}

impl<F> FnSyntaxSource<F>
where
    F: for<'s> Fn(&RawTreeBuilder<'s>) -> Result<&'s RawNode<'s>, InternalError> + Send,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self { name: name.into(), build }
    }
}

impl<F> SyntaxSource for FnSyntaxSource<F>
where
    F: for<'s> Fn(&RawTreeBuilder<'s>) -> Result<&'s RawNode<'s>, InternalError> + Send,
{
    fn file_name(&self) -> &str {
        &self.name
    }
    fn produce<'s>(&self, builder: &RawTreeBuilder<'s>) -> Result<&'s RawNode<'s>, InternalError> {
        (self.build)(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_list_keeps_token_kinds() {
        let arena = Arena::new();
        let builder = RawTreeBuilder::new(&arena);
        let list = builder.modifiers("private suspend", vec![]);
        let tokens: Vec<_> = list.children.iter().map(|child| child.token.clone()).collect();
        assert_eq!(tokens, vec![Some(TokenKind::Private), Some(TokenKind::Suspend)]);
        assert_eq!(list.children[1].text.as_ref(), "suspend");
    }

    #[test]
    fn test_constant_requires_single_literal() {
        let arena = Arena::new();
        let builder = RawTreeBuilder::new(&arena);
        let constant = builder.constant("42").unwrap();
        assert_eq!(constant.token, Some(TokenKind::IntLiteral(Arc::from("42"))));
        assert!(builder.constant("1 2").is_err());
    }

    #[test]
    fn test_child_lookup() {
        let arena = Arena::new();
        let builder = RawTreeBuilder::new(&arena);
        let function = builder.function("f", vec![builder.user_type("Int", vec![]), builder.block(vec![])]);
        assert!(function.child_of(RawKind::Block).is_some());
        assert_eq!(function.children_of(RawKind::TypeReference).count(), 1);
        assert_eq!(function.optional_text().as_deref(), Some("f"));
    }
}
