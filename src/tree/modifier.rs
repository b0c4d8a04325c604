use crate::errors::InternalError;
use crate::syntax::{RawKind, RawNode};
use crate::token::TokenKind;
use crate::types::Variance;
use super::core::{DeclarationStatus, Modality, Visibility};

/// 宣言の修飾子リストを読み取った結果
#[derive(Debug, Default)]
pub struct Modifiers<'s> {
    pub status: DeclarationStatus,
    pub variance: Variance,
    pub is_vararg: bool,
    pub is_reified: bool,
    pub is_enum: bool,
    pub is_annotation: bool,
    pub annotations: Vec<&'s RawNode<'s>>,
}

impl<'s> Modifiers<'s> {
    /// 修飾子リストを一つずつ読みます。リストがなければすべて既定値です
    pub fn from_list(list: Option<&'s RawNode<'s>>) -> Result<Self, InternalError> {
        let mut modifiers = Modifiers::default();
        let Some(list) = list else { return Ok(modifiers) };
        for &child in &list.children {
            match child.kind {
                RawKind::AnnotationEntry => modifiers.annotations.push(child),
                RawKind::Token => match &child.token {
                    Some(token) => modifiers.add_modifier(token)?,
                    None => return Err(child.malformed("modifier leaf without a token")),
                },
                _ => return Err(child.malformed("unexpected node in a modifier list")),
            }
        }
        Ok(modifiers)
    }

    pub fn add_modifier(&mut self, token: &TokenKind) -> Result<(), InternalError> {
        let status = &mut self.status;
        match token {
            TokenKind::Suspend => status.is_suspend = true,
            TokenKind::Inline | TokenKind::Value => status.is_inline = true,
            TokenKind::Data => status.is_data = true,
            TokenKind::Companion => status.is_companion = true,
            TokenKind::Override => status.is_override = true,
            TokenKind::Enum => self.is_enum = true,
            TokenKind::Annotation => self.is_annotation = true,
            TokenKind::Public => status.visibility = Visibility::Public,
            TokenKind::Internal => status.visibility = Visibility::Internal,
            TokenKind::Protected => status.visibility = Visibility::Protected,
            TokenKind::Private => status.visibility = Visibility::Private,
            TokenKind::Open => status.modality = Some(Modality::Open),
            TokenKind::Final => status.modality = Some(Modality::Final),
            TokenKind::Abstract => status.modality = Some(Modality::Abstract),
            TokenKind::Sealed => status.modality = Some(Modality::Sealed),
            TokenKind::Vararg => self.is_vararg = true,
            TokenKind::Reified => self.is_reified = true,
            TokenKind::In => self.variance = Variance::In,
            TokenKind::Out => self.variance = Variance::Out,
            other => return Err(InternalError::MalformedSyntax {
                kind: "ModifierList".to_string(),
                reason: format!("`{}` is not a modifier", other),
            }),
        }
        Ok(())
    }
}

/// 型参照に付く修飾子。`suspend` と注釈だけを持ちます
#[derive(Debug, Default)]
pub struct TypeModifier<'s> {
    pub has_suspend: bool,
    pub annotations: Vec<&'s RawNode<'s>>,
}

impl<'s> TypeModifier<'s> {
    pub fn from_list(list: Option<&'s RawNode<'s>>) -> Self {
        let mut modifier = TypeModifier::default();
        if let Some(list) = list {
            for &child in &list.children {
                match (&child.kind, &child.token) {
                    (RawKind::AnnotationEntry, _) => modifier.annotations.push(child),
                    (_, Some(token)) => modifier.add_modifier(token),
                    _ => {}
                }
            }
        }
        modifier
    }

    /// `suspend` 以外の修飾子は型には意味を持たないので無視します
    pub fn add_modifier(&mut self, token: &TokenKind) {
        if *token == TokenKind::Suspend {
            self.has_suspend = true;
        }
    }
}
