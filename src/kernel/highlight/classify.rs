//! Cursor-kind dispatch for frontend tokens.
//!
//! Each token maps to at most one kind tag. Type references in languages that
//! only tell records apart at their declaration are chased to that
//! declaration, bounded by [`MAX_RESOLVE_ATTEMPTS`].

use super::batch::{BufferId, CallBatch, LineSpan};
use super::group_table::{GroupTable, KindTag};
use crate::kernel::services::ports::frontend::{
    CursorKind, SyntaxFrontend, Token, TokenKind, TypeKind,
};

pub const MAX_RESOLVE_ATTEMPTS: usize = 2;

enum Step<C> {
    Done(Option<KindTag>),
    Retry(C),
}

/// Outcome of classifying one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tag: Option<KindTag>,
    /// Kind of the cursor the decision was made on, after any retries.
    pub resolved_kind: CursorKind,
}

pub struct Classifier<'a, F: SyntaxFrontend> {
    frontend: &'a F,
    table: &'a GroupTable,
    previous: Option<CursorKind>,
}

impl<'a, F: SyntaxFrontend> Classifier<'a, F> {
    pub fn new(frontend: &'a F, table: &'a GroupTable) -> Self {
        Self {
            frontend,
            table,
            previous: None,
        }
    }

    /// Final kind of the last token that reached dispatch.
    pub fn previous_kind(&self) -> Option<CursorKind> {
        self.previous
    }

    /// Classify `token` without emitting anything.
    ///
    /// Returns `None` for tokens that never reach dispatch (ignored spelling
    /// or no line in the main file); those leave the previous kind untouched.
    pub fn classify(&mut self, token: &Token<F::Cursor, F::Type>) -> Option<Classification> {
        if token.line.is_none() || self.table.is_ignored(&token.text) {
            return None;
        }

        let mut cursor = token.cursor.clone();
        let mut tag = None;

        // One dispatch per resolution plus the final one on the last cursor.
        for attempt in 0..=MAX_RESOLVE_ATTEMPTS {
            let can_retry = attempt < MAX_RESOLVE_ATTEMPTS;
            match self.dispatch(token, &cursor, can_retry) {
                Step::Done(found) => {
                    tag = found;
                    break;
                }
                Step::Retry(next) => cursor = next,
            }
        }

        let resolved_kind = self.frontend.cursor_kind(&cursor);
        self.previous = Some(resolved_kind);

        Some(Classification { tag, resolved_kind })
    }

    /// Classify `token` and append its highlight, if any, to `batch`.
    pub fn classify_into(
        &mut self,
        token: &Token<F::Cursor, F::Type>,
        batch: &mut CallBatch,
        buffer: BufferId,
        namespace: i64,
    ) -> bool {
        let Some(Classification { tag: Some(tag), .. }) = self.classify(token) else {
            return false;
        };
        let (Some(line), Some(group)) = (token.line, self.table.find_group(tag)) else {
            return false;
        };

        batch.add_highlight(
            buffer,
            namespace,
            group,
            LineSpan::new(line, token.start_col, token.end_col),
        );
        true
    }

    fn dispatch(
        &self,
        token: &Token<F::Cursor, F::Type>,
        cursor: &F::Cursor,
        can_retry: bool,
    ) -> Step<F::Cursor> {
        let base_language = self.table.language().is_base();

        let tag = match self.frontend.cursor_kind(cursor) {
            CursorKind::TypedefDecl
            | CursorKind::TypeAliasDecl
            | CursorKind::TypeAliasTemplateDecl => Some(KindTag::TYPE),

            CursorKind::TypeRef => {
                if !base_language && can_retry {
                    if let Some(decl) = self.distinct_declaration(cursor) {
                        return Step::Retry(decl);
                    }
                }
                Some(KindTag::TYPE)
            }

            CursorKind::StructDecl => Some(KindTag::STRUCT),
            CursorKind::UnionDecl => Some(KindTag::UNION),
            CursorKind::ClassDecl => self
                .name_matches(token, cursor)
                .then_some(KindTag::CLASS),
            CursorKind::EnumDecl => Some(KindTag::ENUM),
            CursorKind::EnumConstantDecl | CursorKind::FlagEnum => Some(KindTag::ENUM_CONST),

            CursorKind::FieldDecl | CursorKind::MemberRef => Some(KindTag::MEMBER),
            CursorKind::MemberRefExpr => {
                let unexposed = token
                    .resolved_type
                    .as_ref()
                    .is_some_and(|ty| self.frontend.canonical_type_kind(ty) == TypeKind::Unexposed);
                if unexposed && !base_language {
                    Some(KindTag::METHOD)
                } else {
                    Some(KindTag::MEMBER)
                }
            }

            CursorKind::CxxMethod
            | CursorKind::Constructor
            | CursorKind::Destructor
            | CursorKind::ConversionFunction => Some(KindTag::METHOD),

            CursorKind::FunctionDecl | CursorKind::CallExpr | CursorKind::FunctionTemplate => {
                Some(KindTag::FUNCTION)
            }

            CursorKind::ClassTemplate => Some(KindTag::CLASS),
            CursorKind::TemplateTypeParameter => Some(KindTag::TYPE),
            CursorKind::NonTypeTemplateParameter => None,
            CursorKind::TemplateRef => Some(KindTag::TEMPLATE),

            CursorKind::Namespace => self
                .name_matches(token, cursor)
                .then_some(KindTag::NAMESPACE),
            CursorKind::NamespaceAlias | CursorKind::NamespaceRef => Some(KindTag::NAMESPACE),

            // Definition cursors also show up outside `#define`; only trust
            // them right after a directive.
            CursorKind::MacroDefinition => {
                let after_directive = self.previous == Some(CursorKind::PreprocessingDirective);
                after_directive.then_some(KindTag::PREPROC)
            }
            CursorKind::MacroExpansion => Some(KindTag::PREPROC),

            CursorKind::DeclRefExpr => {
                let type_kind = token
                    .resolved_type
                    .as_ref()
                    .map(|ty| self.frontend.type_kind(ty));
                match type_kind {
                    Some(TypeKind::Enum) => Some(KindTag::ENUM_CONST),
                    Some(TypeKind::FunctionProto) if token.token_kind == TokenKind::Punctuation => {
                        Some(KindTag::OVERLOADED_OP)
                    }
                    Some(TypeKind::FunctionProto) => Some(KindTag::FUNCTION),
                    _ => None,
                }
            }

            _ => None,
        };

        Step::Done(tag)
    }

    fn distinct_declaration(&self, cursor: &F::Cursor) -> Option<F::Cursor> {
        let decl = self.frontend.referenced(cursor)?;
        if decl == *cursor || self.frontend.cursor_kind(&decl) == CursorKind::NoDeclFound {
            return None;
        }
        Some(decl)
    }

    /// Attributes next to a declaration get the declaration's cursor; accept
    /// the token only when it actually spells the declared name.
    fn name_matches(&self, token: &Token<F::Cursor, F::Type>, cursor: &F::Cursor) -> bool {
        if self.frontend.cursor_spelling(cursor) == token.text {
            return true;
        }

        token
            .resolved_type
            .as_ref()
            .and_then(|ty| self.frontend.type_declaration(ty))
            .is_some_and(|decl| self.frontend.display_name(&decl) == token.text)
    }
}

/// Classify a whole token stream into `batch`, returning the number of
/// highlights emitted.
pub fn classify_tokens<F: SyntaxFrontend>(
    frontend: &F,
    table: &GroupTable,
    tokens: &[Token<F::Cursor, F::Type>],
    batch: &mut CallBatch,
    buffer: BufferId,
    namespace: i64,
) -> usize {
    let mut classifier = Classifier::new(frontend, table);
    tokens
        .iter()
        .filter(|token| classifier.classify_into(token, batch, buffer, namespace))
        .count()
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/highlight/classify.rs"]
mod tests;
