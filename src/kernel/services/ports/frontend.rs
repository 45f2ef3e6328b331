//! Compiler frontend contract consumed by the classifier.

use compact_str::CompactString;

/// Syntactic kind of a cursor, as reported by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    TypedefDecl,
    TypeAliasDecl,
    TypeAliasTemplateDecl,
    TypeRef,
    StructDecl,
    UnionDecl,
    ClassDecl,
    EnumDecl,
    EnumConstantDecl,
    FlagEnum,
    FieldDecl,
    MemberRef,
    MemberRefExpr,
    CxxMethod,
    Constructor,
    Destructor,
    ConversionFunction,
    FunctionDecl,
    CallExpr,
    FunctionTemplate,
    ClassTemplate,
    TemplateTypeParameter,
    NonTypeTemplateParameter,
    TemplateRef,
    Namespace,
    NamespaceAlias,
    NamespaceRef,
    MacroDefinition,
    MacroExpansion,
    PreprocessingDirective,
    DeclRefExpr,
    OverloadedDeclRef,
    ParmDecl,
    NoDeclFound,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Invalid,
    Unexposed,
    Enum,
    FunctionProto,
    Typedef,
    Record,
    Int,
    Other,
}

/// Lexical class of the token text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Punctuation,
    Keyword,
    Identifier,
    Literal,
    Comment,
}

/// Opaque access to a parsed translation unit.
pub trait SyntaxFrontend {
    type Cursor: Clone + PartialEq;
    type Type: Clone;

    fn cursor_kind(&self, cursor: &Self::Cursor) -> CursorKind;

    fn cursor_spelling(&self, cursor: &Self::Cursor) -> CompactString;

    fn display_name(&self, cursor: &Self::Cursor) -> CompactString;

    /// Declaration a reference cursor points at, if the frontend found one.
    fn referenced(&self, cursor: &Self::Cursor) -> Option<Self::Cursor>;

    fn type_kind(&self, ty: &Self::Type) -> TypeKind;

    fn canonical_type_kind(&self, ty: &Self::Type) -> TypeKind;

    /// Declaration cursor of a type, if it has one.
    fn type_declaration(&self, ty: &Self::Type) -> Option<Self::Cursor>;
}

/// One lexical unit produced by a frontend walk.
#[derive(Debug, Clone)]
pub struct Token<C, T> {
    pub cursor: C,
    pub resolved_type: Option<T>,
    pub token_kind: TokenKind,
    pub text: CompactString,
    /// `None` when the token does not map to a line of the main file.
    pub line: Option<u32>,
    pub start_col: u32,
    pub end_col: u32,
}

/// Token shape produced by a given frontend.
pub type FrontendToken<F> = Token<<F as SyntaxFrontend>::Cursor, <F as SyntaxFrontend>::Type>;
