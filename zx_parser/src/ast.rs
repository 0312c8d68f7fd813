//! Abstract syntax tree for the subset of C this compiler accepts.
//!
//! Every syntactic category is modeled as a tagged enum wrapped in
//! [`Spanned`], which carries the node's full textual span (covering every
//! token its children own) together with the list of keyword/punctuator
//! tokens the parser itself consumed to build this node (not its
//! children's tokens — those live on the children). That split is what
//! lets a printer walk the tree and recover the source byte-for-byte while
//! still letting each node answer "what keyword made me" without
//! re-scanning text.

use serde::{Deserialize, Serialize};
use zx_lexer::Token;
use zx_common::Span;

/// Wraps a node payload with its span and the tokens it directly owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
    pub tokens: Vec<Token>,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span, tokens: Vec<Token>) -> Self {
        Self { node, span, tokens }
    }

    pub fn first_tok(&self) -> Option<&Token> {
        self.tokens.first()
    }

    pub fn last_tok(&self) -> Option<&Token> {
        self.tokens.last()
    }
}

pub type Expr = Spanned<ExprKind>;
pub type Stmt = Spanned<StmtKind>;
pub type Decl = Spanned<DeclKind>;
pub type Declarator = Spanned<DeclaratorKind>;
pub type Specifier = Spanned<SpecifierKind>;
pub type AttributeSpec = Spanned<AttributeSpecKind>;

/// The root of a parsed file: an ordered sequence of top-level
/// declarations. Order is semantic (declaration order drives the symbol
/// index and tentative-definition merging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub items: Vec<Decl>,
}

// ---------------------------------------------------------------- exprs --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnaryKind {
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdjustKind {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral { text: String },
    CharLiteral { text: String },
    StringLiteral { text: String },
    /// Two or more adjacent string-literal tokens folded into one node.
    StringConcat { parts: Vec<Expr> },
    Identifier { name: String },
    Paren { inner: Box<Expr> },
    Binary { op: BinOpKind, lhs: Box<Expr>, rhs: Box<Expr> },
    Conditional { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    Comma { lhs: Box<Expr>, rhs: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Index { base: Box<Expr>, index: Box<Expr> },
    Deref { operand: Box<Expr> },
    AddrOf { operand: Box<Expr> },
    SizeofExpr { operand: Box<Expr> },
    SizeofType { type_name: Box<Specifier>, abstract_declarator: Option<Box<Declarator>> },
    Cast { type_name: Box<Specifier>, abstract_declarator: Option<Box<Declarator>>, operand: Box<Expr> },
    CompoundLiteral {
        type_name: Box<Specifier>,
        abstract_declarator: Option<Box<Declarator>>,
        initializers: Vec<Expr>,
    },
    Member { base: Box<Expr>, field: String },
    IndirectMember { base: Box<Expr>, field: String },
    Unary { op: UnaryKind, operand: Box<Expr> },
    Adjust { op: AdjustKind, operand: Box<Expr> },
}

// --------------------------------------------------------------- stmts --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub cond: Expr,
    pub then_branch: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Block { items: Vec<Stmt> },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_ifs: Vec<ElseIf>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch { scrutinee: Expr, body: Box<Stmt> },
    Case { value: Expr, body: Box<Stmt> },
    Default { body: Box<Stmt> },
    Label { name: String, body: Box<Stmt> },
    Goto { label: String },
    Break,
    Continue,
    Return { value: Option<Expr> },
    Null,
    Expr { expr: Expr },
    Decl { decl: Box<Decl> },
    Asm {
        qualifiers: Vec<String>,
        template: String,
        outputs: Vec<AsmOperand>,
        inputs: Vec<AsmOperand>,
        clobbers: Vec<String>,
        goto_labels: Vec<String>,
    },
    /// A bare identifier followed by `(` args `)` and a trailing body block
    /// at statement position, e.g. `repeat(3) { ... }`.
    LoopMacro { name: String, args: Vec<Expr>, body: Box<Stmt> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsmOperand {
    pub constraint: String,
    pub expr: Expr,
}

// --------------------------------------------------------------- decls --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDeclarator {
    pub declarator: Declarator,
    pub initializer: Option<Expr>,
    pub body: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclKind {
    /// `specifiers init-declarator-list ;` at file or block scope. A
    /// function body on one of the declarators makes this a definition.
    Global { specifiers: Specifier, declarators: Vec<InitDeclarator>, attributes: Vec<AttributeSpec> },
    /// A bare identifier applied like a function at declaration scope,
    /// optionally followed by declaration specifiers (a type-returning
    /// macro) rather than a body.
    Macro { name: String, args: Vec<Expr>, result_specifiers: Option<Specifier> },
    ExternC { items: Vec<Decl> },
}

// ---------------------------------------------------------- declarators --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub specifiers: Specifier,
    pub declarator: Option<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclaratorKind {
    Identifier { name: String },
    /// An abstract declarator with no identifier, used in casts, sizeof,
    /// and parameter lists for unnamed parameters.
    NoIdentifier,
    Paren { inner: Box<Declarator> },
    Pointer { qualifiers: Vec<SpecifierKind>, inner: Box<Declarator> },
    Function { inner: Box<Declarator>, params: Vec<Param>, variadic: bool },
    Array { inner: Box<Declarator>, size: Option<Box<Expr>> },
}

// ----------------------------------------------------------- specifiers --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeQualifierKind {
    Const,
    Restrict,
    Volatile,
    Atomic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicTypeKind {
    Void,
    Char,
    UnsignedChar,
    SignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    Bool,
    VaList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub specifiers: Specifier,
    pub declarator: Declarator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordKeyword {
    Struct,
    Union,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumElement {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecifierKind {
    /// The full declaration-specifier list preceding a declarator:
    /// storage class + type qualifiers + function specifiers + the type
    /// itself, in source order.
    DeclarationSpecifiers {
        storage: Vec<StorageClass>,
        qualifiers: Vec<TypeQualifierKind>,
        function_specifiers: Vec<FunctionSpecifier>,
        ty: Box<Specifier>,
    },
    /// Type qualifiers and a type with no storage class, used for cast
    /// targets, sizeof operands and parameter types.
    SpecifierQualifierList { qualifiers: Vec<TypeQualifierKind>, ty: Box<Specifier> },
    TypeQualifierList { qualifiers: Vec<TypeQualifierKind> },
    StorageClassSpecifier { class: StorageClass },
    FunctionSpecifier { spec: FunctionSpecifier },
    TypeQualifier { qualifier: TypeQualifierKind },
    BasicType { kind: BasicTypeKind },
    IdentifierType { name: String },
    Record { keyword: RecordKeyword, tag: Option<String>, fields: Option<Vec<RecordField>> },
    Enum { tag: Option<String>, elements: Option<Vec<EnumElement>> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionSpecifier {
    Inline,
}

// ---------------------------------------------------------- attributes --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeSpecKind {
    /// `__attribute__((attr, attr(args), ...))`.
    AttributeSpecifier { attributes: Vec<Attribute> },
    AttributeSpecifierList { specs: Vec<AttributeSpec> },
    /// A macro-style attribute list attached after a record tag or brace.
    MacroAttributeList { names: Vec<String> },
}

impl Expr {
    pub fn is_lvalue_shaped(&self) -> bool {
        matches!(
            self.node,
            ExprKind::Identifier { .. }
                | ExprKind::Deref { .. }
                | ExprKind::Index { .. }
                | ExprKind::Member { .. }
                | ExprKind::IndirectMember { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use zx_common::Position;

    fn dummy_span() -> Span {
        let file: Rc<str> = Rc::from("t.c");
        Span::new(Position::start(file.clone()), Position::new(file, 1, 2, 1))
    }

    #[test]
    fn spanned_exposes_owned_tokens() {
        let e = Expr::new(ExprKind::Identifier { name: "x".into() }, dummy_span(), vec![]);
        assert!(e.first_tok().is_none());
        assert_eq!(e.node, ExprKind::Identifier { name: "x".into() });
    }

    #[test]
    fn lvalue_shape_detection() {
        let ident = Expr::new(ExprKind::Identifier { name: "x".into() }, dummy_span(), vec![]);
        assert!(ident.is_lvalue_shaped());
        let lit = Expr::new(ExprKind::IntLiteral { text: "1".into() }, dummy_span(), vec![]);
        assert!(!lit.is_lvalue_shaped());
    }
}
