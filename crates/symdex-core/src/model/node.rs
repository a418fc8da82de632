//! Name-use syntax tree.
//!
//! Function bodies, initializers and type expressions are kept as a small
//! tree that records exactly what the resolver needs: every identifier use
//! with its span, the scoping structure (blocks, branches, function
//! literals) and the local bindings that shadow outer names.

use serde::{Deserialize, Serialize};

use crate::model::ParamDecl;
use crate::patch::Span;

/// A local name introduced by `:=`, `var`, `const` or `type` inside a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub span: Span,
}

/// Unary operators the resolver distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `&x`
    Ref,
    /// `*x`, also the pointer type `*T`
    Deref,
    /// `range x`
    Range,
    /// `-x`, `!x`, `<-x`, `^x`
    Other,
}

/// Composite type forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeForm {
    Slice,
    Array,
    Map,
    Chan,
    Func,
    Struct,
    Interface,
    Variadic,
}

/// One node of the name-use tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Bare identifier use.
    Ident { name: String, span: Span },
    /// `base.name`; `span` covers `name` only.
    Selector {
        base: Box<Node>,
        name: String,
        span: Span,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
    },
    /// `T{...}`; `ty` is absent for elided element types.
    Composite {
        ty: Option<Box<Node>>,
        elems: Vec<Node>,
    },
    /// `key: value` inside a composite literal.
    KeyValue {
        key: Box<Node>,
        value: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Index {
        base: Box<Node>,
        indices: Vec<Node>,
    },
    /// `x.(T)`; `ty` is absent for `x.(type)`.
    TypeAssert {
        base: Box<Node>,
        ty: Option<Box<Node>>,
    },
    /// Slice, map, func and other composite types.
    TypeExpr { form: TypeForm, parts: Vec<Node> },
    Literal { span: Span },
    FuncLit {
        params: Vec<ParamDecl>,
        results: Vec<ParamDecl>,
        body: Box<Node>,
    },
    Block { span: Span, stmts: Vec<Node> },
    /// Local declaration; names become visible after the statement.
    Define {
        names: Vec<Binding>,
        ty: Option<Box<Node>>,
        values: Vec<Node>,
    },
    Assign {
        targets: Vec<Node>,
        values: Vec<Node>,
    },
    /// `if`, `for`, `switch`, `select`: header bindings scope over body and alt.
    Branch {
        header: Vec<Node>,
        body: Box<Node>,
        alt: Option<Box<Node>>,
    },
    /// Expression statement, return values or case list.
    List { items: Vec<Node> },
}

impl Node {
    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Node::Ident {
            name: name.into(),
            span,
        }
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::List { items }
    }

    /// Name of the type this expression denotes, with pointers and type
    /// arguments stripped: `*pkg.T[int]` -> `T`.
    pub fn base_type_name(&self) -> Option<&str> {
        self.type_reference().map(|(_, name)| name)
    }

    /// Qualifier and name of a named type expression: `*pkg.T` -> `(Some("pkg"), "T")`.
    pub fn type_reference(&self) -> Option<(Option<&str>, &str)> {
        match self {
            Node::Ident { name, .. } => Some((None, name.as_str())),
            Node::Selector { base, name, .. } => match base.as_ref() {
                Node::Ident {
                    name: qualifier, ..
                } => Some((Some(qualifier.as_str()), name.as_str())),
                _ => None,
            },
            Node::Unary {
                op: UnaryOp::Deref,
                operand,
            } => operand.type_reference(),
            Node::Index { base, .. } => base.type_reference(),
            _ => None,
        }
    }

    /// Span of an identifier or selector name.
    pub fn name_span(&self) -> Option<Span> {
        match self {
            Node::Ident { span, .. } | Node::Selector { span, .. } => Some(*span),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_reference_strips_pointer_and_type_args() {
        let node = Node::Unary {
            op: UnaryOp::Deref,
            operand: Box::new(Node::Index {
                base: Box::new(Node::Selector {
                    base: Box::new(Node::ident("store", Span::new(1, 6))),
                    name: "List".to_string(),
                    span: Span::new(7, 11),
                }),
                indices: vec![Node::ident("int", Span::new(12, 15))],
            }),
        };
        assert_eq!(node.type_reference(), Some((Some("store"), "List")));
        assert_eq!(node.base_type_name(), Some("List"));
    }

    #[test]
    fn composite_types_have_no_name() {
        let node = Node::TypeExpr {
            form: TypeForm::Slice,
            parts: vec![Node::ident("A", Span::new(2, 3))],
        };
        assert_eq!(node.base_type_name(), None);
    }

    #[test]
    fn serializes_with_node_tag() {
        let json = serde_json::to_string(&Node::ident("x", Span::new(0, 1))).unwrap();
        assert!(json.contains("\"node\":\"ident\""));
    }
}
