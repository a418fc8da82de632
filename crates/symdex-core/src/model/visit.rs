//! Mutable traversal of every span (and span-anchored name) in a file.
//!
//! Edits change byte offsets; after text is spliced, a [`SpanVisitor`] walks
//! the file's declarations and syntax and moves each span to its new place.
//! Names are offered to the visitor together with their pre-visit span so a
//! rename can update a declaration's name in the same pass.

use crate::model::{
    Binding, FieldDecl, FuncDecl, ImportDecl, InterfaceMethod, Node, ParamDecl, SourceFile,
    TypeDecl, TypeKind, ValueDecl,
};
use crate::patch::Span;

/// Callback interface for [`WalkSpans`].
pub trait SpanVisitor {
    fn visit_span(&mut self, span: &mut Span);

    /// Called before `visit_span` for spans that carry a name.
    fn visit_name(&mut self, _name: &mut String, _span: Span) {}
}

/// Types whose spans can be walked.
pub trait WalkSpans {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor);
}

/// Moves every span by a fixed delta.
pub struct Shift(pub i64);

impl SpanVisitor for Shift {
    fn visit_span(&mut self, span: &mut Span) {
        *span = span.shifted(self.0);
    }
}

fn named(v: &mut dyn SpanVisitor, name: &mut String, span: &mut Span) {
    v.visit_name(name, *span);
    v.visit_span(span);
}

impl<T: WalkSpans> WalkSpans for Vec<T> {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        for item in self.iter_mut() {
            item.walk_spans(v);
        }
    }
}

impl<T: WalkSpans> WalkSpans for Option<T> {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        if let Some(item) = self {
            item.walk_spans(v);
        }
    }
}

impl<T: WalkSpans> WalkSpans for Box<T> {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        self.as_mut().walk_spans(v);
    }
}

impl WalkSpans for SourceFile {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.package_name, &mut self.package_span);
        self.imports.walk_spans(v);
        for decl in self.types.values_mut() {
            decl.walk_spans(v);
        }
        for decl in self.functions.values_mut() {
            decl.walk_spans(v);
        }
        self.methods.walk_spans(v);
        for decl in self.variables.values_mut() {
            decl.walk_spans(v);
        }
        for decl in self.constants.values_mut() {
            decl.walk_spans(v);
        }
        self.blanks.walk_spans(v);
    }
}

impl WalkSpans for ImportDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        v.visit_span(&mut self.path_span);
        if let (Some(alias), Some(span)) = (self.alias.as_mut(), self.alias_span.as_mut()) {
            named(v, alias, span);
        }
    }
}

impl WalkSpans for TypeDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.name_span);
        v.visit_span(&mut self.extent);
        match &mut self.kind {
            TypeKind::Struct { fields } => fields.walk_spans(v),
            TypeKind::Interface { methods, embeds } => {
                methods.walk_spans(v);
                embeds.walk_spans(v);
            }
            TypeKind::Other { underlying } => underlying.walk_spans(v),
        }
    }
}

impl WalkSpans for FieldDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.name_span);
        v.visit_span(&mut self.type_span);
        self.type_node.walk_spans(v);
    }
}

impl WalkSpans for InterfaceMethod {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.name_span);
        v.visit_span(&mut self.signature_span);
        self.params.walk_spans(v);
        self.results.walk_spans(v);
    }
}

impl WalkSpans for FuncDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.name_span);
        v.visit_span(&mut self.extent);
        self.receiver.walk_spans(v);
        self.params.walk_spans(v);
        self.results.walk_spans(v);
        v.visit_span(&mut self.signature_span);
        self.body.walk_spans(v);
    }
}

impl WalkSpans for ParamDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        if let (Some(name), Some(span)) = (self.name.as_mut(), self.name_span.as_mut()) {
            named(v, name, span);
        }
        v.visit_span(&mut self.type_span);
        self.type_node.walk_spans(v);
    }
}

impl WalkSpans for ValueDecl {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.name_span);
        v.visit_span(&mut self.extent);
        if let Some(span) = self.type_span.as_mut() {
            v.visit_span(span);
        }
        self.type_node.walk_spans(v);
        self.value.walk_spans(v);
    }
}

impl WalkSpans for Binding {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        named(v, &mut self.name, &mut self.span);
    }
}

impl WalkSpans for Node {
    fn walk_spans(&mut self, v: &mut dyn SpanVisitor) {
        match self {
            Node::Ident { name, span } => named(v, name, span),
            Node::Selector { base, name, span } => {
                base.walk_spans(v);
                named(v, name, span);
            }
            Node::Call { func, args } => {
                func.walk_spans(v);
                args.walk_spans(v);
            }
            Node::Composite { ty, elems } => {
                ty.walk_spans(v);
                elems.walk_spans(v);
            }
            Node::KeyValue { key, value } => {
                key.walk_spans(v);
                value.walk_spans(v);
            }
            Node::Unary { operand, .. } => operand.walk_spans(v),
            Node::Binary { lhs, rhs } => {
                lhs.walk_spans(v);
                rhs.walk_spans(v);
            }
            Node::Index { base, indices } => {
                base.walk_spans(v);
                indices.walk_spans(v);
            }
            Node::TypeAssert { base, ty } => {
                base.walk_spans(v);
                ty.walk_spans(v);
            }
            Node::TypeExpr { parts, .. } => parts.walk_spans(v),
            Node::Literal { span } => v.visit_span(span),
            Node::FuncLit {
                params,
                results,
                body,
            } => {
                params.walk_spans(v);
                results.walk_spans(v);
                body.walk_spans(v);
            }
            Node::Block { span, stmts } => {
                v.visit_span(span);
                stmts.walk_spans(v);
            }
            Node::Define { names, ty, values } => {
                names.walk_spans(v);
                ty.walk_spans(v);
                values.walk_spans(v);
            }
            Node::Assign { targets, values } => {
                targets.walk_spans(v);
                values.walk_spans(v);
            }
            Node::Branch { header, body, alt } => {
                header.walk_spans(v);
                body.walk_spans(v);
                alt.walk_spans(v);
            }
            Node::List { items } => items.walk_spans(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<(String, Span)>);

    impl SpanVisitor for Collect {
        fn visit_span(&mut self, _span: &mut Span) {}

        fn visit_name(&mut self, name: &mut String, span: Span) {
            self.0.push((name.clone(), span));
        }
    }

    #[test]
    fn shift_moves_nested_spans() {
        let mut node = Node::Call {
            func: Box::new(Node::ident("f", Span::new(10, 11))),
            args: vec![Node::Literal {
                span: Span::new(12, 13),
            }],
        };
        node.walk_spans(&mut Shift(5));
        match node {
            Node::Call { func, args } => {
                assert_eq!(func.name_span(), Some(Span::new(15, 16)));
                assert_eq!(args[0], Node::Literal { span: Span::new(17, 18) });
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn names_are_offered_with_their_spans() {
        let mut node = Node::Selector {
            base: Box::new(Node::ident("a", Span::new(0, 1))),
            name: "Read".to_string(),
            span: Span::new(2, 6),
        };
        let mut collect = Collect(Vec::new());
        node.walk_spans(&mut collect);
        assert_eq!(
            collect.0,
            vec![
                ("a".to_string(), Span::new(0, 1)),
                ("Read".to_string(), Span::new(2, 6))
            ]
        );
    }
}
