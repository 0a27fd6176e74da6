use crate::ast::{Ast, BasicType, BinOp, DataType, Lit, NodeID, NodeKind, ScopeID, TypeRef, UnOp};
use crate::error::{Reporter, SourceRange};
use crate::session::FileID;
use crate::text::TextRange;
use rustc_hash::FxHashSet;

/// Semantic analysis over the whole parsed set: declares symbols and
/// builds the scope tree, resolves declared types, then walks bodies
/// resolving names and computing expression value types. Analysis is
/// best-effort; unresolved pieces get `DataType::Invalid` and are never
/// reported twice.
pub fn run(ast: &mut Ast, reporter: &mut Reporter, usings: &[String]) -> ScopeID {
    let root = ast.add_scope(None, None);
    let mut cx = Check {
        ast,
        reporter,
        root,
        usings: usings.to_vec(),
        used: FxHashSet::default(),
        current_class: None,
    };

    let roots: Vec<NodeID> = cx.ast.roots().to_vec();
    for &file in &roots {
        cx.declare_file(file);
    }
    cx.resolve_symbol_types();
    for &file in &roots {
        cx.resolve_file(file);
    }
    root
}

struct Check<'a> {
    ast: &'a mut Ast,
    reporter: &'a mut Reporter,
    root: ScopeID,
    usings: Vec<String>,
    used: FxHashSet<NodeID>,
    current_class: Option<NodeID>,
}

impl<'a> Check<'a> {
    fn src(&self, id: NodeID) -> SourceRange {
        let node = self.ast.node(id);
        let range = node.range.unwrap_or(TextRange::empty_at(0.into()));
        SourceRange::new(range, node.file_id)
    }

    //==================== PASS 1: DECLARE ====================

    fn declare_file(&mut self, file: NodeID) {
        let NodeKind::File { decls } = &self.ast.node(file).kind else {
            return;
        };
        let decls = decls.clone();
        for decl in decls {
            self.declare_decl(self.root, decl);
        }
    }

    fn declare_decl(&mut self, scope: ScopeID, id: NodeID) {
        match &self.ast.node(id).kind {
            NodeKind::Using { name } => {
                let name = name.clone();
                if !self.usings.contains(&name) {
                    self.usings.push(name);
                }
            }
            NodeKind::Namespace { name, members, .. }
            | NodeKind::Class { name, members, .. }
            | NodeKind::Interface { name, members, .. }
            | NodeKind::Struct { name, members, .. }
            | NodeKind::Enum { name, members, .. }
            | NodeKind::ErrorDomain { name, members, .. } => {
                let name = name.clone();
                let members = members.clone();
                self.declare_symbol(scope, id, &name);
                let body = self.ast.add_scope(Some(scope), Some(id));
                self.set_body_scope(id, body);
                for member in members {
                    self.declare_decl(body, member);
                }
            }
            NodeKind::Method { name, params, .. } => {
                let name = name.clone();
                let params = params.clone();
                self.declare_symbol(scope, id, &name);
                let body = self.ast.add_scope(Some(scope), Some(id));
                self.set_body_scope(id, body);
                for param in params {
                    let param_name = self.ast.symbol_name(param).unwrap_or("").to_string();
                    self.declare_symbol(body, param, &param_name);
                }
            }
            NodeKind::EnumValue { name }
            | NodeKind::ErrorCode { name }
            | NodeKind::Delegate { name, .. }
            | NodeKind::Field { name, .. }
            | NodeKind::Property { name, .. }
            | NodeKind::Signal { name, .. }
            | NodeKind::Constant { name, .. } => {
                let name = name.clone();
                self.declare_symbol(scope, id, &name);
            }
            // top-level statements (including locals) resolve later, in
            // source order
            _ => {}
        }
    }

    fn declare_symbol(&mut self, scope: ScopeID, id: NodeID, name: &str) {
        self.ast.node_mut(id).owner_scope = Some(scope);
        if name.is_empty() {
            return;
        }
        if self.ast.scope_mut(scope).insert(name, id).is_some() {
            let src = self.src(id);
            self.reporter.error(
                format!("the name `{name}` is already declared in this scope"),
                src,
            );
        }
    }

    fn set_body_scope(&mut self, id: NodeID, scope: ScopeID) {
        match &mut self.ast.node_mut(id).kind {
            NodeKind::Namespace { body_scope, .. }
            | NodeKind::Class { body_scope, .. }
            | NodeKind::Interface { body_scope, .. }
            | NodeKind::Struct { body_scope, .. }
            | NodeKind::Enum { body_scope, .. }
            | NodeKind::ErrorDomain { body_scope, .. }
            | NodeKind::Method { body_scope, .. }
            | NodeKind::Block { body_scope, .. } => *body_scope = Some(scope),
            _ => {}
        }
    }

    //==================== PASS 1.5: DECLARED TYPES ====================

    /// Resolves the declared type of every symbol before bodies are
    /// walked, so forward references type-check regardless of order.
    fn resolve_symbol_types(&mut self) {
        for index in 0..self.ast.node_count() {
            let id = NodeID::new(index);
            let Some(scope) = self.ast.node(id).owner_scope else {
                continue;
            };
            let ty = match &self.ast.node(id).kind {
                NodeKind::Field { ty, .. }
                | NodeKind::Property { ty, .. }
                | NodeKind::Constant { ty, .. }
                | NodeKind::Param { ty, .. } => Some(ty.clone()),
                NodeKind::Method { ret, .. }
                | NodeKind::Delegate { ret, .. }
                | NodeKind::Signal { ret, .. } => Some(ret.clone()),
                NodeKind::EnumValue { .. } => {
                    let owner = self.ast.scope(scope).owner;
                    self.ast.node_mut(id).value_type = owner.map(DataType::Value);
                    None
                }
                NodeKind::ErrorCode { .. } => {
                    let owner = self.ast.scope(scope).owner;
                    self.ast.node_mut(id).value_type = owner.map(DataType::Error);
                    None
                }
                _ => None,
            };
            if let Some(ty) = ty {
                let file_id = self.ast.node(id).file_id;
                let resolved = self.resolve_type(&ty, scope, Some(file_id));
                self.ast.node_mut(id).value_type = Some(resolved);
            }
        }
    }

    fn resolve_type(&mut self, ty: &TypeRef, from: ScopeID, report: Option<FileID>) -> DataType {
        let mut dt = self.resolve_type_name(ty, from, report);
        for _ in 0..ty.pointer {
            dt = DataType::Pointer(Box::new(dt));
        }
        dt
    }

    fn resolve_type_name(&mut self, ty: &TypeRef, from: ScopeID, report: Option<FileID>) -> DataType {
        if ty.segs.len() == 1 {
            if ty.segs[0] == "void" {
                return DataType::Void;
            }
            if let Some(basic) = BasicType::from_name(&ty.segs[0]) {
                return DataType::Basic(basic);
            }
        }

        let mut symbol = self.lookup_chain(from, &ty.segs[0]);
        for seg in &ty.segs[1..] {
            symbol = symbol
                .and_then(|sym| self.ast.body_scope(sym))
                .and_then(|scope| self.ast.scope(scope).lookup(seg));
        }

        let resolved = symbol.and_then(|sym| match self.ast.node(sym).kind {
            NodeKind::Class { .. } | NodeKind::Interface { .. } => Some(DataType::Object(sym)),
            NodeKind::Struct { .. } | NodeKind::Enum { .. } => Some(DataType::Value(sym)),
            NodeKind::ErrorDomain { .. } => Some(DataType::Error(sym)),
            NodeKind::Delegate { .. } => Some(DataType::Delegate(sym)),
            _ => None,
        });
        match resolved {
            Some(dt) => dt,
            None => {
                if let (Some(file_id), Some(range)) = (report, ty.range) {
                    let name = ty.display();
                    self.reporter.error(
                        format!("unknown type name `{name}`"),
                        SourceRange::new(range, file_id),
                    );
                }
                DataType::Invalid
            }
        }
    }

    /// Walks `scope` and its parents, then the implicit using namespaces.
    fn lookup_chain(&self, from: ScopeID, name: &str) -> Option<NodeID> {
        let mut current = Some(from);
        while let Some(scope_id) = current {
            let scope = self.ast.scope(scope_id);
            if let Some(symbol) = scope.lookup(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        for using in &self.usings {
            let namespace = self.ast.scope(self.root).lookup(using);
            let found = namespace
                .and_then(|ns| self.ast.body_scope(ns))
                .and_then(|scope| self.ast.scope(scope).lookup(name));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    //==================== PASS 2: RESOLVE BODIES ====================

    fn resolve_file(&mut self, file: NodeID) {
        let NodeKind::File { decls } = &self.ast.node(file).kind else {
            return;
        };
        let decls = decls.clone();
        for decl in decls {
            self.resolve_decl(self.root, decl);
        }
    }

    fn resolve_decl(&mut self, scope: ScopeID, id: NodeID) {
        match &self.ast.node(id).kind {
            NodeKind::Namespace { members, .. }
            | NodeKind::Struct { members, .. }
            | NodeKind::Enum { members, .. }
            | NodeKind::ErrorDomain { members, .. } => {
                let members = members.clone();
                let body = self.ast.body_scope(id).unwrap_or(scope);
                for member in members {
                    self.resolve_decl(body, member);
                }
            }
            NodeKind::Class { members, .. } | NodeKind::Interface { members, .. } => {
                let members = members.clone();
                let body = self.ast.body_scope(id).unwrap_or(scope);
                let previous = self.current_class.replace(id);
                for member in members {
                    self.resolve_decl(body, member);
                }
                self.current_class = previous;
            }
            NodeKind::Method { body, .. } => {
                let body = *body;
                let method_scope = self.ast.body_scope(id).unwrap_or(scope);
                if let Some(body) = body {
                    self.resolve_stmt(method_scope, body);
                }
            }
            NodeKind::Field { value, .. } | NodeKind::Constant { value, .. } => {
                if let Some(value) = *value {
                    self.resolve_expr(scope, value);
                }
            }
            NodeKind::Using { .. }
            | NodeKind::EnumValue { .. }
            | NodeKind::ErrorCode { .. }
            | NodeKind::Delegate { .. }
            | NodeKind::Property { .. }
            | NodeKind::Signal { .. }
            | NodeKind::Param { .. } => {}
            // a top-level statement, resolved in the file's root scope
            _ => self.resolve_stmt(scope, id),
        }
    }

    fn resolve_stmt(&mut self, scope: ScopeID, id: NodeID) {
        match &self.ast.node(id).kind {
            NodeKind::Block { stmts, .. } => {
                let stmts = stmts.clone();
                let block_scope = self.ast.add_scope(Some(scope), Some(id));
                self.set_body_scope(id, block_scope);
                for stmt in &stmts {
                    self.resolve_stmt(block_scope, *stmt);
                }
                for stmt in &stmts {
                    self.warn_unused_local(*stmt);
                }
            }
            NodeKind::Local { .. } => self.resolve_local(scope, id),
            NodeKind::If { cond, then_branch, else_branch } => {
                let (cond, then_branch, else_branch) = (*cond, *then_branch, *else_branch);
                self.resolve_expr(scope, cond);
                self.resolve_stmt(scope, then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(scope, else_branch);
                }
            }
            NodeKind::While { cond, body } => {
                let (cond, body) = (*cond, *body);
                self.resolve_expr(scope, cond);
                self.resolve_stmt(scope, body);
            }
            NodeKind::For { init, cond, step, body } => {
                let (init, cond, step, body) = (*init, *cond, *step, *body);
                if let Some(init) = init {
                    self.resolve_stmt(scope, init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(scope, cond);
                }
                if let Some(step) = step {
                    self.resolve_expr(scope, step);
                }
                self.resolve_stmt(scope, body);
            }
            NodeKind::Return { value } => {
                if let Some(value) = *value {
                    self.resolve_expr(scope, value);
                }
            }
            _ => {
                self.resolve_expr(scope, id);
            }
        }
    }

    fn resolve_local(&mut self, scope: ScopeID, id: NodeID) {
        let NodeKind::Local { name, ty, value } = &self.ast.node(id).kind else {
            return;
        };
        let name = name.clone();
        let ty = ty.clone();
        let value = *value;

        let file_id = self.ast.node(id).file_id;
        let value_ty = value.map(|value| self.resolve_expr(scope, value));
        let declared = match ty {
            Some(ty) => self.resolve_type(&ty, scope, Some(file_id)),
            None => value_ty.unwrap_or(DataType::Invalid),
        };
        self.ast.node_mut(id).value_type = Some(declared);
        self.declare_symbol(scope, id, &name);
    }

    fn warn_unused_local(&mut self, id: NodeID) {
        let NodeKind::Local { name, .. } = &self.ast.node(id).kind else {
            return;
        };
        if !self.used.contains(&id) {
            let name = name.clone();
            let src = self.src(id);
            self.reporter.warning(format!("local variable `{name}` is never used"), src);
        }
    }

    fn resolve_expr(&mut self, scope: ScopeID, id: NodeID) -> DataType {
        let dt = self.resolve_expr_inner(scope, id);
        self.ast.node_mut(id).value_type = Some(dt.clone());
        dt
    }

    fn resolve_expr_inner(&mut self, scope: ScopeID, id: NodeID) -> DataType {
        match &self.ast.node(id).kind {
            NodeKind::Ident { name } => {
                let name = name.clone();
                match self.lookup_chain(scope, &name) {
                    Some(symbol) => {
                        self.ast.node_mut(id).symbol = Some(symbol);
                        self.mark_used(symbol);
                        self.symbol_value_type(symbol)
                    }
                    None => {
                        let src = self.src(id);
                        self.reporter.error(
                            format!("the name `{name}` does not exist in this scope"),
                            src,
                        );
                        DataType::Invalid
                    }
                }
            }
            NodeKind::This => match self.current_class {
                Some(class) => DataType::Object(class),
                None => DataType::Invalid,
            },
            NodeKind::Literal { lit } => match lit {
                Lit::Int(_) => DataType::Basic(BasicType::Int),
                Lit::Real(_) => DataType::Basic(BasicType::Double),
                Lit::Char(_) => DataType::Basic(BasicType::Char),
                Lit::Str(_) => DataType::Basic(BasicType::Str),
                Lit::Bool(_) => DataType::Basic(BasicType::Bool),
                Lit::Null => DataType::Null,
            },
            NodeKind::MemberAccess { inner, member, pointer } => {
                let (inner, member, pointer) = (*inner, member.clone(), *pointer);
                let inner_ty = self.resolve_expr(scope, inner);
                if member.is_empty() {
                    return DataType::Invalid;
                }

                // static access goes through the type symbol itself
                let inner_symbol = self.ast.node(inner).symbol;
                let container = match inner_symbol {
                    Some(sym)
                        if self.ast.is_type_symbol(sym)
                            || matches!(self.ast.node(sym).kind, NodeKind::Namespace { .. }) =>
                    {
                        Some(sym)
                    }
                    _ => {
                        let value_ty = if pointer {
                            match inner_ty {
                                DataType::Pointer(inner) => *inner,
                                other => other,
                            }
                        } else {
                            inner_ty
                        };
                        value_ty.type_symbol()
                    }
                };

                let Some(container) = container else {
                    return DataType::Invalid;
                };
                let found = self
                    .ast
                    .body_scope(container)
                    .and_then(|body| self.ast.scope(body).lookup(&member));
                match found {
                    Some(symbol) => {
                        self.ast.node_mut(id).symbol = Some(symbol);
                        self.mark_used(symbol);
                        self.symbol_value_type(symbol)
                    }
                    None => {
                        let container_name =
                            self.ast.symbol_name(container).unwrap_or("?").to_string();
                        let src = self.src(id);
                        self.reporter.error(
                            format!("no member `{member}` in `{container_name}`"),
                            src,
                        );
                        DataType::Invalid
                    }
                }
            }
            NodeKind::PointerIndirection { inner } => {
                let inner = *inner;
                match self.resolve_expr(scope, inner) {
                    DataType::Pointer(pointee) => *pointee,
                    _ => DataType::Invalid,
                }
            }
            NodeKind::AddressOf { inner } => {
                let inner = *inner;
                let inner_ty = self.resolve_expr(scope, inner);
                DataType::Pointer(Box::new(inner_ty))
            }
            NodeKind::Call { callee, args } => {
                let (callee, args) = (*callee, args.clone());
                let callee_ty = self.resolve_expr(scope, callee);
                for arg in args {
                    self.resolve_expr(scope, arg);
                }
                let target = match self.ast.node(callee).symbol {
                    Some(sym)
                        if matches!(
                            self.ast.node(sym).kind,
                            NodeKind::Method { .. }
                                | NodeKind::Delegate { .. }
                                | NodeKind::Signal { .. }
                        ) =>
                    {
                        Some(sym)
                    }
                    _ => match callee_ty {
                        DataType::Delegate(delegate) => Some(delegate),
                        _ => None,
                    },
                };
                target
                    .and_then(|sym| self.ast.node(sym).value_type.clone())
                    .unwrap_or(DataType::Invalid)
            }
            NodeKind::ObjectCreation { ty, args } => {
                let (ty, args) = (ty.clone(), args.clone());
                let file_id = self.ast.node(id).file_id;
                for arg in args {
                    self.resolve_expr(scope, arg);
                }
                self.resolve_type(&ty, scope, Some(file_id))
            }
            NodeKind::Unary { op, rhs } => {
                let (op, rhs) = (*op, *rhs);
                let rhs_ty = self.resolve_expr(scope, rhs);
                match op {
                    UnOp::Neg => rhs_ty,
                    UnOp::Not => DataType::Basic(BasicType::Bool),
                }
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                let lhs_ty = self.resolve_expr(scope, lhs);
                self.resolve_expr(scope, rhs);
                match op {
                    BinOp::CmpEq
                    | BinOp::CmpNotEq
                    | BinOp::CmpLt
                    | BinOp::CmpLtEq
                    | BinOp::CmpGt
                    | BinOp::CmpGtEq
                    | BinOp::LogicAnd
                    | BinOp::LogicOr => DataType::Basic(BasicType::Bool),
                    _ => lhs_ty,
                }
            }
            NodeKind::Assign { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                let lhs_ty = self.resolve_expr(scope, lhs);
                self.resolve_expr(scope, rhs);
                lhs_ty
            }
            _ => DataType::Invalid,
        }
    }

    fn mark_used(&mut self, symbol: NodeID) {
        if matches!(self.ast.node(symbol).kind, NodeKind::Local { .. }) {
            self.used.insert(symbol);
        }
    }

    /// Type an identifier referring to `symbol` evaluates to. Methods,
    /// delegates and type symbols yield no value type; calls and static
    /// access read those symbols directly.
    fn symbol_value_type(&self, symbol: NodeID) -> DataType {
        match self.ast.node(symbol).kind {
            NodeKind::Field { .. }
            | NodeKind::Property { .. }
            | NodeKind::Constant { .. }
            | NodeKind::Param { .. }
            | NodeKind::Local { .. }
            | NodeKind::EnumValue { .. }
            | NodeKind::ErrorCode { .. } => {
                self.ast.node(symbol).value_type.clone().unwrap_or(DataType::Invalid)
            }
            _ => DataType::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::session::FileID;

    fn analyze(text: &str) -> (Ast, Reporter) {
        let mut ast = Ast::new();
        let mut reporter = Reporter::new();
        parser::parse_file(&mut ast, &mut reporter, FileID::new(0), text);
        run(&mut ast, &mut reporter, &[]);
        (ast, reporter)
    }

    fn find_ident(ast: &Ast, name: &str) -> Option<NodeID> {
        (0..ast.node_count()).map(NodeID::new).find(|&id| {
            matches!(&ast.node(id).kind, NodeKind::Ident { name: n } if n == name)
        })
    }

    #[test]
    fn local_reference_resolves_to_declaration() {
        let (ast, reporter) = analyze("int x = 3;\nreturn x;\n");
        assert!(!reporter.did_error());
        let reference = find_ident(&ast, "x").unwrap();
        let symbol = ast.node(reference).symbol.unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::Local { .. }));
    }

    #[test]
    fn undeclared_name_reports_one_error() {
        let (_, reporter) = analyze("void main () {\n    undeclared_name = 1;\n}\n");
        assert_eq!(reporter.errors().len(), 1);
        assert!(reporter.errors()[0].msg().contains("undeclared_name"));
    }

    #[test]
    fn member_access_resolves_through_receiver_type() {
        let (ast, reporter) = analyze(
            "class Foo { public int a; public void bar () { } }\n\
             void main () {\n    Foo f = new Foo ();\n    f.bar ();\n}\n",
        );
        assert!(!reporter.did_error(), "errors: {:?}", reporter.errors().first().map(|d| d.msg()));
        let access = (0..ast.node_count()).map(NodeID::new).find(|&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { member, .. } if member == "bar")
        });
        let symbol = ast.node(access.unwrap()).symbol.unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::Method { .. }));
    }

    #[test]
    fn enum_value_static_access() {
        let (ast, reporter) = analyze(
            "enum Color { RED, GREEN }\nvoid main () {\n    var c = Color.RED;\n    c = Color.GREEN;\n}\n",
        );
        assert!(!reporter.did_error());
        let access = (0..ast.node_count()).map(NodeID::new).find(|&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { member, .. } if member == "RED")
        });
        let symbol = ast.node(access.unwrap()).symbol.unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::EnumValue { .. }));
    }

    #[test]
    fn unused_local_warns() {
        let (_, reporter) = analyze("void main () {\n    int unused = 1;\n}\n");
        assert!(!reporter.did_error());
        assert_eq!(reporter.warnings().len(), 1);
        assert!(reporter.warnings()[0].msg().contains("unused"));
    }

    #[test]
    fn pointer_member_access_unwraps() {
        let (ast, reporter) = analyze(
            "class Foo { public int a; }\nFoo* p;\nint v = p->a;\n",
        );
        assert!(!reporter.did_error());
        let access = (0..ast.node_count()).map(NodeID::new).find(|&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { pointer: true, .. })
        });
        let symbol = ast.node(access.unwrap()).symbol.unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::Field { .. }));
    }

    #[test]
    fn using_namespace_fallback() {
        let (ast, reporter) = analyze(
            "namespace Sys { class Log { public void write () { } } }\n\
             using Sys;\nLog l = new Log ();\nl.write ();\n",
        );
        assert!(!reporter.did_error(), "errors: {:?}", reporter.errors().first().map(|d| d.msg()));
        let access = (0..ast.node_count()).map(NodeID::new).find(|&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { member, .. } if member == "write")
        });
        let symbol = ast.node(access.unwrap()).symbol.unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::Method { .. }));
    }

    #[test]
    fn forward_reference_to_later_method() {
        let (_, reporter) = analyze(
            "void main () {\n    helper ();\n}\nvoid helper () { }\n",
        );
        assert!(!reporter.did_error());
    }
}
