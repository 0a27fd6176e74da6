use crate::session::FileID;
use crate::text::TextRange;
use rustc_hash::FxHashMap;

id_impl!(NodeID);
id_impl!(ScopeID);

/// Tree produced by one analysis cycle: a flat node table, a scope table
/// and one `File` root per analyzed source file. Name references and
/// value types are filled in by `check` after construction.
pub struct Ast {
    nodes: Vec<Node>,
    scopes: Vec<Scope>,
    roots: Vec<NodeID>,
}

pub struct Node {
    pub kind: NodeKind,
    pub file_id: FileID,
    pub range: Option<TextRange>,
    /// scope this symbol was declared in (symbol declarations only)
    pub owner_scope: Option<ScopeID>,
    /// resolved declaration, for name references
    pub symbol: Option<NodeID>,
    /// expression value type, or the declared type of a variable symbol
    pub value_type: Option<DataType>,
}

pub enum NodeKind {
    File { decls: Vec<NodeID> },
    Using { name: String },

    Namespace { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    Class { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    Interface { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    Struct { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    Enum { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    EnumValue { name: String },
    ErrorDomain { name: String, members: Vec<NodeID>, body_scope: Option<ScopeID> },
    ErrorCode { name: String },
    Delegate { name: String, ret: TypeRef, params: Vec<NodeID> },
    Method { name: String, ret: TypeRef, params: Vec<NodeID>, body: Option<NodeID>, body_scope: Option<ScopeID> },
    Field { name: String, ty: TypeRef, value: Option<NodeID> },
    Property { name: String, ty: TypeRef },
    Signal { name: String, ret: TypeRef, params: Vec<NodeID> },
    Constant { name: String, ty: TypeRef, value: Option<NodeID> },
    Param { name: String, ty: TypeRef },
    Local { name: String, ty: Option<TypeRef>, value: Option<NodeID> },

    Block { stmts: Vec<NodeID>, body_scope: Option<ScopeID> },
    If { cond: NodeID, then_branch: NodeID, else_branch: Option<NodeID> },
    While { cond: NodeID, body: NodeID },
    For { init: Option<NodeID>, cond: Option<NodeID>, step: Option<NodeID>, body: NodeID },
    Return { value: Option<NodeID> },

    Ident { name: String },
    MemberAccess { inner: NodeID, member: String, pointer: bool },
    PointerIndirection { inner: NodeID },
    AddressOf { inner: NodeID },
    Call { callee: NodeID, args: Vec<NodeID> },
    ObjectCreation { ty: TypeRef, args: Vec<NodeID> },
    Literal { lit: Lit },
    Unary { op: UnOp, rhs: NodeID },
    Binary { op: BinOp, lhs: NodeID, rhs: NodeID },
    Assign { lhs: NodeID, rhs: NodeID },
    This,
}

/// A type as written in source, resolved to a `DataType` during analysis.
#[derive(Clone)]
pub struct TypeRef {
    pub segs: Vec<String>,
    pub pointer: u32,
    pub nullable: bool,
    pub array: bool,
    pub range: Option<TextRange>,
}

#[derive(Clone)]
pub enum Lit {
    Int(u64),
    Real(f64),
    Char(char),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Copy, Clone, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Copy, Clone, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    CmpEq,
    CmpNotEq,
    CmpLt,
    CmpLtEq,
    CmpGt,
    CmpGtEq,
    LogicAnd,
    LogicOr,
}

/// Resolved static type of an expression or variable.
#[derive(Clone, PartialEq)]
pub enum DataType {
    Invalid,
    Void,
    Null,
    Basic(BasicType),
    /// class or interface symbol
    Object(NodeID),
    /// struct or enum symbol
    Value(NodeID),
    /// error domain symbol
    Error(NodeID),
    Delegate(NodeID),
    Pointer(Box<DataType>),
}

#[derive(Copy, Clone, PartialEq)]
pub enum BasicType {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    SizeT,
    SSizeT,
    Str,
}

pub struct Scope {
    pub parent: Option<ScopeID>,
    pub owner: Option<NodeID>,
    symbols: FxHashMap<String, NodeID>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast { nodes: Vec::new(), scopes: Vec::new(), roots: Vec::new() }
    }

    #[inline]
    pub fn node(&self, id: NodeID) -> &Node {
        &self.nodes[id.index()]
    }
    #[inline]
    pub fn node_mut(&mut self, id: NodeID) -> &mut Node {
        &mut self.nodes[id.index()]
    }
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn add_node(&mut self, kind: NodeKind, file_id: FileID, range: Option<TextRange>) -> NodeID {
        let id = NodeID::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            file_id,
            range,
            owner_scope: None,
            symbol: None,
            value_type: None,
        });
        id
    }

    pub fn add_root(&mut self, root: NodeID) {
        self.roots.push(root);
    }
    #[inline]
    pub fn roots(&self) -> &[NodeID] {
        &self.roots
    }
    pub fn file_root(&self, file_id: FileID) -> Option<NodeID> {
        self.roots.iter().copied().find(|&id| self.node(id).file_id == file_id)
    }

    #[inline]
    pub fn scope(&self, id: ScopeID) -> &Scope {
        &self.scopes[id.index()]
    }
    #[inline]
    pub fn scope_mut(&mut self, id: ScopeID) -> &mut Scope {
        &mut self.scopes[id.index()]
    }
    #[inline]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn add_scope(&mut self, parent: Option<ScopeID>, owner: Option<NodeID>) -> ScopeID {
        let id = ScopeID::new(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            owner,
            symbols: FxHashMap::default(),
        });
        id
    }

    /// Invokes `f` on every syntactic child of `id`, uniformly for every
    /// node kind.
    pub fn for_each_child(&self, id: NodeID, f: &mut impl FnMut(NodeID)) {
        match &self.node(id).kind {
            NodeKind::File { decls } => decls.iter().copied().for_each(f),
            NodeKind::Using { .. } => {}
            NodeKind::Namespace { members, .. }
            | NodeKind::Class { members, .. }
            | NodeKind::Interface { members, .. }
            | NodeKind::Struct { members, .. }
            | NodeKind::Enum { members, .. }
            | NodeKind::ErrorDomain { members, .. } => members.iter().copied().for_each(f),
            NodeKind::EnumValue { .. } | NodeKind::ErrorCode { .. } => {}
            NodeKind::Delegate { params, .. } | NodeKind::Signal { params, .. } => {
                params.iter().copied().for_each(f)
            }
            NodeKind::Method { params, body, .. } => {
                params.iter().copied().for_each(&mut *f);
                if let Some(body) = body {
                    f(*body);
                }
            }
            NodeKind::Property { .. } | NodeKind::Param { .. } => {}
            NodeKind::Field { value, .. }
            | NodeKind::Constant { value, .. }
            | NodeKind::Local { value, .. } => {
                if let Some(value) = value {
                    f(*value);
                }
            }
            NodeKind::Block { stmts, .. } => stmts.iter().copied().for_each(f),
            NodeKind::If { cond, then_branch, else_branch } => {
                f(*cond);
                f(*then_branch);
                if let Some(else_branch) = else_branch {
                    f(*else_branch);
                }
            }
            NodeKind::While { cond, body } => {
                f(*cond);
                f(*body);
            }
            NodeKind::For { init, cond, step, body } => {
                if let Some(init) = init {
                    f(*init);
                }
                if let Some(cond) = cond {
                    f(*cond);
                }
                if let Some(step) = step {
                    f(*step);
                }
                f(*body);
            }
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    f(*value);
                }
            }
            NodeKind::Ident { .. } | NodeKind::Literal { .. } | NodeKind::This => {}
            NodeKind::MemberAccess { inner, .. }
            | NodeKind::PointerIndirection { inner }
            | NodeKind::AddressOf { inner } => f(*inner),
            NodeKind::Call { callee, args } => {
                f(*callee);
                args.iter().copied().for_each(f);
            }
            NodeKind::ObjectCreation { args, .. } => args.iter().copied().for_each(f),
            NodeKind::Unary { rhs, .. } => f(*rhs),
            NodeKind::Binary { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            NodeKind::Assign { lhs, rhs } => {
                f(*lhs);
                f(*rhs);
            }
        }
    }

    /// Declared name of a symbol node.
    pub fn symbol_name(&self, id: NodeID) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Namespace { name, .. }
            | NodeKind::Class { name, .. }
            | NodeKind::Interface { name, .. }
            | NodeKind::Struct { name, .. }
            | NodeKind::Enum { name, .. }
            | NodeKind::EnumValue { name }
            | NodeKind::ErrorDomain { name, .. }
            | NodeKind::ErrorCode { name }
            | NodeKind::Delegate { name, .. }
            | NodeKind::Method { name, .. }
            | NodeKind::Field { name, .. }
            | NodeKind::Property { name, .. }
            | NodeKind::Signal { name, .. }
            | NodeKind::Constant { name, .. }
            | NodeKind::Param { name, .. }
            | NodeKind::Local { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Scope introduced by a container, method or block node.
    pub fn body_scope(&self, id: NodeID) -> Option<ScopeID> {
        match &self.node(id).kind {
            NodeKind::Namespace { body_scope, .. }
            | NodeKind::Class { body_scope, .. }
            | NodeKind::Interface { body_scope, .. }
            | NodeKind::Struct { body_scope, .. }
            | NodeKind::Enum { body_scope, .. }
            | NodeKind::ErrorDomain { body_scope, .. }
            | NodeKind::Method { body_scope, .. }
            | NodeKind::Block { body_scope, .. } => *body_scope,
            _ => None,
        }
    }

    pub fn members(&self, id: NodeID) -> Option<&[NodeID]> {
        match &self.node(id).kind {
            NodeKind::Namespace { members, .. }
            | NodeKind::Class { members, .. }
            | NodeKind::Interface { members, .. }
            | NodeKind::Struct { members, .. }
            | NodeKind::Enum { members, .. }
            | NodeKind::ErrorDomain { members, .. } => Some(members),
            _ => None,
        }
    }

    pub fn is_type_symbol(&self, id: NodeID) -> bool {
        matches!(
            self.node(id).kind,
            NodeKind::Class { .. }
                | NodeKind::Interface { .. }
                | NodeKind::Struct { .. }
                | NodeKind::Enum { .. }
                | NodeKind::ErrorDomain { .. }
                | NodeKind::Delegate { .. }
        )
    }

    pub fn is_variable_symbol(&self, id: NodeID) -> bool {
        matches!(
            self.node(id).kind,
            NodeKind::Field { .. }
                | NodeKind::Property { .. }
                | NodeKind::Constant { .. }
                | NodeKind::Param { .. }
                | NodeKind::Local { .. }
        )
    }
}

impl Default for Ast {
    fn default() -> Ast {
        Ast::new()
    }
}

impl TypeRef {
    pub fn named(segs: Vec<String>, range: Option<TextRange>) -> TypeRef {
        TypeRef { segs, pointer: 0, nullable: false, array: false, range }
    }

    pub fn display(&self) -> String {
        let mut out = self.segs.join(".");
        if self.array {
            out.push_str("[]");
        }
        for _ in 0..self.pointer {
            out.push('*');
        }
        if self.nullable {
            out.push('?');
        }
        out
    }
}

impl DataType {
    /// The symbol backing this type, if any. Pointers are deliberately
    /// opaque here; pointer member access unwraps them explicitly.
    pub fn type_symbol(&self) -> Option<NodeID> {
        match self {
            DataType::Object(id)
            | DataType::Value(id)
            | DataType::Error(id)
            | DataType::Delegate(id) => Some(*id),
            _ => None,
        }
    }
}

impl BasicType {
    pub fn from_name(name: &str) -> Option<BasicType> {
        let basic = match name {
            "bool" => BasicType::Bool,
            "char" => BasicType::Char,
            "uchar" => BasicType::UChar,
            "short" => BasicType::Short,
            "ushort" => BasicType::UShort,
            "int" => BasicType::Int,
            "uint" => BasicType::UInt,
            "long" => BasicType::Long,
            "ulong" => BasicType::ULong,
            "int8" => BasicType::Int8,
            "int16" => BasicType::Int16,
            "int32" => BasicType::Int32,
            "int64" => BasicType::Int64,
            "uint8" => BasicType::UInt8,
            "uint16" => BasicType::UInt16,
            "uint32" => BasicType::UInt32,
            "uint64" => BasicType::UInt64,
            "float" => BasicType::Float,
            "double" => BasicType::Double,
            "size_t" => BasicType::SizeT,
            "ssize_t" => BasicType::SSizeT,
            "string" => BasicType::Str,
            _ => return None,
        };
        Some(basic)
    }
}

impl Scope {
    pub fn lookup(&self, name: &str) -> Option<NodeID> {
        self.symbols.get(name).copied()
    }

    /// Returns the previously bound symbol when `name` is already taken.
    pub fn insert(&mut self, name: &str, symbol: NodeID) -> Option<NodeID> {
        if let Some(&existing) = self.symbols.get(name) {
            return Some(existing);
        }
        self.symbols.insert(name.to_string(), symbol);
        None
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, NodeID)> {
        self.symbols.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
