use crate::ast::{Ast, BasicType, BinOp, Lit, NodeID, NodeKind, TypeRef, UnOp};
use crate::error::{Reporter, SourceRange};
use crate::lexer::{self, Token, TokenList};
use crate::session::FileID;
use crate::text::{TextOffset, TextRange};

/// Parses one source file into the shared node table and registers its
/// `File` root. Recovery is statement-grained: a failed declaration or
/// statement is reported and skipped, everything around it survives.
pub fn parse_file(ast: &mut Ast, reporter: &mut Reporter, file_id: FileID, source: &str) -> NodeID {
    let tokens = lexer::lex(source, file_id, reporter);
    let mut p = Parser { ast, reporter, source, tokens, cursor: 0, file_id };

    let decls = decl_sequence(&mut p, false);
    let full = TextRange::new(0.into(), (source.len() as u32).into());
    let root = p.ast.add_node(NodeKind::File { decls }, file_id, Some(full));
    p.ast.add_root(root);
    root
}

struct Parser<'a, 'src> {
    ast: &'a mut Ast,
    reporter: &'a mut Reporter,
    source: &'src str,
    tokens: TokenList,
    cursor: usize,
    file_id: FileID,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn peek(&self) -> Token {
        self.tokens.token(self.cursor)
    }
    fn peek_next(&self) -> Token {
        self.tokens.token(self.cursor + 1)
    }
    fn at(&self, token: Token) -> bool {
        self.peek() == token
    }
    fn bump(&mut self) {
        if self.cursor + 2 < self.tokens.count() {
            self.cursor += 1;
        }
    }
    fn eat(&mut self, token: Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }
    fn expect(&mut self, token: Token, what: &'static str) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!("expected {what}"))
        }
    }

    fn peek_range(&self) -> TextRange {
        self.tokens.range(self.cursor)
    }
    fn mark(&self) -> TextOffset {
        self.peek_range().start()
    }
    fn prev_end(&self) -> TextOffset {
        self.tokens.range(self.cursor.saturating_sub(1)).end()
    }
    fn range_from(&self, start: TextOffset) -> TextRange {
        TextRange::new(start, start.max(self.prev_end()))
    }

    fn token_text(&self, index: usize) -> &str {
        &self.source[self.tokens.range(index).as_usize()]
    }
    /// consumes the current token and returns its text
    fn ident(&mut self) -> Result<(String, TextRange), String> {
        if self.at(Token::Ident) {
            let range = self.peek_range();
            let text = self.token_text(self.cursor).to_string();
            self.bump();
            Ok((text, range))
        } else {
            Err("expected identifier".into())
        }
    }

    fn error_here(&mut self, msg: String) {
        let src = SourceRange::new(self.peek_range(), self.file_id);
        self.reporter.error(msg, src);
    }

    fn add(&mut self, kind: NodeKind, range: TextRange) -> NodeID {
        self.ast.add_node(kind, self.file_id, Some(range))
    }
}

//==================== DECLARATIONS ====================

fn decl_sequence(p: &mut Parser, in_namespace: bool) -> Vec<NodeID> {
    let mut decls = Vec::new();
    loop {
        if p.at(Token::Eof) || (in_namespace && p.at(Token::BraceClose)) {
            break;
        }
        let before = p.cursor;
        match decl_or_stmt(p) {
            Ok(Some(id)) => decls.push(id),
            Ok(None) => {}
            Err(msg) => {
                p.error_here(msg);
                sync_stmt(p);
            }
        }
        if p.cursor == before {
            p.bump();
        }
    }
    decls
}

fn decl_or_stmt(p: &mut Parser) -> Result<Option<NodeID>, String> {
    skip_attributes(p);
    let start = p.mark();
    skip_modifiers(p);

    match p.peek() {
        Token::KwUsing => using_decl(p, start).map(Some),
        Token::KwNamespace => namespace_decl(p, start).map(Some),
        Token::KwClass => container_decl(p, start, Token::KwClass).map(Some),
        Token::KwInterface => container_decl(p, start, Token::KwInterface).map(Some),
        Token::KwStruct => container_decl(p, start, Token::KwStruct).map(Some),
        Token::KwEnum => enum_decl(p, start, false).map(Some),
        Token::KwErrordomain => enum_decl(p, start, true).map(Some),
        Token::KwDelegate => delegate_decl(p).map(Some),
        Token::KwConst => constant_decl(p).map(Some),
        _ => {
            // `T name (` at top level is a free function
            if let Some((ty, name, name_range)) = try_typed_name(p) {
                if p.at(Token::ParenOpen) {
                    return method_decl(p, start, ty, name).map(Some);
                }
                return local_decl_tail(p, Some(ty), name, name_range).map(Some);
            }
            statement(p)
        }
    }
}

fn skip_attributes(p: &mut Parser) {
    while p.at(Token::BracketOpen) {
        let mut depth = 0usize;
        loop {
            match p.peek() {
                Token::BracketOpen => depth += 1,
                Token::BracketClose => {
                    p.bump();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    continue;
                }
                Token::Eof => return,
                _ => {}
            }
            p.bump();
        }
    }
}

fn skip_modifiers(p: &mut Parser) {
    while p.peek().is_modifier() {
        p.bump();
    }
}

fn using_decl(p: &mut Parser, start: TextOffset) -> Result<NodeID, String> {
    p.bump();
    let (mut name, _) = p.ident()?;
    while p.eat(Token::Dot) {
        let (seg, _) = p.ident()?;
        name.push('.');
        name.push_str(&seg);
    }
    p.expect(Token::Semi, "`;`")?;
    Ok(p.add(NodeKind::Using { name }, p.range_from(start)))
}

fn namespace_decl(p: &mut Parser, start: TextOffset) -> Result<NodeID, String> {
    p.bump();
    let (name, _) = p.ident()?;
    p.expect(Token::BraceOpen, "`{`")?;
    let members = decl_sequence(p, true);
    p.expect(Token::BraceClose, "`}`")?;
    let range = p.range_from(start);
    Ok(p.add(NodeKind::Namespace { name, members, body_scope: None }, range))
}

fn container_decl(p: &mut Parser, start: TextOffset, keyword: Token) -> Result<NodeID, String> {
    p.bump();
    let (name, _) = p.ident()?;
    if p.eat(Token::Colon) {
        // base types are parsed and dropped, inheritance is not modeled
        loop {
            let _ = type_ref(p)?;
            if !p.eat(Token::Comma) {
                break;
            }
        }
    }
    p.expect(Token::BraceOpen, "`{`")?;
    let members = member_sequence(p, &name);
    p.expect(Token::BraceClose, "`}`")?;
    let range = p.range_from(start);

    let kind = match keyword {
        Token::KwClass => NodeKind::Class { name, members, body_scope: None },
        Token::KwInterface => NodeKind::Interface { name, members, body_scope: None },
        _ => NodeKind::Struct { name, members, body_scope: None },
    };
    Ok(p.add(kind, range))
}

fn enum_decl(p: &mut Parser, start: TextOffset, is_errordomain: bool) -> Result<NodeID, String> {
    p.bump();
    let (name, _) = p.ident()?;
    p.expect(Token::BraceOpen, "`{`")?;

    let mut members = Vec::new();
    while p.at(Token::Ident) {
        let (value_name, value_range) = p.ident()?;
        if p.eat(Token::Assign) {
            let _ = expr(p)?;
        }
        let kind = if is_errordomain {
            NodeKind::ErrorCode { name: value_name }
        } else {
            NodeKind::EnumValue { name: value_name }
        };
        members.push(p.add(kind, value_range));
        if !p.eat(Token::Comma) {
            break;
        }
    }
    if p.eat(Token::Semi) {
        members.extend(member_sequence(p, &name));
    }
    p.expect(Token::BraceClose, "`}`")?;
    let range = p.range_from(start);

    let kind = if is_errordomain {
        NodeKind::ErrorDomain { name, members, body_scope: None }
    } else {
        NodeKind::Enum { name, members, body_scope: None }
    };
    Ok(p.add(kind, range))
}

fn delegate_decl(p: &mut Parser) -> Result<NodeID, String> {
    p.bump();
    let ret = type_ref(p)?;
    let (name, name_range) = p.ident()?;
    let params = param_list(p)?;
    p.expect(Token::Semi, "`;`")?;
    Ok(p.add(NodeKind::Delegate { name, ret, params }, name_range))
}

fn signal_decl(p: &mut Parser) -> Result<NodeID, String> {
    p.bump();
    let ret = type_ref(p)?;
    let (name, name_range) = p.ident()?;
    let params = param_list(p)?;
    p.expect(Token::Semi, "`;`")?;
    Ok(p.add(NodeKind::Signal { name, ret, params }, name_range))
}

fn constant_decl(p: &mut Parser) -> Result<NodeID, String> {
    p.bump();
    let ty = type_ref(p)?;
    let (name, name_range) = p.ident()?;
    let value = if p.eat(Token::Assign) { Some(expr(p)?) } else { None };
    p.expect(Token::Semi, "`;`")?;
    Ok(p.add(NodeKind::Constant { name, ty, value }, name_range))
}

fn method_decl(
    p: &mut Parser,
    start: TextOffset,
    ret: TypeRef,
    name: String,
) -> Result<NodeID, String> {
    let params = param_list(p)?;
    let body = if p.at(Token::BraceOpen) {
        Some(block(p)?)
    } else {
        p.expect(Token::Semi, "`;` or method body")?;
        None
    };
    let range = p.range_from(start);
    Ok(p.add(NodeKind::Method { name, ret, params, body, body_scope: None }, range))
}

fn property_decl(
    p: &mut Parser,
    start: TextOffset,
    ty: TypeRef,
    name: String,
) -> Result<NodeID, String> {
    // accessor bodies carry no symbols of interest, skip the braces
    let mut depth = 0usize;
    loop {
        match p.peek() {
            Token::BraceOpen => depth += 1,
            Token::BraceClose => {
                p.bump();
                depth -= 1;
                if depth == 0 {
                    break;
                }
                continue;
            }
            Token::Eof => return Err("expected `}`".into()),
            _ => {}
        }
        p.bump();
    }
    let range = p.range_from(start);
    Ok(p.add(NodeKind::Property { name, ty }, range))
}

fn member_sequence(p: &mut Parser, container_name: &str) -> Vec<NodeID> {
    let mut members = Vec::new();
    loop {
        if p.at(Token::BraceClose) || p.at(Token::Eof) {
            break;
        }
        let before = p.cursor;
        match member_decl(p, container_name) {
            Ok(Some(id)) => members.push(id),
            Ok(None) => {}
            Err(msg) => {
                p.error_here(msg);
                sync_stmt(p);
            }
        }
        if p.cursor == before {
            p.bump();
        }
    }
    members
}

fn member_decl(p: &mut Parser, container_name: &str) -> Result<Option<NodeID>, String> {
    skip_attributes(p);
    let start = p.mark();
    skip_modifiers(p);

    match p.peek() {
        Token::Semi => {
            p.bump();
            Ok(None)
        }
        Token::KwSignal => signal_decl(p).map(Some),
        Token::KwConst => constant_decl(p).map(Some),
        Token::KwClass => container_decl(p, start, Token::KwClass).map(Some),
        Token::KwInterface => container_decl(p, start, Token::KwInterface).map(Some),
        Token::KwStruct => container_decl(p, start, Token::KwStruct).map(Some),
        Token::KwEnum => enum_decl(p, start, false).map(Some),
        Token::KwErrordomain => enum_decl(p, start, true).map(Some),
        Token::KwDelegate => delegate_decl(p).map(Some),
        Token::Ident if p.token_text(p.cursor) == container_name => {
            // creation method: `Name (...)` or `Name.tag (...)`
            match p.peek_next() {
                Token::ParenOpen => {
                    p.bump();
                    let ret = TypeRef::named(vec!["void".into()], None);
                    method_decl(p, start, ret, ".new".into()).map(Some)
                }
                Token::Dot => {
                    p.bump();
                    p.bump();
                    let (name, _) = p.ident()?;
                    let ret = TypeRef::named(vec!["void".into()], None);
                    method_decl(p, start, ret, name).map(Some)
                }
                _ => typed_member(p, start),
            }
        }
        _ => typed_member(p, start),
    }
}

fn typed_member(p: &mut Parser, start: TextOffset) -> Result<Option<NodeID>, String> {
    let ty = type_ref(p)?;
    let (name, name_range) = p.ident()?;
    match p.peek() {
        Token::ParenOpen => method_decl(p, start, ty, name).map(Some),
        Token::BraceOpen => property_decl(p, start, ty, name).map(Some),
        _ => {
            let value = if p.eat(Token::Assign) { Some(expr(p)?) } else { None };
            p.expect(Token::Semi, "`;`")?;
            Ok(Some(p.add(NodeKind::Field { name, ty, value }, name_range)))
        }
    }
}

fn param_list(p: &mut Parser) -> Result<Vec<NodeID>, String> {
    p.expect(Token::ParenOpen, "`(`")?;
    let mut params = Vec::new();
    while !p.at(Token::ParenClose) && !p.at(Token::Eof) {
        skip_modifiers(p);
        let ty = type_ref(p)?;
        let (name, name_range) = p.ident()?;
        if p.eat(Token::Assign) {
            let _ = expr(p)?;
        }
        params.push(p.add(NodeKind::Param { name, ty }, name_range));
        if !p.eat(Token::Comma) {
            break;
        }
    }
    p.expect(Token::ParenClose, "`)`")?;
    Ok(params)
}

//==================== TYPES ====================

fn type_ref(p: &mut Parser) -> Result<TypeRef, String> {
    let start = p.mark();
    let mut segs = Vec::new();
    if p.eat(Token::KwVoid) {
        segs.push("void".to_string());
    } else {
        let (seg, _) = p.ident()?;
        segs.push(seg);
        while p.at(Token::Dot) && p.peek_next() == Token::Ident {
            p.bump();
            let (seg, _) = p.ident()?;
            segs.push(seg);
        }
    }

    let mut ty = TypeRef::named(segs, None);
    loop {
        if p.eat(Token::Star) {
            ty.pointer += 1;
        } else if p.eat(Token::Question) {
            ty.nullable = true;
        } else if p.at(Token::BracketOpen) && p.peek_next() == Token::BracketClose {
            p.bump();
            p.bump();
            ty.array = true;
        } else {
            break;
        }
    }
    ty.range = Some(p.range_from(start));
    Ok(ty)
}

/// Probes for `type name`; the cursor is restored when it does not match.
fn try_typed_name(p: &mut Parser) -> Option<(TypeRef, String, TextRange)> {
    let saved = p.cursor;
    let result = (|| {
        let ty = type_ref(p).ok()?;
        let (name, name_range) = p.ident().ok()?;
        Some((ty, name, name_range))
    })();
    if result.is_none() {
        p.cursor = saved;
    }
    result
}

//==================== STATEMENTS ====================

fn sync_stmt(p: &mut Parser) {
    loop {
        match p.peek() {
            Token::Eof | Token::BraceClose => return,
            Token::Semi => {
                p.bump();
                return;
            }
            Token::KwUsing
            | Token::KwNamespace
            | Token::KwClass
            | Token::KwInterface
            | Token::KwStruct
            | Token::KwEnum
            | Token::KwErrordomain
            | Token::KwDelegate
            | Token::KwConst
            | Token::KwVar
            | Token::KwVoid
            | Token::KwReturn
            | Token::KwIf
            | Token::KwWhile
            | Token::KwFor => return,
            Token::Ident if BasicType::from_name(p.token_text(p.cursor)).is_some() => return,
            _ => p.bump(),
        }
    }
}

fn statement(p: &mut Parser) -> Result<Option<NodeID>, String> {
    match p.peek() {
        Token::Semi => {
            p.bump();
            Ok(None)
        }
        Token::BraceOpen => block(p).map(Some),
        Token::KwReturn => return_stmt(p).map(Some),
        Token::KwIf => if_stmt(p).map(Some),
        Token::KwWhile => while_stmt(p).map(Some),
        Token::KwFor => for_stmt(p).map(Some),
        Token::KwVar => {
            p.bump();
            let (name, name_range) = p.ident()?;
            local_decl_tail(p, None, name, name_range).map(Some)
        }
        _ => {
            if let Some((ty, name, name_range)) = try_typed_name(p) {
                return local_decl_tail(p, Some(ty), name, name_range).map(Some);
            }
            expr_stmt(p).map(Some)
        }
    }
}

fn local_decl_tail(
    p: &mut Parser,
    ty: Option<TypeRef>,
    name: String,
    name_range: TextRange,
) -> Result<NodeID, String> {
    let value = if p.eat(Token::Assign) { Some(expr(p)?) } else { None };
    // a missing `;` is reported but the declaration is kept, matching
    // the expression-statement tolerance for half-typed lines
    if !p.eat(Token::Semi) {
        p.error_here("expected `;`".into());
    }
    Ok(p.add(NodeKind::Local { name, ty, value }, name_range))
}

fn block(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    p.expect(Token::BraceOpen, "`{`")?;
    let mut stmts = Vec::new();
    while !p.at(Token::BraceClose) && !p.at(Token::Eof) {
        let before = p.cursor;
        match statement(p) {
            Ok(Some(id)) => stmts.push(id),
            Ok(None) => {}
            Err(msg) => {
                p.error_here(msg);
                sync_stmt(p);
            }
        }
        if p.cursor == before {
            p.bump();
        }
    }
    p.expect(Token::BraceClose, "`}`")?;
    let range = p.range_from(start);
    Ok(p.add(NodeKind::Block { stmts, body_scope: None }, range))
}

fn return_stmt(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    p.bump();
    let value = if p.at(Token::Semi) { None } else { Some(expr(p)?) };
    p.expect(Token::Semi, "`;`")?;
    let range = p.range_from(start);
    Ok(p.add(NodeKind::Return { value }, range))
}

fn if_stmt(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    p.bump();
    p.expect(Token::ParenOpen, "`(`")?;
    let cond = expr(p)?;
    p.expect(Token::ParenClose, "`)`")?;
    let then_branch = embedded_stmt(p)?;
    let else_branch = if p.eat(Token::KwElse) { Some(embedded_stmt(p)?) } else { None };
    let range = p.range_from(start);
    Ok(p.add(NodeKind::If { cond, then_branch, else_branch }, range))
}

fn while_stmt(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    p.bump();
    p.expect(Token::ParenOpen, "`(`")?;
    let cond = expr(p)?;
    p.expect(Token::ParenClose, "`)`")?;
    let body = embedded_stmt(p)?;
    let range = p.range_from(start);
    Ok(p.add(NodeKind::While { cond, body }, range))
}

fn for_stmt(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    p.bump();
    p.expect(Token::ParenOpen, "`(`")?;

    let init = if p.at(Token::Semi) {
        p.bump();
        None
    } else if p.eat(Token::KwVar) {
        let (name, name_range) = p.ident()?;
        Some(local_decl_tail(p, None, name, name_range)?)
    } else if let Some((ty, name, name_range)) = try_typed_name(p) {
        Some(local_decl_tail(p, Some(ty), name, name_range)?)
    } else {
        let init = expr(p)?;
        p.expect(Token::Semi, "`;`")?;
        Some(init)
    };

    let cond = if p.at(Token::Semi) { None } else { Some(expr(p)?) };
    p.expect(Token::Semi, "`;`")?;
    let step = if p.at(Token::ParenClose) { None } else { Some(expr(p)?) };
    p.expect(Token::ParenClose, "`)`")?;
    let body = embedded_stmt(p)?;
    let range = p.range_from(start);
    Ok(p.add(NodeKind::For { init, cond, step, body }, range))
}

fn embedded_stmt(p: &mut Parser) -> Result<NodeID, String> {
    match statement(p)? {
        Some(id) => Ok(id),
        None => Err("expected statement".into()),
    }
}

fn expr_stmt(p: &mut Parser) -> Result<NodeID, String> {
    let id = expr(p)?;
    // a missing `;` is reported but the expression is kept, so queries on
    // half-typed lines still have a node to land on
    if !p.eat(Token::Semi) {
        p.error_here("expected `;`".into());
    }
    Ok(id)
}

//==================== EXPRESSIONS ====================

fn expr(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    let lhs = binary_expr(p, 0)?;
    if p.eat(Token::Assign) {
        let rhs = expr(p)?;
        let range = p.range_from(start);
        return Ok(p.add(NodeKind::Assign { lhs, rhs }, range));
    }
    Ok(lhs)
}

fn bin_op(token: Token) -> Option<(BinOp, u32)> {
    let result = match token {
        Token::LogicOr => (BinOp::LogicOr, 1),
        Token::LogicAnd => (BinOp::LogicAnd, 2),
        Token::CmpEq => (BinOp::CmpEq, 3),
        Token::CmpNotEq => (BinOp::CmpNotEq, 3),
        Token::CmpLt => (BinOp::CmpLt, 4),
        Token::CmpLtEq => (BinOp::CmpLtEq, 4),
        Token::CmpGt => (BinOp::CmpGt, 4),
        Token::CmpGtEq => (BinOp::CmpGtEq, 4),
        Token::Plus => (BinOp::Add, 5),
        Token::Minus => (BinOp::Sub, 5),
        Token::Star => (BinOp::Mul, 6),
        Token::Slash => (BinOp::Div, 6),
        Token::Percent => (BinOp::Rem, 6),
        _ => return None,
    };
    Some(result)
}

fn binary_expr(p: &mut Parser, min_prec: u32) -> Result<NodeID, String> {
    let start = p.mark();
    let mut lhs = unary_expr(p)?;
    while let Some((op, prec)) = bin_op(p.peek()) {
        if prec < min_prec {
            break;
        }
        p.bump();
        let rhs = binary_expr(p, prec + 1)?;
        let range = p.range_from(start);
        lhs = p.add(NodeKind::Binary { op, lhs, rhs }, range);
    }
    Ok(lhs)
}

fn unary_expr(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    match p.peek() {
        Token::Minus => {
            p.bump();
            let rhs = unary_expr(p)?;
            let range = p.range_from(start);
            Ok(p.add(NodeKind::Unary { op: UnOp::Neg, rhs }, range))
        }
        Token::Bang => {
            p.bump();
            let rhs = unary_expr(p)?;
            let range = p.range_from(start);
            Ok(p.add(NodeKind::Unary { op: UnOp::Not, rhs }, range))
        }
        Token::Star => {
            p.bump();
            let inner = unary_expr(p)?;
            let range = p.range_from(start);
            Ok(p.add(NodeKind::PointerIndirection { inner }, range))
        }
        Token::Amp => {
            p.bump();
            let inner = unary_expr(p)?;
            let range = p.range_from(start);
            Ok(p.add(NodeKind::AddressOf { inner }, range))
        }
        _ => postfix_expr(p),
    }
}

fn postfix_expr(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    let mut inner = primary_expr(p)?;
    loop {
        match p.peek() {
            Token::Dot | Token::Arrow => {
                let pointer = p.at(Token::Arrow);
                p.bump();
                // tolerate a missing member name so `foo.` still yields a
                // node; basic type names are keywords, not members
                let member = if p.at(Token::Ident)
                    && BasicType::from_name(p.token_text(p.cursor)).is_none()
                {
                    let (name, _) = p.ident()?;
                    name
                } else {
                    String::new()
                };
                let range = p.range_from(start);
                inner = p.add(NodeKind::MemberAccess { inner, member, pointer }, range);
            }
            Token::ParenOpen => {
                let args = arg_list(p)?;
                let range = p.range_from(start);
                inner = p.add(NodeKind::Call { callee: inner, args }, range);
            }
            _ => break,
        }
    }
    Ok(inner)
}

fn arg_list(p: &mut Parser) -> Result<Vec<NodeID>, String> {
    p.expect(Token::ParenOpen, "`(`")?;
    let mut args = Vec::new();
    while !p.at(Token::ParenClose) && !p.at(Token::Eof) {
        args.push(expr(p)?);
        if !p.eat(Token::Comma) {
            break;
        }
    }
    p.expect(Token::ParenClose, "`)`")?;
    Ok(args)
}

fn primary_expr(p: &mut Parser) -> Result<NodeID, String> {
    let start = p.mark();
    match p.peek() {
        Token::IntLit => {
            let value = p.token_text(p.cursor).parse::<u64>().unwrap_or(0);
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Int(value) }, p.range_from(start)))
        }
        Token::RealLit => {
            let value = p.token_text(p.cursor).parse::<f64>().unwrap_or(0.0);
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Real(value) }, p.range_from(start)))
        }
        Token::CharLit => {
            let text = p.token_text(p.cursor);
            let value = char_value(text);
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Char(value) }, p.range_from(start)))
        }
        Token::StrLit => {
            let text = p.token_text(p.cursor);
            let value = text.trim_matches('"').to_string();
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Str(value) }, p.range_from(start)))
        }
        Token::KwTrue | Token::KwFalse => {
            let value = p.at(Token::KwTrue);
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Bool(value) }, p.range_from(start)))
        }
        Token::KwNull => {
            p.bump();
            Ok(p.add(NodeKind::Literal { lit: Lit::Null }, p.range_from(start)))
        }
        Token::KwThis => {
            p.bump();
            Ok(p.add(NodeKind::This, p.range_from(start)))
        }
        Token::KwNew => {
            p.bump();
            let ty = type_ref(p)?;
            let args = arg_list(p)?;
            let range = p.range_from(start);
            Ok(p.add(NodeKind::ObjectCreation { ty, args }, range))
        }
        Token::Ident => {
            let (name, range) = p.ident()?;
            Ok(p.add(NodeKind::Ident { name }, range))
        }
        Token::ParenOpen => {
            p.bump();
            let inner = expr(p)?;
            p.expect(Token::ParenClose, "`)`")?;
            Ok(inner)
        }
        _ => Err("expected expression".into()),
    }
}

fn char_value(text: &str) -> char {
    let inner = text.trim_matches('\'');
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(c) => c,
            None => '\\',
        },
        Some(c) => c,
        None => '\0',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (Ast, Reporter, NodeID) {
        let mut ast = Ast::new();
        let mut reporter = Reporter::new();
        let root = parse_file(&mut ast, &mut reporter, FileID::new(0), text);
        (ast, reporter, root)
    }

    fn collect_kinds(ast: &Ast, root: NodeID) -> Vec<NodeID> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            let id = out[i];
            ast.for_each_child(id, &mut |child| out.push(child));
            i += 1;
        }
        out
    }

    #[test]
    fn class_members() {
        let (ast, reporter, root) = parse(
            "class Foo { public int a; public void bar () { } public Foo () { } }",
        );
        assert!(!reporter.did_error());
        let NodeKind::File { decls } = &ast.node(root).kind else { panic!() };
        assert_eq!(decls.len(), 1);
        let Some(members) = ast.members(decls[0]) else { panic!() };
        let names: Vec<&str> =
            members.iter().filter_map(|&m| ast.symbol_name(m)).collect();
        assert_eq!(names, vec!["a", "bar", ".new"]);
    }

    #[test]
    fn field_range_is_name_only() {
        let (ast, _, root) = parse("int x = 3;\n");
        let NodeKind::File { decls } = &ast.node(root).kind else { panic!() };
        let local = ast.node(decls[0]);
        assert_eq!(local.range.unwrap(), TextRange::new(4.into(), 5.into()));
    }

    #[test]
    fn enum_and_errordomain() {
        let (ast, reporter, root) = parse(
            "enum Color { RED, GREEN = 2; public int shade () { return 0; } }\n\
             errordomain IoError { NOT_FOUND, DENIED }",
        );
        assert!(!reporter.did_error());
        let NodeKind::File { decls } = &ast.node(root).kind else { panic!() };
        let color = ast.members(decls[0]).unwrap();
        let names: Vec<&str> = color.iter().filter_map(|&m| ast.symbol_name(m)).collect();
        assert_eq!(names, vec!["RED", "GREEN", "shade"]);
        let io = ast.members(decls[1]).unwrap();
        assert_eq!(io.len(), 2);
        assert!(matches!(ast.node(io[0]).kind, NodeKind::ErrorCode { .. }));
    }

    #[test]
    fn trailing_dot_still_yields_member_access() {
        let (ast, reporter, root) = parse("Foo f = new Foo ();\nf.\n");
        // the missing member name costs a `;` diagnostic but keeps the node
        assert!(reporter.did_error());
        let all = collect_kinds(&ast, root);
        let access = all.iter().find(|&&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { member, .. } if member.is_empty())
        });
        assert!(access.is_some());
    }

    #[test]
    fn recovery_keeps_following_statements() {
        let (ast, reporter, root) = parse(
            "void main () {\n    log (obj.\n    int tail = 0;\n}\n",
        );
        assert!(reporter.did_error());
        let all = collect_kinds(&ast, root);
        let tail = all.iter().any(|&id| ast.symbol_name(id) == Some("tail"));
        assert!(tail, "statement after the broken one must survive");
    }

    #[test]
    fn pointer_member_access() {
        let (ast, _, root) = parse("p->x;\n");
        let all = collect_kinds(&ast, root);
        let access = all.iter().any(|&id| {
            matches!(&ast.node(id).kind, NodeKind::MemberAccess { pointer: true, .. })
        });
        assert!(access);
    }

    #[test]
    fn vapi_attributes_are_skipped() {
        let (ast, reporter, root) = parse(
            "[CCode (cheader_filename = \"glib.h\")]\nnamespace GLib { void print (string s); }",
        );
        assert!(!reporter.did_error());
        let NodeKind::File { decls } = &ast.node(root).kind else { panic!() };
        assert_eq!(decls.len(), 1);
        assert!(matches!(ast.node(decls[0]).kind, NodeKind::Namespace { .. }));
    }
}
