use crate::ast::{Ast, NodeID, ScopeID};
use crate::session::FileID;
use crate::text::{self, TextLocation, TextOffset, TextRange};

/// A predicate plus projection driven through every node of a file's
/// tree in pre-order. `matches` must be pure; collection happens through
/// `result`. Polymorphic over the collected item so node and scope
/// queries share one traversal.
pub trait Query {
    type Item;
    fn matches(&self, ast: &Ast, id: NodeID) -> bool;
    fn result(&self, ast: &Ast, id: NodeID) -> Option<Self::Item>;
}

/// Pre-order traversal from `root`, collecting in traversal order.
/// Every syntactic child is visited, uniformly for every node kind.
pub fn visit<Q: Query>(ast: &Ast, root: NodeID, query: &Q, out: &mut Vec<Q::Item>) {
    if query.matches(ast, root) {
        if let Some(item) = query.result(ast, root) {
            out.push(item);
        }
    }
    let mut children = Vec::new();
    ast.for_each_child(root, &mut |child| children.push(child));
    for child in children {
        visit(ast, child, query, out);
    }
}

//==================== POSITION LOCATOR ====================

/// Collects every node of one file whose source range sits on the query
/// line and spans the query column. Multi-line nodes are skipped; at
/// cursor resolution the innermost same-line node is the one wanted.
pub struct SymbolAtPos<'a> {
    file_id: FileID,
    line: u32,
    col: u32,
    line_ranges: &'a [TextRange],
}

impl<'a> SymbolAtPos<'a> {
    pub fn new(file_id: FileID, loc: TextLocation, line_ranges: &'a [TextRange]) -> SymbolAtPos<'a> {
        SymbolAtPos { file_id, line: loc.line(), col: loc.col(), line_ranges }
    }
}

impl<'a> Query for SymbolAtPos<'a> {
    type Item = NodeID;

    fn matches(&self, ast: &Ast, id: NodeID) -> bool {
        let node = ast.node(id);
        if node.file_id != self.file_id {
            return false;
        }
        let Some(range) = node.range else {
            return false;
        };
        let begin = text::find_location(range.start(), self.line_ranges);
        let end = text::find_location(range.last_byte(), self.line_ranges);
        begin.line() == end.line()
            && begin.line() == self.line
            && begin.col() <= self.col
            && self.col <= end.col()
    }

    fn result(&self, _: &Ast, id: NodeID) -> Option<NodeID> {
        Some(id)
    }
}

pub fn find_symbols_at(
    ast: &Ast,
    file_id: FileID,
    loc: TextLocation,
    line_ranges: &[TextRange],
) -> Vec<NodeID> {
    let Some(root) = ast.file_root(file_id) else {
        return Vec::new();
    };
    let query = SymbolAtPos::new(file_id, loc, line_ranges);
    let mut out = Vec::new();
    visit(ast, root, &query, &mut out);
    out
}

/// Among same-line candidates, the nested-innermost one: maximal begin
/// column, then minimal end column, first in pre-order on ties.
pub fn tightest(ast: &Ast, candidates: &[NodeID], line_ranges: &[TextRange]) -> Option<NodeID> {
    let mut best: Option<(NodeID, u32, u32)> = None;
    for &id in candidates {
        let Some(range) = ast.node(id).range else {
            continue;
        };
        let begin = text::find_location(range.start(), line_ranges).col();
        let end = text::find_location(range.last_byte(), line_ranges).col();
        match best {
            None => best = Some((id, begin, end)),
            Some((_, best_begin, best_end)) => {
                if begin > best_begin || (begin == best_begin && end < best_end) {
                    best = Some((id, begin, end));
                }
            }
        }
    }
    best.map(|(id, _, _)| id)
}

//==================== SCOPE LOCATOR ====================

/// At every declared symbol, checks whether the extent of its owning
/// scope (the union of the ranges of all symbols in that scope's table,
/// restricted to the queried file) contains the query offset, and emits
/// the owning scope if so. Duplicates are expected; callers iterate.
pub struct ScopeAtPos {
    file_id: FileID,
    offset: TextOffset,
}

impl ScopeAtPos {
    pub fn new(file_id: FileID, offset: TextOffset) -> ScopeAtPos {
        ScopeAtPos { file_id, offset }
    }
}

impl Query for ScopeAtPos {
    type Item = ScopeID;

    fn matches(&self, ast: &Ast, id: NodeID) -> bool {
        let node = ast.node(id);
        if node.file_id != self.file_id {
            return false;
        }
        let Some(scope) = node.owner_scope else {
            return false;
        };
        match scope_extent(ast, scope, self.file_id) {
            Some(extent) => extent.contains_inclusive(self.offset),
            None => false,
        }
    }

    fn result(&self, ast: &Ast, id: NodeID) -> Option<ScopeID> {
        ast.node(id).owner_scope
    }
}

/// Union of the ranges of all symbols in the scope's table that live in
/// `file_id`. Symbols without a source range contribute nothing; a table
/// that is empty or entirely rangeless yields no extent.
fn scope_extent(ast: &Ast, scope: ScopeID, file_id: FileID) -> Option<TextRange> {
    let mut extent: Option<TextRange> = None;
    for (_, symbol) in ast.scope(scope).symbols() {
        let node = ast.node(symbol);
        if node.file_id != file_id {
            continue;
        }
        let Some(range) = node.range else {
            continue;
        };
        extent = Some(match extent {
            Some(current) => current.union(range),
            None => range,
        });
    }
    extent
}

pub fn find_scopes_at(ast: &Ast, file_id: FileID, offset: TextOffset) -> Vec<ScopeID> {
    let Some(root) = ast.file_root(file_id) else {
        return Vec::new();
    };
    let query = ScopeAtPos::new(file_id, offset);
    let mut out = Vec::new();
    visit(ast, root, &query, &mut out);
    out
}

//==================== TOKEN FALLBACK ====================

/// Trailing identifier run ending at `offset`, for recovering a receiver
/// the parser dropped.
pub fn token_before(source: &str, offset: usize) -> Option<&str> {
    let bytes = source.as_bytes();
    let end = offset.min(bytes.len());
    let mut start = end;
    while start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_') {
        start -= 1;
    }
    if start == end {
        None
    } else {
        Some(&source[start..end])
    }
}

/// Symbols named `token` bound anywhere along the parent chains of the
/// given scopes.
pub fn scope_chain_candidates(ast: &Ast, scopes: &[ScopeID], token: &str) -> Vec<NodeID> {
    let mut out = Vec::new();
    for &scope in scopes {
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            if let Some(symbol) = ast.scope(scope_id).lookup(token) {
                if !out.contains(&symbol) {
                    out.push(symbol);
                }
            }
            current = ast.scope(scope_id).parent;
        }
    }
    out
}

/// Candidate with the tightest source range.
pub fn tightest_symbol(ast: &Ast, candidates: &[NodeID]) -> Option<NodeID> {
    let mut best: Option<(NodeID, usize)> = None;
    for &id in candidates {
        let Some(range) = ast.node(id).range else {
            continue;
        };
        match best {
            None => best = Some((id, range.len())),
            Some((_, best_len)) => {
                if range.len() < best_len {
                    best = Some((id, range.len()));
                }
            }
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::check;
    use crate::error::Reporter;
    use crate::parser;
    use crate::text::find_line_ranges;

    fn analyze(text: &str) -> (Ast, Vec<TextRange>) {
        let mut ast = Ast::new();
        let mut reporter = Reporter::new();
        parser::parse_file(&mut ast, &mut reporter, FileID::new(0), text);
        check::run(&mut ast, &mut reporter, &[]);
        (ast, find_line_ranges(text))
    }

    #[test]
    fn position_hits_every_column_of_a_node() {
        let text = "int x = 3;\nreturn x;\n";
        let (ast, lines) = analyze(text);
        // `x` on line 2 spans exactly column 8
        let found = find_symbols_at(&ast, FileID::new(0), TextLocation::new(2, 8), &lines);
        let best = tightest(&ast, &found, &lines).unwrap();
        assert!(matches!(&ast.node(best).kind, NodeKind::Ident { name } if name == "x"));
    }

    #[test]
    fn tightest_prefers_nested_range() {
        let text = "int y = 1 + 2;\n";
        let (ast, lines) = analyze(text);
        // at the `1`: both the binary expression and the literal match
        let found = find_symbols_at(&ast, FileID::new(0), TextLocation::new(1, 9), &lines);
        assert!(found.len() >= 2);
        let best = tightest(&ast, &found, &lines).unwrap();
        assert!(matches!(ast.node(best).kind, NodeKind::Literal { .. }));
    }

    #[test]
    fn multi_line_nodes_are_skipped() {
        let text = "void main () {\n    int a = 1;\n    return a;\n}\n";
        let (ast, lines) = analyze(text);
        // position inside the body: the method and block span multiple
        // lines and must not match
        let found = find_symbols_at(&ast, FileID::new(0), TextLocation::new(2, 9), &lines);
        for &id in &found {
            assert!(!matches!(
                ast.node(id).kind,
                NodeKind::Method { .. } | NodeKind::Block { .. }
            ));
        }
        assert!(!found.is_empty());
    }

    #[test]
    fn scopes_cover_positions_between_symbols() {
        let text = "void main () {\n    int a = 1;\n    a = 2;\n    int b = 3;\n    b = a;\n}\n";
        let (ast, _) = analyze(text);
        // offset inside `a = 2;` sits between the two locals
        let offset = (text.find("a = 2").unwrap() as u32).into();
        let scopes = find_scopes_at(&ast, FileID::new(0), offset);
        assert!(!scopes.is_empty());
        let candidates = scope_chain_candidates(&ast, &scopes, "a");
        let symbol = tightest_symbol(&ast, &candidates).unwrap();
        assert!(matches!(ast.node(symbol).kind, NodeKind::Local { .. }));
    }

    #[test]
    fn token_before_walks_identifier_chars() {
        let text = "log (obj.";
        assert_eq!(token_before(text, 9), Some("obj"));
        assert_eq!(token_before(text, 4), None);
        assert_eq!(token_before(text, 3), Some("log"));
        assert_eq!(token_before("", 0), None);
    }
}
