use crate::completion::{self, Trigger};
use crate::document;
use crate::workspace;
use lsp_types as lsp;
use std::path::Path;
use vala_core::error::Error;
use vala_core::find;
use vala_core::session::{FileID, FileKind, Session};
use vala_core::ast::NodeKind;
use vala_core::text::{self, TextLocation, TextRange};

/// All server state, owned by the single-threaded main loop. Handlers
/// are plain methods so the wire loop and the integration tests drive
/// the same code.
pub struct ServerContext {
    pub session: Session,
}

impl ServerContext {
    pub fn new() -> ServerContext {
        ServerContext { session: Session::new() }
    }

    pub fn seed_workspace(&mut self, root: &Path) -> Result<(), Error> {
        workspace::seed(&mut self.session, root)
    }

    pub fn open_document(
        &mut self,
        uri: &lsp::Url,
        language_id: &str,
        version: i32,
        text: String,
    ) -> Option<FileID> {
        document::open_document(&mut self.session, uri, language_id, version, text)
    }

    pub fn change_document(
        &mut self,
        uri: &lsp::Url,
        version: i32,
        changes: &[lsp::TextDocumentContentChangeEvent],
    ) -> bool {
        document::change_document(&mut self.session, uri, version, changes)
    }

    /// Runs analysis if anything changed and returns per-file publish
    /// payloads for every source-kind file, empty lists included so
    /// stale diagnostics clear.
    pub fn check_project(&mut self) -> Vec<lsp::PublishDiagnosticsParams> {
        if !self.session.dirty() {
            return Vec::new();
        }
        self.session.check();

        let mut publishes = Vec::new();
        for (file_id, file) in self.session.files() {
            if file.kind != FileKind::Source {
                continue;
            }
            let Some(uri) = document::uri_for_file(&self.session, file_id) else {
                continue;
            };
            let mut diagnostics = Vec::new();
            for diag in self.session.reporter().errors() {
                if diag.src().file_id() == file_id {
                    diagnostics.push(self.to_diagnostic(diag.msg(), diag.src().range(), file_id, lsp::DiagnosticSeverity::ERROR));
                }
            }
            for diag in self.session.reporter().warnings() {
                if diag.src().file_id() == file_id {
                    diagnostics.push(self.to_diagnostic(diag.msg(), diag.src().range(), file_id, lsp::DiagnosticSeverity::WARNING));
                }
            }
            publishes.push(lsp::PublishDiagnosticsParams::new(uri, diagnostics, None));
        }
        publishes
    }

    pub fn goto_definition(&mut self, params: &lsp::GotoDefinitionParams) -> Option<lsp::Location> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let path = document::uri_to_path(uri)?;
        let file_id = self.session.file_by_path(&path)?;
        self.session.check();

        let ast = self.session.ast()?;
        let file = self.session.file(file_id);
        let loc = TextLocation::new(position.line + 1, position.character + 1);
        let found = find::find_symbols_at(ast, file_id, loc, &file.line_ranges);
        let best = find::tightest(ast, &found, &file.line_ranges)?;

        let target = match &ast.node(best).kind {
            NodeKind::MemberAccess { .. } | NodeKind::Ident { .. } => ast.node(best).symbol,
            _ => None,
        }?;
        let target_node = ast.node(target);
        let target_file = self.session.file(target_node.file_id);
        // symbols from package interfaces have no editor-side document
        if target_file.kind != FileKind::Source {
            return None;
        }
        let target_uri = document::uri_for_file(&self.session, target_node.file_id)?;
        let range = lsp_range(&target_file.line_ranges, target_node.range?);
        Some(lsp::Location::new(target_uri, range))
    }

    pub fn completion(&mut self, params: &lsp::CompletionParams) -> Vec<lsp::CompletionItem> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some(path) = document::uri_to_path(uri) else {
            return Vec::new();
        };
        let Some(file_id) = self.session.file_by_path(&path) else {
            return Vec::new();
        };
        self.session.check();

        let file = self.session.file(file_id);
        let line = text::line_range(&file.line_ranges, position.line);
        let line_text = &file.source[line.as_usize()];
        let Some((trigger, adjusted)) = completion::classify_trigger(line_text, position.character)
        else {
            return Vec::new();
        };
        let Some(ast) = self.session.ast() else {
            return Vec::new();
        };

        let pointer_access = trigger == Trigger::PointerMember;
        let loc = TextLocation::new(position.line + 1, adjusted + 1);
        let found = find::find_symbols_at(ast, file_id, loc, &file.line_ranges);
        let best = find::tightest(ast, &found, &file.line_ranges);

        let container = match best {
            Some(best) => completion::type_symbol_for(ast, best, pointer_access),
            None => {
                // nothing at the cursor: recover the receiver textually
                // and search the enclosing scope chains
                let offset = file.offset_at(position.line, adjusted);
                let Some(token) = find::token_before(&file.source, offset.into()) else {
                    return Vec::new();
                };
                let scopes = find::find_scopes_at(ast, file_id, offset);
                let candidates = find::scope_chain_candidates(ast, &scopes, token);
                find::tightest_symbol(ast, &candidates)
                    .and_then(|symbol| completion::type_symbol_for(ast, symbol, pointer_access))
            }
        };
        match container {
            Some(container) => completion::member_completions(ast, container),
            None => Vec::new(),
        }
    }

    pub fn shutdown(&mut self) {
        self.session.clear();
    }

    fn to_diagnostic(
        &self,
        msg: &str,
        range: TextRange,
        file_id: FileID,
        severity: lsp::DiagnosticSeverity,
    ) -> lsp::Diagnostic {
        let file = self.session.file(file_id);
        lsp::Diagnostic {
            range: lsp_range(&file.line_ranges, range),
            severity: Some(severity),
            message: msg.to_string(),
            ..Default::default()
        }
    }
}

impl Default for ServerContext {
    fn default() -> ServerContext {
        ServerContext::new()
    }
}

/// 1-based inclusive columns back to 0-based LSP positions.
pub fn lsp_range(line_ranges: &[TextRange], range: TextRange) -> lsp::Range {
    let start = text::find_location(range.start(), line_ranges);
    let end = text::find_location(range.end(), line_ranges);
    lsp::Range::new(
        lsp::Position::new(start.line() - 1, start.col() - 1),
        lsp::Position::new(end.line() - 1, end.col() - 1),
    )
}
