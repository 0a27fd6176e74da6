use lsp_types as lsp;
use vala_ls::ServerContext;

fn open(ctx: &mut ServerContext, uri: &lsp::Url, version: i32, text: &str) {
    let opened = ctx.open_document(uri, "vala", version, text.to_string());
    assert!(opened.is_some(), "document failed to open");
}

fn main_uri() -> lsp::Url {
    lsp::Url::from_file_path("/ws/main.vala").unwrap()
}

fn definition_params(uri: &lsp::Url, line: u32, character: u32) -> lsp::GotoDefinitionParams {
    lsp::GotoDefinitionParams {
        text_document_position_params: lsp::TextDocumentPositionParams {
            text_document: lsp::TextDocumentIdentifier { uri: uri.clone() },
            position: lsp::Position::new(line, character),
        },
        work_done_progress_params: Default::default(),
        partial_result_params: Default::default(),
    }
}

fn completion_params(uri: &lsp::Url, line: u32, character: u32) -> lsp::CompletionParams {
    lsp::CompletionParams {
        text_document_position: lsp::TextDocumentPositionParams {
            text_document: lsp::TextDocumentIdentifier { uri: uri.clone() },
            position: lsp::Position::new(line, character),
        },
        work_done_progress_params: Default::default(),
        partial_result_params: Default::default(),
        context: None,
    }
}

fn has_item(items: &[lsp::CompletionItem], label: &str, kind: lsp::CompletionItemKind) -> bool {
    items.iter().any(|item| item.label == label && item.kind == Some(kind))
}

const FOO_CLASS: &str = "class Foo { public int a; public void bar () { } }";

#[test]
fn definition_of_a_local() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "int x = 3;\nreturn x;\n");

    let location = ctx.goto_definition(&definition_params(&uri, 1, 7)).unwrap();
    assert_eq!(location.uri, uri);
    assert_eq!(
        location.range,
        lsp::Range::new(lsp::Position::new(0, 4), lsp::Position::new(0, 5))
    );
}

#[test]
fn member_completion_on_class_instance() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    let text = format!("{FOO_CLASS}\nFoo f = new Foo (); f.\n");
    open(&mut ctx, &uri, 1, &text);

    let cursor = "Foo f = new Foo (); f.".len() as u32;
    let items = ctx.completion(&completion_params(&uri, 1, cursor));
    assert!(has_item(&items, "a", lsp::CompletionItemKind::FIELD), "items: {items:?}");
    assert!(has_item(&items, "bar", lsp::CompletionItemKind::METHOD), "items: {items:?}");
    assert!(!items.iter().any(|item| item.label == ".new"));
}

#[test]
fn pointer_dereference_completion() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    let text = format!("{FOO_CLASS}\nFoo* p;\np->\n");
    open(&mut ctx, &uri, 1, &text);

    let items = ctx.completion(&completion_params(&uri, 2, 3));
    assert!(has_item(&items, "a", lsp::CompletionItemKind::FIELD), "items: {items:?}");
    assert!(has_item(&items, "bar", lsp::CompletionItemKind::METHOD), "items: {items:?}");
}

#[test]
fn stale_change_is_ignored() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 3, "int x = 3;\nreturn x;\n");

    let change = lsp::TextDocumentContentChangeEvent {
        range: None,
        range_length: None,
        text: "int renamed = 3;\nreturn renamed;\n".to_string(),
    };
    let applied = ctx.change_document(&uri, 2, &[change]);
    assert!(!applied);

    // queries still see the version 3 content
    let location = ctx.goto_definition(&definition_params(&uri, 1, 7)).unwrap();
    assert_eq!(
        location.range,
        lsp::Range::new(lsp::Position::new(0, 4), lsp::Position::new(0, 5))
    );
}

#[test]
fn undeclared_name_produces_one_error_diagnostic() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "void main () {\n    undeclared_name = 1;\n}\n");

    let publishes = ctx.check_project();
    assert_eq!(publishes.len(), 1);
    let publish = &publishes[0];
    assert_eq!(publish.uri, uri);
    assert_eq!(publish.diagnostics.len(), 1);
    let diagnostic = &publish.diagnostics[0];
    assert_eq!(diagnostic.severity, Some(lsp::DiagnosticSeverity::ERROR));
    assert_eq!(
        diagnostic.range,
        lsp::Range::new(lsp::Position::new(1, 4), lsp::Position::new(1, 19))
    );
}

#[test]
fn completion_falls_back_to_scope_token() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    let text = format!(
        "{FOO_CLASS}\nvoid main () {{\n    Foo obj = new Foo ();\n    log (obj.\n    int tail = 0;\n}}\n"
    );
    open(&mut ctx, &uri, 1, &text);

    let cursor = "    log (obj.".len() as u32;
    let items = ctx.completion(&completion_params(&uri, 3, cursor));
    assert!(has_item(&items, "a", lsp::CompletionItemKind::FIELD), "items: {items:?}");
    assert!(has_item(&items, "bar", lsp::CompletionItemKind::METHOD), "items: {items:?}");
}

#[test]
fn definition_across_files() {
    let mut ctx = ServerContext::new();
    let lib_uri = lsp::Url::from_file_path("/ws/lib.vala").unwrap();
    let use_uri = lsp::Url::from_file_path("/ws/use.vala").unwrap();
    open(&mut ctx, &lib_uri, 1, FOO_CLASS);
    open(&mut ctx, &use_uri, 1, "Foo f = new Foo ();\nf.bar ();\n");

    // over `bar` in `f.bar ();`
    let location = ctx.goto_definition(&definition_params(&use_uri, 1, 3)).unwrap();
    assert_eq!(location.uri, lib_uri);
    assert_eq!(location.range.start.line, 0);
}

#[test]
fn enum_static_member_completion() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "enum Color { RED, GREEN }\nvar c = Color.\n");

    let cursor = "var c = Color.".len() as u32;
    let items = ctx.completion(&completion_params(&uri, 1, cursor));
    assert!(has_item(&items, "RED", lsp::CompletionItemKind::VALUE), "items: {items:?}");
    assert!(has_item(&items, "GREEN", lsp::CompletionItemKind::VALUE), "items: {items:?}");
}

#[test]
fn errordomain_completion_lists_codes_once() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "errordomain IoError { NOT_FOUND, DENIED }\nvar e = IoError.\n");

    let cursor = "var e = IoError.".len() as u32;
    let items = ctx.completion(&completion_params(&uri, 1, cursor));
    assert!(has_item(&items, "NOT_FOUND", lsp::CompletionItemKind::VALUE), "items: {items:?}");
    let count = items.iter().filter(|item| item.label == "NOT_FOUND").count();
    assert_eq!(count, 1);
}

#[test]
fn completion_without_trigger_is_empty() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "int x = 3;\n");

    // cursor after `x`: no access operator before it
    let items = ctx.completion(&completion_params(&uri, 0, 5));
    assert!(items.is_empty());

    // bare `>` (comparison) must not complete
    let mut ctx = ServerContext::new();
    open(&mut ctx, &uri, 1, "bool b = 1 >\n");
    let items = ctx.completion(&completion_params(&uri, 0, 12));
    assert!(items.is_empty());
}

#[test]
fn definition_into_package_interface_is_null() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "Logger l = new Logger ();\nl.info (\"x\");\n");
    // the package interface is registered directly, as workspace
    // seeding would after resolving it from a vapi directory
    let _ = ctx.session.add_source_file(
        "/ws/vapi/logging.vapi".into(),
        vala_core::session::FileKind::Package,
        "class Logger { public void info (string msg) { } }".to_string(),
    );

    let location = ctx.goto_definition(&definition_params(&uri, 1, 3));
    assert!(location.is_none());
}

#[test]
fn diagnostics_clear_after_fix() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "void main () {\n    missing = 1;\n}\n");
    let publishes = ctx.check_project();
    assert_eq!(publishes[0].diagnostics.len(), 1);

    let change = lsp::TextDocumentContentChangeEvent {
        range: None,
        range_length: None,
        text: "void main () {\n}\n".to_string(),
    };
    assert!(ctx.change_document(&uri, 2, &[change]));
    let publishes = ctx.check_project();
    assert_eq!(publishes.len(), 1);
    assert!(publishes[0].diagnostics.is_empty());
}

#[test]
fn check_project_is_a_no_op_when_clean() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    open(&mut ctx, &uri, 1, "int x = 3;\n");
    assert!(!ctx.check_project().is_empty());
    // nothing changed: no re-analysis, nothing republished
    assert!(ctx.check_project().is_empty());
    assert_eq!(ctx.session.stats.check_count, 1);
}

#[test]
fn dotted_chain_completion() {
    let mut ctx = ServerContext::new();
    let uri = main_uri();
    let text = "class Inner { public int deep; }\n\
                class Outer { public Inner inner; }\n\
                Outer o = new Outer ();\n\
                var v = o.inner.\n";
    open(&mut ctx, &uri, 1, text);

    let cursor = "var v = o.inner.".len() as u32;
    let items = ctx.completion(&completion_params(&uri, 3, cursor));
    assert!(has_item(&items, "deep", lsp::CompletionItemKind::FIELD), "items: {items:?}");
}
