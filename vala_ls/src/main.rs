#![forbid(unsafe_code)]

use lsp_server::{Connection, RequestId};
use lsp_types as lsp;
use lsp_types::notification::{self, Notification as NotificationTrait};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;
use vala_ls::message::{Action, Message, MessageBuffer, Notification, Request};
use vala_ls::ServerContext;

fn main() {
    init_logging();
    let (conn, io_threads) = Connection::stdio();
    let params = initialize_handshake(&conn);

    let mut context = ServerContext::new();
    seed_workspace(&conn, &mut context, &params);
    publish_diagnostics(&conn, &mut context);

    server_loop(&conn, &mut context);

    drop(conn);
    let _ = io_threads.join();
    tracing::info!("server stopped");
}

/// stdout and stdin carry the protocol, so logs go to a timestamped
/// file under the temp dir; `RUST_LOG` controls the filter.
fn init_logging() {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let path = std::env::temp_dir().join(format!("vala-ls-{stamp}.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match File::create(&path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
            tracing::info!(path = %path.display(), "logging to file");
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
        }
    }
}

fn initialize_handshake(conn: &Connection) -> lsp::InitializeParams {
    let capabilities = lsp::ServerCapabilities {
        position_encoding: Some(lsp::PositionEncodingKind::UTF8),
        text_document_sync: Some(lsp::TextDocumentSyncCapability::Kind(
            lsp::TextDocumentSyncKind::FULL,
        )),
        selection_range_provider: None,
        hover_provider: None,
        completion_provider: Some(lsp::CompletionOptions {
            resolve_provider: Some(false),
            trigger_characters: Some(vec![".".into(), ">".into()]),
            all_commit_characters: None,
            work_done_progress_options: lsp::WorkDoneProgressOptions {
                work_done_progress: None,
            },
            completion_item: None,
        }),
        signature_help_provider: None,
        definition_provider: Some(lsp::OneOf::Left(true)),
        type_definition_provider: None,
        implementation_provider: None,
        references_provider: None,
        document_highlight_provider: None,
        document_symbol_provider: None,
        workspace_symbol_provider: None,
        code_action_provider: None,
        code_lens_provider: None,
        document_formatting_provider: None,
        document_range_formatting_provider: None,
        document_on_type_formatting_provider: None,
        rename_provider: None,
        document_link_provider: None,
        color_provider: None,
        folding_range_provider: None,
        declaration_provider: None,
        execute_command_provider: None,
        workspace: None,
        call_hierarchy_provider: None,
        semantic_tokens_provider: None,
        moniker_provider: None,
        linked_editing_range_provider: None,
        inline_value_provider: None,
        inlay_hint_provider: None,
        diagnostic_provider: None,
        experimental: None,
    };

    let capabilities_json = serde_json::to_value(capabilities).expect("capabilities to json");
    let initialize_params_json = conn.initialize(capabilities_json).expect("lsp initialize");
    serde_json::from_value(initialize_params_json).expect("initialize params from json")
}

fn seed_workspace(conn: &Connection, context: &mut ServerContext, params: &lsp::InitializeParams) {
    #[allow(deprecated)]
    let root = params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok())
        .or_else(|| params.root_path.clone().map(PathBuf::from));
    let Some(root) = root else {
        tracing::info!("no workspace root, serving open documents only");
        return;
    };

    tracing::info!(root = %root.display(), "seeding workspace");
    if let Err(error) = context.seed_workspace(&root) {
        tracing::error!(msg = error.msg(), "workspace seeding failed");
        let params = lsp::ShowMessageParams {
            typ: lsp::MessageType::ERROR,
            message: error.msg().to_string(),
        };
        send(
            conn,
            lsp_server::Notification::new(
                notification::ShowMessage::METHOD.into(),
                serde_json::to_value(params).expect("params to json"),
            ),
        );
    }
}

fn server_loop(conn: &Connection, context: &mut ServerContext) {
    let mut buffer = MessageBuffer::new();
    loop {
        match buffer.receive(conn) {
            Action::Stop => {
                context.shutdown();
                break;
            }
            Action::Collect => continue,
            Action::Handle(messages) => handle_messages(conn, context, messages),
        }
    }
}

fn handle_messages(conn: &Connection, context: &mut ServerContext, messages: Vec<Message>) {
    for message in messages {
        match message {
            Message::Request(id, req) => handle_request(conn, context, id, req),
            Message::Notification(not) => handle_notification(conn, context, not),
            Message::CheckProject => publish_diagnostics(conn, context),
        }
    }
}

fn handle_request(conn: &Connection, context: &mut ServerContext, id: RequestId, req: Request) {
    match req {
        Request::Completion(params) => {
            let items = context.completion(&params);
            let json = serde_json::to_value(items).expect("items to json");
            send_response(conn, id, json);
        }
        Request::GotoDefinition(params) => {
            let location = context.goto_definition(&params);
            let json = serde_json::to_value(location).expect("location to json");
            send_response(conn, id, json);
        }
    }
}

fn handle_notification(conn: &Connection, context: &mut ServerContext, not: Notification) {
    match not {
        Notification::Opened { uri, language_id, version, text } => {
            if context.open_document(&uri, &language_id, version, text).is_some() {
                // the opened document gets its diagnostics right away
                for publish in context.check_project() {
                    if publish.uri == uri {
                        send_publish(conn, publish);
                    }
                }
            }
        }
        Notification::Changed { uri, version, changes } => {
            let _ = context.change_document(&uri, version, &changes);
        }
        Notification::Closed { uri } => {
            tracing::info!(%uri, "document closed");
            send_publish(conn, lsp::PublishDiagnosticsParams::new(uri, Vec::new(), None));
        }
    }
}

fn publish_diagnostics(conn: &Connection, context: &mut ServerContext) {
    for publish in context.check_project() {
        send_publish(conn, publish);
    }
}

fn send_publish(conn: &Connection, publish: lsp::PublishDiagnosticsParams) {
    send(
        conn,
        lsp_server::Notification::new(
            notification::PublishDiagnostics::METHOD.into(),
            serde_json::to_value(publish).expect("params to json"),
        ),
    );
}

fn send_response(conn: &Connection, id: RequestId, result: serde_json::Value) {
    let response = lsp_server::Response::new_ok(id, result);
    send(conn, response);
}

fn send<Content: Into<lsp_server::Message>>(conn: &Connection, msg: Content) {
    if conn.sender.send(msg.into()).is_err() {
        tracing::error!("connection closed while sending");
    }
}
