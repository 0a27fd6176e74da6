use lsp_server::{Connection, RequestId};
use lsp_types as lsp;
use lsp_types::notification::{self, Notification as NotificationTrait};
use lsp_types::request::{self, Request as RequestTrait};
use std::time::Duration;

/// Buffers incoming messages so edit bursts coalesce: notifications
/// collect, and either a request or a pause flushes the queue with a
/// project check prepended. N buffered changes then cost one analysis.
pub struct MessageBuffer {
    messages: Vec<Message>,
}

pub enum Action {
    Stop,
    Collect,
    Handle(Vec<Message>),
}

pub enum Message {
    Request(RequestId, Request),
    Notification(Notification),
    CheckProject,
}

pub enum Request {
    Completion(lsp::CompletionParams),
    GotoDefinition(lsp::GotoDefinitionParams),
}

pub enum Notification {
    Opened {
        uri: lsp::Url,
        language_id: String,
        version: i32,
        text: String,
    },
    Changed {
        uri: lsp::Url,
        version: i32,
        changes: Vec<lsp::TextDocumentContentChangeEvent>,
    },
    Closed {
        uri: lsp::Url,
    },
}

impl MessageBuffer {
    pub fn new() -> MessageBuffer {
        MessageBuffer { messages: Vec::new() }
    }

    pub fn receive(&mut self, conn: &Connection) -> Action {
        let message = if self.messages.is_empty() {
            conn.receiver.recv().ok()
        } else {
            let pause = Duration::from_millis(150);
            conn.receiver.recv_timeout(pause).ok()
        };

        match message {
            Some(lsp_server::Message::Request(req)) => self.on_request(conn, req),
            Some(lsp_server::Message::Response(resp)) => self.on_response(resp),
            Some(lsp_server::Message::Notification(not)) => self.on_notification(not),
            None => self.on_pause(),
        }
    }

    fn on_request(&mut self, conn: &Connection, req: lsp_server::Request) -> Action {
        match conn.handle_shutdown(&req) {
            Ok(true) => return Action::Stop,
            Ok(false) => {}
            Err(_) => return Action::Stop,
        }
        if let Some(message) = extract_request(req) {
            self.messages.push(Message::CheckProject);
            self.messages.push(message);
            Action::Handle(self.take_messages())
        } else {
            Action::Collect
        }
    }

    fn on_response(&self, _: lsp_server::Response) -> Action {
        Action::Collect
    }

    fn on_notification(&mut self, not: lsp_server::Notification) -> Action {
        if not.method == notification::Exit::METHOD {
            return Action::Stop;
        }
        if let Some(message) = extract_notification(not) {
            self.messages.push(message);
        }
        Action::Collect
    }

    fn on_pause(&mut self) -> Action {
        self.messages.push(Message::CheckProject);
        Action::Handle(self.take_messages())
    }

    fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}

fn extract_request(request: lsp_server::Request) -> Option<Message> {
    use request::{Completion, GotoDefinition};

    let id = request.id.clone();
    let request = match request.method.as_str() {
        Completion::METHOD => Request::Completion(cast_request::<Completion>(request)?),
        GotoDefinition::METHOD => {
            Request::GotoDefinition(cast_request::<GotoDefinition>(request)?)
        }
        _ => {
            tracing::warn!(method = %request.method, "unknown request ignored");
            return None;
        }
    };
    Some(Message::Request(id, request))
}

fn extract_notification(notification: lsp_server::Notification) -> Option<Message> {
    use notification::{DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument};

    let notification = match notification.method.as_str() {
        DidOpenTextDocument::METHOD => {
            let params = cast_notification::<DidOpenTextDocument>(notification)?;
            Notification::Opened {
                uri: params.text_document.uri,
                language_id: params.text_document.language_id,
                version: params.text_document.version,
                text: params.text_document.text,
            }
        }
        DidChangeTextDocument::METHOD => {
            let params = cast_notification::<DidChangeTextDocument>(notification)?;
            Notification::Changed {
                uri: params.text_document.uri,
                version: params.text_document.version,
                changes: params.content_changes,
            }
        }
        DidCloseTextDocument::METHOD => {
            let params = cast_notification::<DidCloseTextDocument>(notification)?;
            Notification::Closed { uri: params.text_document.uri }
        }
        _ => return None,
    };
    Some(Message::Notification(notification))
}

fn cast_request<R>(request: lsp_server::Request) -> Option<R::Params>
where
    R: RequestTrait,
    R::Params: serde::de::DeserializeOwned,
{
    match request.extract(R::METHOD) {
        Ok((_, params)) => Some(params),
        Err(error) => {
            tracing::warn!(%error, "malformed request params dropped");
            None
        }
    }
}

fn cast_notification<N>(notification: lsp_server::Notification) -> Option<N::Params>
where
    N: NotificationTrait,
    N::Params: serde::de::DeserializeOwned,
{
    match notification.extract(N::METHOD) {
        Ok(params) => Some(params),
        Err(error) => {
            tracing::warn!(%error, "malformed notification params dropped");
            None
        }
    }
}
