use lsp_types as lsp;
use std::path::PathBuf;
use vala_core::session::{FileID, FileKind, Session};

/// languageId the server accepts; anything else is ignored with a warning
pub const LANGUAGE_ID: &str = "vala";

pub fn uri_to_path(uri: &lsp::Url) -> Option<PathBuf> {
    uri.to_file_path().ok()
}

pub fn uri_for_file(session: &Session, file_id: FileID) -> Option<lsp::Url> {
    lsp::Url::from_file_path(&session.file(file_id).path).ok()
}

/// Creates or refreshes the document behind `uri` with editor-supplied
/// content. Non-vala documents are dropped here.
pub fn open_document(
    session: &mut Session,
    uri: &lsp::Url,
    language_id: &str,
    version: i32,
    text: String,
) -> Option<FileID> {
    if language_id != LANGUAGE_ID {
        tracing::warn!(%uri, language_id, "ignoring document with unsupported language");
        return None;
    }
    let Some(path) = uri_to_path(uri) else {
        tracing::warn!(%uri, "ignoring document with non-file uri");
        return None;
    };
    let file_id = session.add_source_file(path, FileKind::Source, text);
    session.file_mut(file_id).version = version.max(0);
    Some(file_id)
}

/// Applies a `didChange` payload. Stale versions are dropped. Each
/// change is either a full replacement (no range) or a splice of the
/// byte range resolved from its 0-based UTF-8 positions.
pub fn change_document(
    session: &mut Session,
    uri: &lsp::Url,
    version: i32,
    changes: &[lsp::TextDocumentContentChangeEvent],
) -> bool {
    let Some(path) = uri_to_path(uri) else {
        tracing::warn!(%uri, "change for non-file uri dropped");
        return false;
    };
    let Some(file_id) = session.file_by_path(&path) else {
        tracing::warn!(%uri, "change for unknown document dropped");
        return false;
    };
    if version < session.file(file_id).version {
        tracing::warn!(
            %uri,
            version,
            stored = session.file(file_id).version,
            "stale change dropped"
        );
        return false;
    }

    for change in changes {
        let file = session.file_mut(file_id);
        match change.range {
            None => file.set_source(change.text.clone()),
            Some(range) => {
                let start: usize = file.offset_at(range.start.line, range.start.character).into();
                let end: usize = file.offset_at(range.end.line, range.end.character).into();
                let start = clamp_boundary(&file.source, start);
                let end = clamp_boundary(&file.source, end.max(start));
                let mut source = std::mem::take(&mut file.source);
                source.replace_range(start..end, &change.text);
                file.set_source(source);
            }
        }
    }
    session.file_mut(file_id).version = version;
    session.invalidate();
    true
}

fn clamp_boundary(source: &str, mut offset: usize) -> usize {
    offset = offset.min(source.len());
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(session: &mut Session, uri: &lsp::Url, version: i32, text: &str) -> FileID {
        open_document(session, uri, LANGUAGE_ID, version, text.to_string()).unwrap()
    }

    fn full_change(text: &str) -> lsp::TextDocumentContentChangeEvent {
        lsp::TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.to_string(),
        }
    }

    fn splice(range: lsp::Range, text: &str) -> lsp::TextDocumentContentChangeEvent {
        lsp::TextDocumentContentChangeEvent {
            range: Some(range),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn wrong_language_is_ignored() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.rs").unwrap();
        let opened = open_document(&mut session, &uri, "rust", 1, "fn main() {}".into());
        assert!(opened.is_none());
    }

    #[test]
    fn stale_version_is_dropped() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.vala").unwrap();
        let file_id = open(&mut session, &uri, 3, "int a = 1;\n");
        let applied = change_document(&mut session, &uri, 2, &[full_change("int b = 2;\n")]);
        assert!(!applied);
        assert_eq!(session.file(file_id).source, "int a = 1;\n");
        assert_eq!(session.file(file_id).version, 3);
    }

    #[test]
    fn version_tracks_maximum() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.vala").unwrap();
        let file_id = open(&mut session, &uri, 1, "int a = 1;\n");
        assert!(change_document(&mut session, &uri, 5, &[full_change("int b = 2;\n")]));
        assert!(!change_document(&mut session, &uri, 4, &[full_change("int c = 3;\n")]));
        assert_eq!(session.file(file_id).version, 5);
        assert_eq!(session.file(file_id).source, "int b = 2;\n");
    }

    #[test]
    fn incremental_splice_uses_byte_offsets() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.vala").unwrap();
        let file_id = open(&mut session, &uri, 1, "int a = 1;\nint b = 2;\n");
        // replace `b` on line 1
        let range = lsp::Range::new(lsp::Position::new(1, 4), lsp::Position::new(1, 5));
        assert!(change_document(&mut session, &uri, 2, &[splice(range, "zz")]));
        assert_eq!(session.file(file_id).source, "int a = 1;\nint zz = 2;\n");
    }

    #[test]
    fn insertion_at_line_start_counts_newlines() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.vala").unwrap();
        let file_id = open(&mut session, &uri, 1, "aa\nbb\ncc\n");
        let at = lsp::Position::new(2, 0);
        let range = lsp::Range::new(at, at);
        assert!(change_document(&mut session, &uri, 2, &[splice(range, "xx")]));
        assert_eq!(session.file(file_id).source, "aa\nbb\nxxcc\n");
    }

    #[test]
    fn change_invalidates_session() {
        let mut session = Session::new();
        let uri = lsp::Url::from_file_path("/test/main.vala").unwrap();
        let _ = open(&mut session, &uri, 1, "int a = 1;\n");
        session.check();
        assert!(!session.dirty());
        assert!(change_document(&mut session, &uri, 2, &[full_change("int b = 2;\n")]));
        assert!(session.dirty());
    }
}
