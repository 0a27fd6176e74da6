use std::path::Path;
use vala_core::error::Error;
use vala_core::errors as err;
use vala_core::session::{self, FileKind, Session};

/// Seeds the compilation context from the workspace root: an optional
/// `vala-project.toml` manifest, then every `.vala` and `.vapi` file
/// under the tree. On error the session keeps whatever was added before
/// the failure; the caller surfaces the error to the editor.
pub fn seed(session: &mut Session, root: &Path) -> Result<(), Error> {
    let manifest_path = root.join("vala-project.toml");
    if manifest_path.exists() {
        let text = std::fs::read_to_string(&manifest_path)
            .map_err(|error| err::file_read(error.to_string(), &manifest_path))?;
        let manifest = session::manifest_deserialize(&text, &manifest_path)?;

        for using in &manifest.project.usings {
            session.add_using(using);
        }
        for dir in &manifest.project.vapi_dirs {
            session.add_vapidir(root.join(dir));
        }
        for c_source in &manifest.project.c_sources {
            session.add_c_source_file(root.join(c_source));
        }
        for package in &manifest.project.packages {
            if !session.add_package(package) {
                tracing::warn!(package, "no interface file found in vapi directories");
            }
        }
    }

    scan_directory(session, root)
}

fn scan_directory(session: &mut Session, dir: &Path) -> Result<(), Error> {
    let read_dir =
        std::fs::read_dir(dir).map_err(|error| err::dir_read(error.to_string(), dir))?;
    let mut entries: Vec<_> = read_dir
        .collect::<Result<_, _>>()
        .map_err(|error| err::dir_entry_read(error.to_string(), dir))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            if name == "build" || name == "target" {
                continue;
            }
            scan_directory(session, &path)?;
        } else if let Some(kind) = file_kind(&name) {
            let source = std::fs::read_to_string(&path)
                .map_err(|error| err::file_read(error.to_string(), &path))?;
            let _ = session.add_source_file(path, kind, source);
        }
    }
    Ok(())
}

fn file_kind(name: &str) -> Option<FileKind> {
    if name.ends_with(".vala") {
        Some(FileKind::Source)
    } else if name.ends_with(".vapi") {
        Some(FileKind::Package)
    } else {
        None
    }
}
