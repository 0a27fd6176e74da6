use crate::error::Error;
use std::path::Path;

//==================== FILESYSTEM ====================

pub fn file_read(io_error: String, path: &Path) -> Error {
    let path = path.to_string_lossy();
    Error::message(format!("failed to read file: `{path}`\nreason: {io_error}"))
}

pub fn dir_read(io_error: String, path: &Path) -> Error {
    let path = path.to_string_lossy();
    Error::message(format!("failed to read directory: `{path}`\nreason: {io_error}"))
}

pub fn dir_entry_read(io_error: String, path: &Path) -> Error {
    let path = path.to_string_lossy();
    Error::message(format!("failed to read directory entry in: `{path}`\nreason: {io_error}"))
}

//==================== PROJECT MANIFEST ====================

pub fn manifest_parse(toml_error: String, path: &Path) -> Error {
    let path = path.to_string_lossy();
    Error::message(format!("failed to parse project manifest: `{path}`\nreason: {toml_error}"))
}
