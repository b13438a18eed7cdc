use std::io;
use std::path::Path;

/// Reads a whole file, logging the path on failure.
pub(crate) fn load_binary(path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path).inspect_err(|err| log::warn!("Failed to read {:?}: {}", path, err))
}

/// Reads a UTF-8 text file such as a WGSL shader.
pub(crate) fn load_text(path: &Path) -> io::Result<String> {
    let bytes = load_binary(path)?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
