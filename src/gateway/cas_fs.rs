use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleaningError, Result};
use crate::packager::sha256_hex;

const PAYLOAD_REF_PREFIX: &str = "cas:sha256:";

/// `<root>/sha256/ab/cd/abcd...`
pub fn cas_path(root: &Path, hex: &str) -> PathBuf {
    root.join("sha256").join(&hex[0..2]).join(&hex[2..4]).join(hex)
}

/// Store `bytes` under their SHA-256 and return the hex digest. Writing the
/// same content twice is a no-op.
pub fn write_cas(root: &Path, bytes: &[u8]) -> Result<String> {
    let hex = sha256_hex(bytes);
    let path = cas_path(root, &hex);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    if !path.exists() {
        // A blob only appears under its digest once fully written.
        let tmp = path.with_extension("partial");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
    }
    Ok(hex)
}

/// Path of a stored blob after checking its content still matches `hex`.
pub fn verified_path(root: &Path, hex: &str) -> Result<PathBuf> {
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CleaningError::Registry(format!("malformed digest '{}'", hex)));
    }
    let path = cas_path(root, hex);
    let bytes = fs::read(&path).map_err(|e| {
        CleaningError::Registry(format!("blob {} unreadable: {}", path.display(), e))
    })?;
    let actual = sha256_hex(&bytes);
    if actual != hex {
        return Err(CleaningError::Registry(format!(
            "blob {} is corrupt: expected sha256 {}, found {}",
            path.display(),
            hex,
            actual
        )));
    }
    Ok(path)
}

pub fn payload_ref(hex: &str) -> String {
    format!("{}{}", PAYLOAD_REF_PREFIX, hex)
}
