use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

// ============== Text Helpers ==============

/// Truncate to `max_len` characters, appending `...` when something was cut.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== File Helpers ==============

/// Write `bytes` to `path` via a sibling temp file + rename.
///
/// Readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_sibling(path)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::Persistence {
            path: path.to_path_buf(),
            reason: format!("rename failed: {e}"),
        }
    })
}

fn tmp_sibling(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(Error::Persistence {
            path: path.to_path_buf(),
            reason: "path has no file name".to_string(),
        });
    };
    let mut tmp_name = name.to_os_string();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    Ok(path.with_file_name(tmp_name))
}
