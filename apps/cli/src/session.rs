//! Session persistence for `--session FILE`.

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use sourcechat_shared::SessionState;

/// Load a session from JSON. A missing file is an empty session.
pub(crate) fn load(path: &Path) -> Result<SessionState> {
    if !path.exists() {
        return Ok(SessionState::new());
    }
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read session {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(SessionState::new());
    }
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("invalid session file {}", path.display()))
}

/// Write a session as pretty JSON, creating parent directories.
pub(crate) fn save(path: &Path, session: &SessionState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json)
        .wrap_err_with(|| format!("failed to write session {}", path.display()))
}
