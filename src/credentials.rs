use std::fmt;
use std::fs;
use std::path::Path;

use log::{error, info};

use crate::error::BackupError;

/// The two pre-issued bearer tokens. Read once at startup, never refreshed.
pub struct Credentials {
    pub vk_token: String,
    pub disk_token: String,
}

impl Credentials {
    pub fn load(vk_token_file: &Path, disk_token_file: &Path) -> Result<Credentials, BackupError> {
        Ok(Credentials {
            vk_token: read_token(vk_token_file)?,
            disk_token: read_token(disk_token_file)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("vk_token", &"<redacted>")
            .field("disk_token", &"<redacted>")
            .finish()
    }
}

pub fn read_token(path: &Path) -> Result<String, BackupError> {
    let token = fs::read_to_string(path)
        .map_err(|e| BackupError::io("read_token", path, e))
        .and_then(|raw| match raw.trim() {
            "" => Err(BackupError::InvalidToken(path.to_path_buf())),
            token => Ok(token.to_string()),
        })
        .inspect_err(|e| error!("{e}"))?;

    info!("token from file {} loaded", path.display());
    Ok(token)
}
