use anyhow::{Result, anyhow};
use directories::UserDirs;
use std::{fs, path::PathBuf};

pub fn runtime_dir() -> Result<PathBuf> {
    // ~/.local/run
    let home = UserDirs::new()
        .ok_or_else(|| anyhow!("cannot determine home directory"))?
        .home_dir()
        .to_path_buf();
    let dir = home.join(".local").join("run");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Control requests from the CLI.
pub fn socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("handctl.sock"))
}

/// JSON-lines landmark frames from the pose source.
pub fn pose_socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("handctl-pose.sock"))
}
