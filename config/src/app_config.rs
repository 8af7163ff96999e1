use directories::ProjectDirs;
use std::{
    env,
    path::PathBuf,
};

pub(crate) const PROJECT_NAME: &str = "SSH_BATCH_PLUGIN";

lazy_static::lazy_static! {
    static ref CONFIG_FOLDER: Option<PathBuf> = env::var(format!("{PROJECT_NAME}_CONFIG"))
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);
}

pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = CONFIG_FOLDER.clone() {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

/// The file consulted when no explicit path is given.
pub fn default_config_file() -> PathBuf {
    get_config_dir().join("config.json")
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "nms", "ssh-batch-plugin")
}
