//! Mount dispatch for the node tools.
//!
//! Before the tools parse their own flags, the dispatch layer consumes the
//! leading arguments it owns and decides where filesystem calls go: the host
//! kernel, or a filesystem image tree that is not visible in the native mount
//! table (for example the backing directory of a ClaudeFS FUSE export).

use crate::fs::{HostFs, NodeFs, RootedFs};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Usage fragment embedded in each tool's usage line.
pub const MOUNT_USAGE: &str = "[--root dir]";

/// Environment variable naming a default root.
pub const ROOT_ENV: &str = "CFS_NODE_ROOT";

const ROOT_FLAG: &str = "--root";

/// Errors that can occur during mount dispatch.
#[derive(Debug, Error)]
pub enum MountError {
    /// Path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A dispatch flag was given without its value.
    #[error("Option {0} requires an argument")]
    MissingArgument(String),
}

/// Where filesystem operations are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    /// The host kernel, paths used as given.
    Host,
    /// Every path redirected under this directory.
    Rooted(PathBuf),
}

impl MountTarget {
    /// The filesystem implementing this target.
    pub fn filesystem(&self) -> Box<dyn NodeFs> {
        match self {
            MountTarget::Host => Box::new(HostFs::new()),
            MountTarget::Rooted(root) => Box::new(RootedFs::new(root.clone(), HostFs::new())),
        }
    }
}

/// Validate a dispatch root.
pub fn validate_root(path: &Path) -> Result<(), MountError> {
    if !path.exists() {
        return Err(MountError::PathNotFound(path.display().to_string()));
    }

    if !path.is_dir() {
        return Err(MountError::NotADirectory(path.display().to_string()));
    }

    Ok(())
}

/// Consumes leading dispatch arguments from `args` (program name first).
///
/// `--root <dir>` or `--root=<dir>` directly after the program name selects a
/// rooted filesystem; otherwise `env_root` is used when set. Remaining
/// arguments are left for the tool.
pub fn dispatch(
    args: &mut Vec<OsString>,
    env_root: Option<OsString>,
) -> Result<MountTarget, MountError> {
    let mut root = env_root.filter(|r| !r.is_empty()).map(PathBuf::from);

    let first = args.get(1).cloned();
    if let Some(first) = first {
        if first == ROOT_FLAG {
            if args.len() < 3 {
                return Err(MountError::MissingArgument(ROOT_FLAG.to_string()));
            }
            root = Some(PathBuf::from(args.remove(2)));
            args.remove(1);
        } else if let Some(value) = first.to_str().and_then(|s| s.strip_prefix("--root=")) {
            if value.is_empty() {
                return Err(MountError::MissingArgument(ROOT_FLAG.to_string()));
            }
            root = Some(PathBuf::from(value));
            args.remove(1);
        }
    }

    match root {
        None => Ok(MountTarget::Host),
        Some(root) => {
            validate_root(&root)?;
            info!("dispatching node operations under {}", root.display());
            Ok(MountTarget::Rooted(root))
        }
    }
}
