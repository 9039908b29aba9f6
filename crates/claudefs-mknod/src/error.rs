//! Error type shared by the node tools.

use crate::devnum::DevNumError;
use crate::mount::MountError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or carrying out a node request.
#[derive(Debug, Error)]
pub enum MknodError {
    /// Malformed invocation, with the diagnostic to print.
    #[error("{0}")]
    Usage(String),

    /// Too few or too many operands for the node type.
    #[error("wrong number of arguments")]
    WrongArgCount,

    /// Device number format lookup or encoding failed.
    #[error(transparent)]
    DevNum(#[from] DevNumError),

    /// A numeric operand could not be parsed.
    #[error("invalid number: {value}")]
    InvalidNumber {
        /// The operand as given.
        value: String,
    },

    /// A permission expression could not be parsed.
    #[error("Cannot set file mode `{expr}'")]
    InvalidMode {
        /// The expression as given.
        expr: String,
    },

    /// The `-u` argument names no known user.
    #[error("{name}: invalid user name")]
    UnknownUser {
        /// The token as given.
        name: String,
    },

    /// The `-g` argument names no known group.
    #[error("{name}: invalid group name")]
    UnknownGroup {
        /// The token as given.
        name: String,
    },

    /// The path is occupied and no replace policy was requested.
    #[error("{}: File exists", path.display())]
    Exists {
        /// The contested path.
        path: PathBuf,
    },

    /// A filesystem call failed.
    #[error("{}: {source}", path.display())]
    Syscall {
        /// Path the call was made on.
        path: PathBuf,
        /// Error returned by the call.
        #[source]
        source: std::io::Error,
    },

    /// Mount dispatch rejected its arguments.
    #[error(transparent)]
    Mount(#[from] MountError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MknodError>;

impl MknodError {
    /// Wraps a failed filesystem call on `path`.
    pub fn syscall(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MknodError::Syscall {
            path: path.into(),
            source,
        }
    }

    /// True for errors detected before any filesystem mutation.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            MknodError::Usage(_)
                | MknodError::WrongArgCount
                | MknodError::DevNum(_)
                | MknodError::InvalidNumber { .. }
                | MknodError::InvalidMode { .. }
                | MknodError::UnknownUser { .. }
                | MknodError::UnknownGroup { .. }
        )
    }

    /// Whether the usage text should accompany the diagnostic.
    pub fn wants_usage_text(&self) -> bool {
        matches!(self, MknodError::WrongArgCount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exists_message() {
        let err = MknodError::Exists {
            path: PathBuf::from("/tmp/p"),
        };
        assert_eq!(err.to_string(), "/tmp/p: File exists");
    }

    #[test]
    fn test_syscall_keeps_source_and_path() {
        let io = std::io::Error::from_raw_os_error(libc::EPERM);
        let err = MknodError::syscall("/dev/sda9", io);
        match &err {
            MknodError::Syscall { path, source } => {
                assert_eq!(path, &PathBuf::from("/dev/sda9"));
                assert_eq!(source.raw_os_error(), Some(libc::EPERM));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().starts_with("/dev/sda9: "));
        assert!(!err.is_usage());
    }

    #[test]
    fn test_usage_classification() {
        assert!(MknodError::Usage("x".to_string()).is_usage());
        assert!(MknodError::InvalidNumber {
            value: "q".to_string()
        }
        .is_usage());
        assert!(MknodError::DevNum(DevNumError::InvalidMajor { value: 1 }).is_usage());
        assert!(!MknodError::Exists {
            path: PathBuf::from("a")
        }
        .is_usage());
    }

    #[test]
    fn test_only_arg_count_prints_usage_text() {
        assert!(MknodError::WrongArgCount.wants_usage_text());
        assert!(MknodError::WrongArgCount.is_usage());
        assert!(!MknodError::Usage("x".to_string()).wants_usage_text());
        assert!(!MknodError::InvalidMode {
            expr: "q".to_string()
        }
        .wants_usage_text());
    }

    #[test]
    fn test_invalid_mode_message() {
        let err = MknodError::InvalidMode {
            expr: "u+q".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot set file mode `u+q'");
        assert!(err.is_usage());
    }

    #[test]
    fn test_devnum_message_is_verbatim() {
        let err: MknodError = DevNumError::InvalidMinor { value: 4096 }.into();
        assert_eq!(err.to_string(), "invalid minor number: 4096");
    }
}
