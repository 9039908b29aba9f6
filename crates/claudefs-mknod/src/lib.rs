#![warn(missing_docs)]

//! ClaudeFS special file tooling: fifo and device node creation.
//!
//! The library backs the `cfs-mknod` and `cfs-mkfifo` tools: device number
//! formats, node requests, the replace-on-conflict creator, and the
//! filesystem seam that lets the same logic run on the host, under a
//! redirected root, or in memory.

pub mod batch;
pub mod cli;
pub mod creator;
pub mod devnum;
pub mod error;
pub mod fs;
pub mod ident;
pub mod memfs;
pub mod mode;
pub mod mount;
pub mod node;

pub use creator::{CreateOutcome, NodeCreator, NodeReport, OwnershipStatus};
pub use devnum::{DevFormat, DevNumError};
pub use error::{MknodError, Result};
pub use fs::{HostFs, NodeFs, RootedFs};
pub use node::{ConflictPolicy, EntryStat, NodeKind, NodeRequest};
