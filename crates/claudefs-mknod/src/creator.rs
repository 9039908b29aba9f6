//! Node creation and the replace-on-conflict policy.
//!
//! A creation attempt that finds the path occupied is not an error by itself.
//! Depending on the request's [`ConflictPolicy`] the existing entry is
//! accepted, re-chmodded, or deleted and created again exactly once.

use crate::error::{MknodError, Result};
use crate::fs::NodeFs;
use crate::node::{ConflictPolicy, EntryStat, NodeKind, NodeRequest, S_IFMT};
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

/// What happened at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The node was created on the first attempt.
    Created,
    /// An entry of the same type was accepted without any change.
    Reused,
    /// The existing entry already matched type and permissions exactly.
    Unchanged,
    /// The existing entry matched in type; its permissions were updated.
    ModeUpdated,
    /// The existing entry was deleted and the node created again.
    Replaced,
}

/// Result of the optional ownership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipStatus {
    /// Neither owner nor group was requested, or the entry was reused.
    NotRequested,
    /// Owner and group were set.
    Applied,
    /// The node exists but its owner could not be set.
    Failed(String),
}

/// What `NodeCreator::create` did for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    /// Path of the node.
    pub path: PathBuf,
    /// How the node came to exist.
    pub outcome: CreateOutcome,
    /// Result of the ownership change.
    pub ownership: OwnershipStatus,
}

/// Decision taken for an occupied path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Leave the entry as it is and skip ownership changes.
    Accept,
    /// The entry already matches exactly.
    Keep,
    /// Re-apply these permission bits.
    Chmod(u32),
    /// Delete the entry and retry creation once.
    Recreate,
}

/// Outcome of a single creation call.
#[derive(Debug)]
enum Attempt {
    Created,
    Conflict(PathBuf),
}

/// Chooses how to treat an existing entry under one of the replace policies.
///
/// A missing snapshot, or a device whose identifier differs from the request,
/// counts as a type mismatch. Type always wins over permissions.
pub fn decide(req: &NodeRequest, snapshot: Option<EntryStat>) -> ConflictAction {
    let matching = snapshot
        .filter(|st| req.kind.is_fifo() || Some(st.rdev) == req.device)
        .filter(|st| st.type_bits() == req.mode & S_IFMT);

    match (matching, req.policy) {
        (None, _) => ConflictAction::Recreate,
        (Some(_), ConflictPolicy::ReplaceIfTypeMatches) => ConflictAction::Accept,
        (Some(st), _) if st.mode == req.mode => ConflictAction::Keep,
        (Some(_), _) => ConflictAction::Chmod(req.mode),
    }
}

/// Creates special files through a [`NodeFs`].
pub struct NodeCreator<'a, F: NodeFs + ?Sized> {
    fs: &'a F,
}

impl<'a, F: NodeFs + ?Sized> NodeCreator<'a, F> {
    /// A creator issuing every call through `fs`.
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Creates the node described by `req`, resolving conflicts per its policy.
    pub fn create(&self, req: &NodeRequest) -> Result<NodeReport> {
        let outcome = match self.attempt(req)? {
            Attempt::Created => CreateOutcome::Created,
            Attempt::Conflict(path) => {
                if req.policy == ConflictPolicy::Fail {
                    return Err(MknodError::Exists { path });
                }
                self.resolve_conflict(req)?
            }
        };

        if outcome == CreateOutcome::Reused {
            return Ok(NodeReport {
                path: req.path.clone(),
                outcome,
                ownership: OwnershipStatus::NotRequested,
            });
        }

        let ownership = self.apply_ownership(req);
        Ok(NodeReport {
            path: req.path.clone(),
            outcome,
            ownership,
        })
    }

    fn make(&self, req: &NodeRequest) -> io::Result<()> {
        // the mode is already masked; the kernel must not mask it again
        self.fs.umask(0);
        match (req.kind, req.device) {
            (NodeKind::Fifo, _) => self.fs.mkfifo(&req.path, req.mode),
            (_, dev) => self.fs.mknod(&req.path, req.mode, dev.unwrap_or(0)),
        }
    }

    fn attempt(&self, req: &NodeRequest) -> Result<Attempt> {
        match self.make(req) {
            Ok(()) => {
                debug!("created {} mode {:o}", req.path.display(), req.mode);
                Ok(Attempt::Created)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists", req.path.display());
                Ok(Attempt::Conflict(req.path.clone()))
            }
            Err(e) => Err(MknodError::syscall(&req.path, e)),
        }
    }

    fn resolve_conflict(&self, req: &NodeRequest) -> Result<CreateOutcome> {
        let snapshot = match self.fs.lstat(&req.path) {
            Ok(st) => Some(st),
            Err(e) => {
                debug!("lstat {} failed: {}", req.path.display(), e);
                None
            }
        };

        match decide(req, snapshot) {
            ConflictAction::Accept => Ok(CreateOutcome::Reused),
            ConflictAction::Keep => Ok(CreateOutcome::Unchanged),
            ConflictAction::Chmod(mode) => {
                debug!("chmod {} {:o}", req.path.display(), mode);
                self.fs
                    .chmod(&req.path, mode)
                    .map_err(|e| MknodError::syscall(&req.path, e))?;
                Ok(CreateOutcome::ModeUpdated)
            }
            ConflictAction::Recreate => {
                debug!("replacing {}", req.path.display());
                if let Err(e) = self.fs.unlink(&req.path) {
                    warn!("unlink {} failed: {}", req.path.display(), e);
                }
                self.make(req)
                    .map_err(|e| MknodError::syscall(&req.path, e))?;
                Ok(CreateOutcome::Replaced)
            }
        }
    }

    fn apply_ownership(&self, req: &NodeRequest) -> OwnershipStatus {
        if !req.wants_ownership() {
            return OwnershipStatus::NotRequested;
        }
        match self.fs.chown(&req.path, req.owner, req.group) {
            Ok(()) => OwnershipStatus::Applied,
            Err(e) => {
                warn!("{}: uid/gid not changed: {}", req.path.display(), e);
                OwnershipStatus::Failed(e.to_string())
            }
        }
    }
}
