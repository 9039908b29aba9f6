//! In-memory filesystem implementing [`NodeFs`].
//!
//! Behaves like the kernel for the calls the node creator makes: creation
//! honours the current creation mask and fails with `EEXIST` on an occupied
//! path, `unlink` refuses directories. Failures can be injected per
//! operation, and every call is recorded so callers can check which
//! operations ran.

use crate::fs::NodeFs;
use crate::node::{EntryStat, PERM_MASK, S_IFMT};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Operations recorded and subject to fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemOp {
    /// `NodeFs::mkfifo`.
    Mkfifo,
    /// `NodeFs::mknod`.
    Mknod,
    /// `NodeFs::lstat`.
    Lstat,
    /// `NodeFs::unlink`.
    Unlink,
    /// `NodeFs::chmod`.
    Chmod,
    /// `NodeFs::chown`.
    Chown,
}

/// One stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemEntry {
    /// Type and permission bits.
    pub mode: u32,
    /// Device identifier, zero for non-devices.
    pub rdev: u64,
    /// Owner.
    pub uid: u32,
    /// Group.
    pub gid: u32,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<PathBuf, MemEntry>,
    umask: u32,
    faults: HashMap<MemOp, i32>,
    log: Vec<MemOp>,
}

/// Filesystem held entirely in memory, keyed by path.
#[derive(Debug, Default)]
pub struct MemFs {
    state: RefCell<State>,
}

impl MemFs {
    /// Empty filesystem with a zero creation mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the given creation mask, as a process would inherit it.
    pub fn with_umask(umask: u32) -> Self {
        let fs = Self::new();
        fs.state.borrow_mut().umask = umask & 0o777;
        fs
    }

    /// Makes every later call of `op` fail with `errno`.
    pub fn inject(&self, op: MemOp, errno: i32) {
        self.state.borrow_mut().faults.insert(op, errno);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Stores `entry` at `path`, replacing what was there.
    pub fn insert(&self, path: impl Into<PathBuf>, entry: MemEntry) {
        self.state.borrow_mut().entries.insert(path.into(), entry);
    }

    /// Adds a directory owned by root.
    pub fn add_dir(&self, path: impl Into<PathBuf>, perms: u32) {
        self.insert(
            path,
            MemEntry {
                mode: S_IFDIR | (perms & PERM_MASK),
                rdev: 0,
                uid: 0,
                gid: 0,
            },
        );
    }

    /// Adds a regular file owned by root.
    pub fn add_file(&self, path: impl Into<PathBuf>, perms: u32) {
        self.insert(
            path,
            MemEntry {
                mode: S_IFREG | (perms & PERM_MASK),
                rdev: 0,
                uid: 0,
                gid: 0,
            },
        );
    }

    /// The entry at `path`, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<MemEntry> {
        self.state.borrow().entries.get(path.as_ref()).copied()
    }

    /// Creation mask currently in effect.
    pub fn current_umask(&self) -> u32 {
        self.state.borrow().umask
    }

    /// Operations performed so far, in order.
    pub fn ops(&self) -> Vec<MemOp> {
        self.state.borrow().log.clone()
    }

    /// Number of times `op` was called.
    pub fn count(&self, op: MemOp) -> usize {
        self.state.borrow().log.iter().filter(|o| **o == op).count()
    }

    fn enter(&self, op: MemOp) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.log.push(op);
        match state.faults.get(&op) {
            Some(errno) => Err(io::Error::from_raw_os_error(*errno)),
            None => Ok(()),
        }
    }

    fn create(&self, path: &Path, mode: u32, rdev: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.entries.contains_key(path) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        let perms = mode & PERM_MASK & !state.umask;
        state.entries.insert(
            path.to_path_buf(),
            MemEntry {
                mode: (mode & S_IFMT) | perms,
                rdev,
                uid: 0,
                gid: 0,
            },
        );
        Ok(())
    }

    fn with_entry<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut MemEntry) -> T,
    ) -> io::Result<T> {
        let mut state = self.state.borrow_mut();
        state
            .entries
            .get_mut(path)
            .map(f)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

impl NodeFs for MemFs {
    fn mkfifo(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.enter(MemOp::Mkfifo)?;
        self.create(path, crate::node::S_IFIFO | (mode & PERM_MASK), 0)
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> io::Result<()> {
        self.enter(MemOp::Mknod)?;
        if mode & S_IFMT == 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.create(path, mode, dev)
    }

    fn lstat(&self, path: &Path) -> io::Result<EntryStat> {
        self.enter(MemOp::Lstat)?;
        self.with_entry(path, |e| EntryStat {
            mode: e.mode,
            rdev: e.rdev,
        })
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        self.enter(MemOp::Unlink)?;
        let mut state = self.state.borrow_mut();
        match state.entries.get(path) {
            None => Err(io::Error::from_raw_os_error(libc::ENOENT)),
            Some(e) if e.mode & S_IFMT == S_IFDIR => {
                Err(io::Error::from_raw_os_error(libc::EISDIR))
            }
            Some(_) => {
                state.entries.remove(path);
                Ok(())
            }
        }
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.enter(MemOp::Chmod)?;
        self.with_entry(path, |e| e.mode = (e.mode & S_IFMT) | (mode & PERM_MASK))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        self.enter(MemOp::Chown)?;
        self.with_entry(path, |e| {
            if let Some(uid) = uid {
                e.uid = uid;
            }
            if let Some(gid) = gid {
                e.gid = gid;
            }
        })
    }

    fn umask(&self, mask: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        std::mem::replace(&mut state.umask, mask & 0o777)
    }
}
