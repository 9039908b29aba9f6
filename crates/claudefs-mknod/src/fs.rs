//! Filesystem operations used by the node creator.
//!
//! Every call the creator makes goes through [`NodeFs`], so the same decision
//! logic runs against the host kernel, against a directory tree redirected by
//! the mount dispatch layer, or against an in-memory filesystem. No results
//! are cached between calls.

use crate::node::{EntryStat, PERM_MASK, S_IFLNK};
use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// The logical operations needed to create or replace a special file.
pub trait NodeFs {
    /// Creates a named pipe.
    fn mkfifo(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Creates a device node; `mode` carries the type bits.
    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> io::Result<()>;

    /// Status of `path` without following a trailing symlink.
    fn lstat(&self, path: &Path) -> io::Result<EntryStat>;

    /// Removes a non-directory entry.
    fn unlink(&self, path: &Path) -> io::Result<()>;

    /// Sets the permission bits; type bits in `mode` are ignored.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Changes ownership; `None` leaves that id unchanged.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;

    /// Sets the file-creation mask and returns the previous one.
    fn umask(&self, mask: u32) -> u32;
}

impl<T: NodeFs + ?Sized> NodeFs for Box<T> {
    fn mkfifo(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).mkfifo(path, mode)
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> io::Result<()> {
        (**self).mknod(path, mode, dev)
    }

    fn lstat(&self, path: &Path) -> io::Result<EntryStat> {
        (**self).lstat(path)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        (**self).unlink(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).chmod(path, mode)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        (**self).chown(path, uid, gid)
    }

    fn umask(&self, mask: u32) -> u32 {
        (**self).umask(mask)
    }
}

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "path contains an interior NUL byte")
    })
}

/// The host kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl HostFs {
    /// Handle on the host kernel.
    pub fn new() -> Self {
        Self
    }
}

impl NodeFs for HostFs {
    fn mkfifo(&self, path: &Path, mode: u32) -> io::Result<()> {
        let cpath = c_path(path)?;
        trace!("mkfifo {} {:o}", path.display(), mode);
        // SAFETY: cpath is a valid NUL-terminated string for the duration of the call.
        let ret = unsafe { libc::mkfifo(cpath.as_ptr(), (mode & PERM_MASK) as libc::mode_t) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> io::Result<()> {
        let cpath = c_path(path)?;
        trace!("mknod {} {:o} {:#x}", path.display(), mode, dev);
        // SAFETY: cpath is a valid NUL-terminated string for the duration of the call.
        let ret = unsafe {
            libc::mknod(
                cpath.as_ptr(),
                mode as libc::mode_t,
                dev as libc::dev_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn lstat(&self, path: &Path) -> io::Result<EntryStat> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(EntryStat {
            mode: meta.mode(),
            rdev: meta.rdev(),
        })
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & PERM_MASK))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::chown(path, uid, gid)
    }

    fn umask(&self, mask: u32) -> u32 {
        // SAFETY: umask has no failure mode and touches only process state.
        let old = unsafe { libc::umask((mask & 0o777) as libc::mode_t) };
        old as u32
    }
}

/// Redirects every path into a directory tree rooted at `root`.
///
/// Absolute request paths are taken relative to the root. Paths that would
/// climb above it are refused, and so are paths whose parent directories
/// pass through a symbolic link. The final component is never followed.
#[derive(Debug, Clone)]
pub struct RootedFs<F> {
    root: PathBuf,
    inner: F,
}

impl<F: NodeFs> RootedFs<F> {
    /// Wraps `inner` so that every path lands under `root`.
    pub fn new(root: impl Into<PathBuf>, inner: F) -> Self {
        Self {
            root: root.into(),
            inner,
        }
    }

    /// Maps a request path to the host path under the root.
    pub fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let refuse = |why: &str| {
            io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} {}", path.display(), why),
            )
        };

        let mut parts: Vec<&OsStr> = Vec::new();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(refuse("escapes the mount root"));
                    }
                }
                Component::Normal(part) => parts.push(part),
            }
        }

        let mut resolved = self.root.clone();
        if let Some((last, dirs)) = parts.split_last() {
            for dir in dirs {
                resolved.push(dir);
                // a missing directory is left for the real call to report
                if let Ok(st) = self.inner.lstat(&resolved) {
                    if st.type_bits() == S_IFLNK {
                        return Err(refuse("crosses a symbolic link inside the mount root"));
                    }
                }
            }
            resolved.push(last);
        }
        Ok(resolved)
    }
}

impl<F: NodeFs> NodeFs for RootedFs<F> {
    fn mkfifo(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.mkfifo(&self.resolve(path)?, mode)
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> io::Result<()> {
        self.inner.mknod(&self.resolve(path)?, mode, dev)
    }

    fn lstat(&self, path: &Path) -> io::Result<EntryStat> {
        self.inner.lstat(&self.resolve(path)?)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        self.inner.unlink(&self.resolve(path)?)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.chmod(&self.resolve(path)?, mode)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        self.inner.chown(&self.resolve(path)?, uid, gid)
    }

    fn umask(&self, mask: u32) -> u32 {
        self.inner.umask(mask)
    }
}
