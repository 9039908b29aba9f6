//! Node requests and the on-disk snapshot used when resolving conflicts.

use crate::devnum::{DevFormat, MAX_FIELDS};
use crate::error::{MknodError, Result};
use std::path::PathBuf;

/// Mask selecting the file type bits of a mode.
pub const S_IFMT: u32 = 0o170000;
/// Named pipe.
pub const S_IFIFO: u32 = 0o010000;
/// Character device.
pub const S_IFCHR: u32 = 0o020000;
/// Block device.
pub const S_IFBLK: u32 = 0o060000;
/// Symbolic link.
pub const S_IFLNK: u32 = 0o120000;
/// Permission bits including setuid, setgid and sticky.
pub const PERM_MASK: u32 = 0o7777;
/// Read and write for owner, group and other.
pub const DEFAULT_PERMS: u32 = 0o666;

/// Kind of special file to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Named pipe.
    Fifo,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
}

impl NodeKind {
    /// Parses the single-character node type token (`b`, `c` or `p`).
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "b" => Ok(NodeKind::BlockDevice),
            "c" => Ok(NodeKind::CharDevice),
            "p" => Ok(NodeKind::Fifo),
            _ => Err(MknodError::Usage(
                "node type must be 'b', 'c' or 'p'.".to_string(),
            )),
        }
    }

    /// Type bits for this kind.
    pub fn type_bits(&self) -> u32 {
        match self {
            NodeKind::Fifo => S_IFIFO,
            NodeKind::CharDevice => S_IFCHR,
            NodeKind::BlockDevice => S_IFBLK,
        }
    }

    /// True for named pipes.
    pub fn is_fifo(&self) -> bool {
        matches!(self, NodeKind::Fifo)
    }
}

/// What to do when the target path is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Report the conflict.
    #[default]
    Fail,
    /// Accept an existing entry of the same type as-is.
    ReplaceIfTypeMatches,
    /// Make the entry match exactly, re-chmodding or recreating it.
    ReplaceUnconditionally,
}

/// Status of an existing entry, taken without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    /// Type and permission bits.
    pub mode: u32,
    /// Device identifier, zero for non-device entries.
    pub rdev: u64,
}

impl EntryStat {
    /// File type bits of the entry.
    pub fn type_bits(&self) -> u32 {
        self.mode & S_IFMT
    }
}

/// Parameters of a single creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRequest {
    /// Where to create the node.
    pub path: PathBuf,
    /// Kind of node.
    pub kind: NodeKind,
    /// Type and permission bits; the type bits always agree with `kind`.
    pub mode: u32,
    /// Present iff `kind` is not a fifo.
    pub device: Option<u64>,
    /// Owner to set after creation; `None` leaves it unchanged.
    pub owner: Option<u32>,
    /// Group to set after creation; `None` leaves it unchanged.
    pub group: Option<u32>,
    /// What to do if the path is occupied.
    pub policy: ConflictPolicy,
}

impl NodeRequest {
    /// Builds a request, merging the type bits of `kind` into `perms`.
    pub fn new(
        path: impl Into<PathBuf>,
        kind: NodeKind,
        perms: u32,
        device: Option<u64>,
    ) -> Result<Self> {
        match (kind.is_fifo(), device) {
            (true, Some(_)) => {
                return Err(MknodError::Usage(
                    "a fifo does not take a device number".to_string(),
                ))
            }
            (false, None) => {
                return Err(MknodError::Usage(
                    "device nodes require a device number".to_string(),
                ))
            }
            _ => {}
        }
        Ok(Self {
            path: path.into(),
            kind,
            mode: (perms & PERM_MASK) | kind.type_bits(),
            device,
            owner: None,
            group: None,
            policy: ConflictPolicy::Fail,
        })
    }

    /// Sets the requested owner and group.
    pub fn with_owner(mut self, owner: Option<u32>, group: Option<u32>) -> Self {
        self.owner = owner;
        self.group = group;
        self
    }

    /// Sets the conflict policy.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Permission bits without the type bits.
    pub fn perms(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// True if either the owner or the group should change.
    pub fn wants_ownership(&self) -> bool {
        self.owner.is_some() || self.group.is_some()
    }
}

/// Resolves the device identifier for `kind` from the numeric operands.
///
/// Fifos take no operands and no format. A single operand is used verbatim,
/// even if a format was named. Two or more go through `format`, or the native
/// format when none was named.
pub fn resolve_device(
    kind: NodeKind,
    numbers: &[u64],
    format: Option<DevFormat>,
) -> Result<Option<u64>> {
    if kind.is_fifo() {
        if format.is_some() {
            return Err(MknodError::Usage(
                "format is meaningless for fifos".to_string(),
            ));
        }
        if !numbers.is_empty() {
            return Err(MknodError::WrongArgCount);
        }
        return Ok(None);
    }

    match numbers {
        [] => Err(MknodError::WrongArgCount),
        [dev] => Ok(Some(*dev)),
        _ if numbers.len() > MAX_FIELDS => Err(MknodError::WrongArgCount),
        _ => Ok(Some(format.unwrap_or_default().encode(numbers)?)),
    }
}

/// Parses a numeric operand with C `strtoul` base detection.
pub fn parse_number(arg: &str) -> Result<u64> {
    let invalid = || MknodError::InvalidNumber {
        value: arg.to_string(),
    };
    let (digits, radix) = if let Some(hex) = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
    {
        (hex, 16)
    } else if arg.len() > 1 && arg.starts_with('0') {
        (&arg[1..], 8)
    } else {
        (arg, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}
