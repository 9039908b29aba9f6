//! Command-line surfaces of `cfs-mknod` and `cfs-mkfifo`.

use crate::batch::{self, BatchSummary, FailureMode};
use crate::creator::{NodeCreator, NodeReport, OwnershipStatus};
use crate::devnum::{self, MAX_FIELDS};
use crate::error::{MknodError, Result};
use crate::fs::NodeFs;
use crate::ident;
use crate::mode::{CreationMask, ModeSpec};
use crate::mount::MOUNT_USAGE;
use crate::node::{
    parse_number, resolve_device, ConflictPolicy, NodeKind, NodeRequest, DEFAULT_PERMS, PERM_MASK,
};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Program name used in `cfs-mknod` diagnostics.
pub const MKNOD_PROG: &str = "cfs-mknod";
/// Program name used in `cfs-mkfifo` diagnostics.
pub const MKFIFO_PROG: &str = "cfs-mkfifo";

/// Arguments of `cfs-mknod`.
#[derive(Parser, Debug)]
#[command(name = "cfs-mknod")]
#[command(about = "Create device nodes and fifos", long_about = None)]
pub struct MknodArgs {
    /// Accept an existing node of the same type and device number as-is
    #[arg(short = 'r', overrides_with = "replace_all")]
    pub replace_matching: bool,

    /// Replace an existing entry unless it already matches exactly
    #[arg(short = 'R', overrides_with = "replace_matching")]
    pub replace_all: bool,

    /// Device number format used to combine several numbers
    #[arg(short = 'F', value_name = "format")]
    pub format: Option<String>,

    /// Permissions, octal or symbolic, relative to the masked default
    #[arg(short = 'm', value_name = "mode")]
    pub mode: Option<String>,

    /// Owner of the new node; -1 leaves it unchanged
    #[arg(short = 'u', value_name = "user", allow_hyphen_values = true)]
    pub user: Option<String>,

    /// Group of the new node; -1 leaves it unchanged
    #[arg(short = 'g', value_name = "group", allow_hyphen_values = true)]
    pub group: Option<String>,

    /// Path of the node to create
    pub name: PathBuf,

    /// b, c or p
    #[arg(value_name = "type")]
    pub kind: String,

    /// One combined device number, or the fields the format combines
    #[arg(value_name = "number")]
    pub numbers: Vec<String>,
}

impl MknodArgs {
    /// Conflict policy selected by `-r` / `-R`.
    pub fn policy(&self) -> ConflictPolicy {
        if self.replace_all {
            ConflictPolicy::ReplaceUnconditionally
        } else if self.replace_matching {
            ConflictPolicy::ReplaceIfTypeMatches
        } else {
            ConflictPolicy::Fail
        }
    }

    /// Builds the creation request. Every usage error surfaces here, before
    /// anything touches the filesystem.
    pub fn to_request(&self, mask: CreationMask) -> Result<NodeRequest> {
        let format = self.format.as_deref().map(devnum::lookup).transpose()?;
        let owner = self.user.as_deref().map(ident::resolve_user).transpose()?.flatten();
        let group = self.group.as_deref().map(ident::resolve_group).transpose()?.flatten();
        let spec = self
            .mode
            .as_deref()
            .map(|expr| ModeSpec::parse(expr, mask))
            .transpose()?;

        let kind = NodeKind::from_token(&self.kind)?;
        if kind.is_fifo() && format.is_some() {
            return Err(MknodError::Usage(
                "format is meaningless for fifos".to_string(),
            ));
        }
        let accepted = if kind.is_fifo() { 0..=0 } else { 1..=MAX_FIELDS };
        if !accepted.contains(&self.numbers.len()) {
            return Err(MknodError::WrongArgCount);
        }

        let numbers = self
            .numbers
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>>>()?;
        let device = resolve_device(kind, &numbers, format)?;

        let base = mask.default_perms();
        let perms = match spec {
            Some(spec) => spec.resolve(base) & PERM_MASK,
            None => base,
        };

        Ok(NodeRequest::new(&self.name, kind, perms, device)?
            .with_owner(owner, group)
            .with_policy(self.policy()))
    }
}

/// Arguments of `cfs-mkfifo`.
#[derive(Parser, Debug)]
#[command(name = "cfs-mkfifo")]
#[command(about = "Create named pipes", long_about = None)]
pub struct MkfifoArgs {
    /// Permissions, octal or symbolic, relative to a=rw
    #[arg(short = 'm', value_name = "mode")]
    pub mode: Option<String>,

    /// Fifos to create
    #[arg(required = true, value_name = "fifoname")]
    pub paths: Vec<PathBuf>,
}

impl MkfifoArgs {
    /// Permission bits for every fifo. An explicit mode is taken relative to
    /// `a=rw`, not to the masked default.
    pub fn perms(&self, mask: CreationMask) -> Result<u32> {
        match &self.mode {
            Some(expr) => {
                let spec = ModeSpec::parse(expr, CreationMask::default())?;
                Ok(spec.resolve(DEFAULT_PERMS) & PERM_MASK)
            }
            None => Ok(mask.default_perms()),
        }
    }

    /// One fifo request per path, all with the same permissions.
    pub fn to_requests(&self, mask: CreationMask) -> Result<Vec<NodeRequest>> {
        let perms = self.perms(mask)?;
        self.paths
            .iter()
            .map(|p| NodeRequest::new(p, NodeKind::Fifo, perms, None))
            .collect()
    }
}

/// Usage line of `cfs-mknod`.
pub fn mknod_usage() -> String {
    format!(
        "{} {} [-rR] [-F format] [-m mode] [-u user] [-g group]\n                   \
         [ name [b | c] major minor\n                   \
         | name [b | c] major unit subunit\n                   \
         | name [b | c] number\n                   \
         | name p ]",
        MKNOD_PROG, MOUNT_USAGE
    )
}

/// Usage line of `cfs-mkfifo`.
pub fn mkfifo_usage() -> String {
    format!("{} {} [-m mode] fifoname ...", MKFIFO_PROG, MOUNT_USAGE)
}

/// The `cfs-mknod` command with its usage line and the list of `-F` formats.
pub fn mknod_command() -> clap::Command {
    let formats = devnum::names().collect::<Vec<_>>().join(", ");
    MknodArgs::command()
        .override_usage(mknod_usage())
        .after_help(format!("Formats for -F: {}", formats))
}

/// Parses `cfs-mknod` arguments (program name first).
pub fn parse_mknod(args: Vec<OsString>) -> std::result::Result<MknodArgs, clap::Error> {
    let matches = mknod_command().try_get_matches_from(args)?;
    MknodArgs::from_arg_matches(&matches)
}

/// Parses `cfs-mkfifo` arguments (program name first).
pub fn parse_mkfifo(args: Vec<OsString>) -> std::result::Result<MkfifoArgs, clap::Error> {
    let matches = MkfifoArgs::command()
        .override_usage(mkfifo_usage())
        .try_get_matches_from(args)?;
    MkfifoArgs::from_arg_matches(&matches)
}

/// Exit status for a clap parse error: help and version are not failures.
pub fn clap_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

fn warn_ownership<W: Write>(prog: &str, report: &NodeReport, err: &mut W) {
    if let OwnershipStatus::Failed(reason) = &report.ownership {
        let _ = writeln!(
            err,
            "{}: {}: uid/gid not changed: {}",
            prog,
            report.path.display(),
            reason
        );
    }
}

/// Runs the general node surface: one path, fatal on the first error.
pub fn run_mknod<F, W>(args: &MknodArgs, fs: &F, err: &mut W) -> Result<BatchSummary>
where
    F: NodeFs + ?Sized,
    W: Write,
{
    let mask = CreationMask::capture(fs);
    let request = args.to_request(mask)?;
    let creator = NodeCreator::new(fs);
    batch::run(
        [request],
        FailureMode::StopOnError,
        |req| {
            let report = creator.create(req)?;
            warn_ownership(MKNOD_PROG, &report, err);
            Ok(report)
        },
        |_, _| {},
    )
}

/// Runs the fifo surface: every path is attempted, failures are reported and
/// counted.
pub fn run_mkfifo<F, W>(args: &MkfifoArgs, fs: &F, err: &mut W) -> Result<BatchSummary>
where
    F: NodeFs + ?Sized,
    W: Write,
{
    let mask = CreationMask::capture(fs);
    let requests = args.to_requests(mask)?;
    let creator = NodeCreator::new(fs);
    batch::run(
        requests,
        FailureMode::ContinueOnError,
        |req| creator.create(req),
        |_, e| {
            let _ = writeln!(err, "{}: {}", MKFIFO_PROG, e);
        },
    )
}

/// Installs the stderr log subscriber; the filter comes from `RUST_LOG`.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}
