//! User and group resolution for the `-u` / `-g` flags.

use crate::error::{MknodError, Result};
use std::ffi::CString;
use tracing::debug;

const INITIAL_BUF: usize = 1024;
const MAX_BUF: usize = 1 << 20;

/// Id token that leaves the owner or group as it is.
pub const UNCHANGED_ID: i64 = -1;

/// Numeric form of an id token: `#<n>` or a bare, possibly signed, integer.
pub fn parse_numeric_id(token: &str) -> Option<i64> {
    let number = token.strip_prefix('#').unwrap_or(token);
    let digits = number.strip_prefix('-').unwrap_or(number);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse().ok()
}

/// Maps a numeric id onto `chown` terms: `None` keeps the current id.
fn numeric_id(value: i64) -> Option<Option<u32>> {
    if value == UNCHANGED_ID {
        return Some(None);
    }
    u32::try_from(value).ok().map(Some)
}

/// Resolves a user token to a uid; `None` leaves the owner unchanged.
pub fn resolve_user(token: &str) -> Result<Option<u32>> {
    let unknown = || MknodError::UnknownUser {
        name: token.to_string(),
    };
    match parse_numeric_id(token) {
        Some(value) => numeric_id(value).ok_or_else(unknown),
        None => lookup_user(token).map(Some).ok_or_else(unknown),
    }
}

/// Resolves a group token to a gid; `None` leaves the group unchanged.
pub fn resolve_group(token: &str) -> Result<Option<u32>> {
    let unknown = || MknodError::UnknownGroup {
        name: token.to_string(),
    };
    match parse_numeric_id(token) {
        Some(value) => numeric_id(value).ok_or_else(unknown),
        None => lookup_group(token).map(Some).ok_or_else(unknown),
    }
}

fn lookup_user(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf_len = INITIAL_BUF;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        // SAFETY: passwd is plain old data; getpwnam_r fills it in.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: every pointer refers to a live local of the advertised size.
        let rc = unsafe {
            libc::getpwnam_r(
                cname.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf_len < MAX_BUF {
            buf_len *= 2;
            continue;
        }
        if rc != 0 || result.is_null() {
            debug!("user {} not found (rc {})", name, rc);
            return None;
        }
        return Some(pwd.pw_uid);
    }
}

fn lookup_group(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf_len = INITIAL_BUF;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        // SAFETY: group is plain old data; getgrnam_r fills it in.
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();
        // SAFETY: every pointer refers to a live local of the advertised size.
        let rc = unsafe {
            libc::getgrnam_r(
                cname.as_ptr(),
                &mut grp,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf_len < MAX_BUF {
            buf_len *= 2;
            continue;
        }
        if rc != 0 || result.is_null() {
            debug!("group {} not found (rc {})", name, rc);
            return None;
        }
        return Some(grp.gr_gid);
    }
}
