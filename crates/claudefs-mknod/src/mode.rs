//! Permission expressions and the file-creation mask.
//!
//! Expressions are either an absolute octal number or chmod-style symbolic
//! clauses such as `u=rw,go-w`. Symbolic clauses without a who-list are
//! filtered through the creation mask in effect when the expression was
//! parsed, matching BSD `setmode`.

use crate::error::{MknodError, Result};
use crate::fs::NodeFs;
use crate::node::{DEFAULT_PERMS, PERM_MASK, S_IFMT};

const WHO_USER: u32 = 0o4700;
const WHO_GROUP: u32 = 0o2070;
const WHO_OTHER: u32 = 0o0007;
const STICKY: u32 = 0o1000;
// what `=` clears when no who-list is given
const STANDARD_BITS: u32 = 0o6777;

/// The process file-creation mask, captured once and passed around explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreationMask(u32);

impl CreationMask {
    /// Mask from raw bits; only the permission bits are kept.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0o777)
    }

    /// Reads the current mask of `fs` and puts it back unchanged.
    pub fn capture<F: NodeFs + ?Sized>(fs: &F) -> Self {
        let old = fs.umask(0);
        fs.umask(old);
        Self::from_bits(old)
    }

    /// Raw mask bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Removes the masked bits from `perms`.
    pub fn apply(&self, perms: u32) -> u32 {
        perms & !self.0
    }

    /// Read+write for everyone, minus the mask.
    pub fn default_perms(&self) -> u32 {
        self.apply(DEFAULT_PERMS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    User,
    Group,
    Other,
}

impl Class {
    fn extract(&self, mode: u32) -> u32 {
        let bits = match self {
            Class::User => (mode >> 6) & 0o7,
            Class::Group => (mode >> 3) & 0o7,
            Class::Other => mode & 0o7,
        };
        (bits << 6) | (bits << 3) | bits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Perm {
    Bits { bits: u32, cond_exec: bool },
    Copy(Class),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clause {
    op: Op,
    /// Bits selected by the who-list; `None` when it was empty.
    who: Option<u32>,
    perm: Perm,
    /// Creation mask applied to who-less clauses.
    mask: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Absolute(u32),
    Symbolic(Vec<Clause>),
}

/// A parsed permission expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSpec(Expr);

impl ModeSpec {
    /// Parses `expr`; who-less symbolic clauses honour `mask`.
    pub fn parse(expr: &str, mask: CreationMask) -> Result<Self> {
        let invalid = || MknodError::InvalidMode {
            expr: expr.to_string(),
        };

        if expr.starts_with(|c: char| c.is_ascii_digit()) {
            let value = u32::from_str_radix(expr, 8).map_err(|_| invalid())?;
            if value > PERM_MASK {
                return Err(invalid());
            }
            return Ok(ModeSpec(Expr::Absolute(value)));
        }

        let mut clauses = Vec::new();
        for part in expr.split(',') {
            let mut chars = part.chars().peekable();
            let mut who = 0u32;
            let mut has_who = false;
            while let Some(&c) = chars.peek() {
                let bits = match c {
                    'u' => WHO_USER,
                    'g' => WHO_GROUP,
                    'o' => WHO_OTHER,
                    'a' => WHO_USER | WHO_GROUP | WHO_OTHER,
                    _ => break,
                };
                who |= bits;
                has_who = true;
                chars.next();
            }

            let mut saw_op = false;
            while let Some(c) = chars.next() {
                let op = match c {
                    '+' => Op::Add,
                    '-' => Op::Remove,
                    '=' => Op::Assign,
                    _ => return Err(invalid()),
                };
                saw_op = true;

                let perm = match chars.peek() {
                    Some('u') | Some('g') | Some('o') => {
                        let class = match chars.next() {
                            Some('u') => Class::User,
                            Some('g') => Class::Group,
                            _ => Class::Other,
                        };
                        Perm::Copy(class)
                    }
                    _ => {
                        let mut bits = 0u32;
                        let mut cond_exec = false;
                        while let Some(&p) = chars.peek() {
                            match p {
                                'r' => bits |= 0o444,
                                'w' => bits |= 0o222,
                                'x' => bits |= 0o111,
                                'X' => cond_exec = true,
                                's' => bits |= 0o6000,
                                't' => bits |= STICKY,
                                _ => break,
                            }
                            chars.next();
                        }
                        Perm::Bits { bits, cond_exec }
                    }
                };

                clauses.push(Clause {
                    op,
                    who: has_who.then_some(who),
                    perm,
                    mask: mask.bits(),
                });
            }
            if !saw_op {
                return Err(invalid());
            }
        }
        Ok(ModeSpec(Expr::Symbolic(clauses)))
    }

    /// Applies the expression to `base`, keeping its type bits.
    pub fn resolve(&self, base: u32) -> u32 {
        let type_bits = base & S_IFMT;
        let clauses = match &self.0 {
            Expr::Absolute(value) => return type_bits | value,
            Expr::Symbolic(clauses) => clauses,
        };

        let mut mode = base & PERM_MASK;
        for clause in clauses {
            let raw = match clause.perm {
                Perm::Bits { bits, cond_exec } => {
                    let exec = if cond_exec && mode & 0o111 != 0 {
                        0o111
                    } else {
                        0
                    };
                    bits | exec
                }
                Perm::Copy(class) => class.extract(mode),
            };

            let selected = match clause.who {
                Some(who) => {
                    // sticky only counts when more than "other" is addressed
                    let sticky = if who & !WHO_OTHER != 0 { STICKY } else { 0 };
                    raw & (who | sticky)
                }
                None => raw & !clause.mask,
            };

            match clause.op {
                Op::Add => mode |= selected,
                Op::Remove => mode &= !selected,
                Op::Assign => {
                    let cleared = clause.who.unwrap_or(STANDARD_BITS);
                    mode = (mode & !cleared) | selected;
                }
            }
        }
        type_bits | (mode & PERM_MASK)
    }
}
