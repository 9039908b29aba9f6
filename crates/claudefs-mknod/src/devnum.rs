//! Device number formats.
//!
//! A device node carries a single identifier that the kernel splits back into
//! major and minor numbers. Different platforms pack those fields with
//! different widths and offsets, so the registry keeps one entry per naming
//! convention and folds a short list of integers into one identifier.

use thiserror::Error;

/// Largest number of integers any format accepts (major, unit, subunit).
pub const MAX_FIELDS: usize = 3;

/// Errors produced by the format registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevNumError {
    /// No format is registered under the requested name.
    #[error("invalid format: {name}")]
    UnknownFormat {
        /// The requested name.
        name: String,
    },

    /// The format does not accept this many fields.
    #[error("too many fields for format {format} ({count} given)")]
    TooManyFields {
        /// Name of the format.
        format: &'static str,
        /// Number of integers supplied.
        count: usize,
    },

    /// Major number does not fit the format's field.
    #[error("invalid major number: {value}")]
    InvalidMajor {
        /// Offending value.
        value: u64,
    },

    /// Minor number does not fit the format's field.
    #[error("invalid minor number: {value}")]
    InvalidMinor {
        /// Offending value.
        value: u64,
    },

    /// Unit number does not fit the format's field.
    #[error("invalid unit number: {value}")]
    InvalidUnit {
        /// Offending value.
        value: u64,
    },

    /// Subunit number does not fit the format's field.
    #[error("invalid subunit number: {value}")]
    InvalidSubunit {
        /// Offending value.
        value: u64,
    },
}

/// A named device number encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevFormat {
    /// The host's own layout.
    #[default]
    Native,
    /// 8-bit major, 8-bit minor (386bsd, 4bsd, isc, linux, sco, sunos, svr3, ultrix).
    Split8x8,
    /// 12-bit major, 20-bit minor, or 12/12/8 major/unit/subunit.
    Bsdos,
    /// 8-bit major in bits 8-15, minor in the remaining 24 bits.
    FreeBsd,
    /// 8-bit major, 24-bit minor.
    Split8x24,
    /// 12-bit major in bits 8-19, 20-bit minor around it.
    NetBsd,
    /// 12-bit major, 20-bit minor.
    Split12x20,
    /// 14-bit major, 18-bit minor.
    Split14x18,
}

/// Name table, sorted by name. Several names share one layout.
const FORMATS: &[(&str, DevFormat)] = &[
    ("386bsd", DevFormat::Split8x8),
    ("4bsd", DevFormat::Split8x8),
    ("bsdos", DevFormat::Bsdos),
    ("freebsd", DevFormat::FreeBsd),
    ("hpux", DevFormat::Split8x24),
    ("isc", DevFormat::Split8x8),
    ("linux", DevFormat::Split8x8),
    ("native", DevFormat::Native),
    ("netbsd", DevFormat::NetBsd),
    ("osf1", DevFormat::Split12x20),
    ("sco", DevFormat::Split8x8),
    ("solaris", DevFormat::Split14x18),
    ("sunos", DevFormat::Split8x8),
    ("svr3", DevFormat::Split8x8),
    ("svr4", DevFormat::Split14x18),
    ("ultrix", DevFormat::Split8x8),
];

/// Looks up a format by name. There is no fallback for unknown names.
pub fn lookup(name: &str) -> Result<DevFormat, DevNumError> {
    FORMATS
        .binary_search_by(|(n, _)| (*n).cmp(name))
        .map(|idx| FORMATS[idx].1)
        .map_err(|_| DevNumError::UnknownFormat {
            name: name.to_string(),
        })
}

/// All registered format names in sorted order.
pub fn names() -> impl Iterator<Item = &'static str> {
    FORMATS.iter().map(|(n, _)| *n)
}

impl DevFormat {
    /// Canonical name of the layout, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DevFormat::Native => "native",
            DevFormat::Split8x8 => "8_8",
            DevFormat::Bsdos => "bsdos",
            DevFormat::FreeBsd => "freebsd",
            DevFormat::Split8x24 => "8_24",
            DevFormat::NetBsd => "netbsd",
            DevFormat::Split12x20 => "12_20",
            DevFormat::Split14x18 => "14_18",
        }
    }

    /// Folds `values` into a single device identifier.
    ///
    /// Every field is checked by decoding the result again, so a value that
    /// does not survive the round trip is reported instead of truncated.
    pub fn encode(&self, values: &[u64]) -> Result<u64, DevNumError> {
        match (self, values) {
            (DevFormat::Native, [major, minor]) => native::encode(*major, *minor),
            (DevFormat::Split8x8, [major, minor]) => split(8, *major, *minor),
            (DevFormat::Split8x24, [major, minor]) => split(24, *major, *minor),
            (DevFormat::Split12x20, [major, minor]) => split(20, *major, *minor),
            (DevFormat::Split14x18, [major, minor]) => split(18, *major, *minor),
            (DevFormat::Bsdos, [major, minor]) => split(20, *major, *minor),
            (DevFormat::Bsdos, [major, unit, subunit]) => bsdos_triple(*major, *unit, *subunit),
            (DevFormat::FreeBsd, [major, minor]) => freebsd(*major, *minor),
            (DevFormat::NetBsd, [major, minor]) => netbsd(*major, *minor),
            _ => Err(DevNumError::TooManyFields {
                format: self.name(),
                count: values.len(),
            }),
        }
    }
}

/// Packs `major` above a `minor_bits` wide minor field inside a 32-bit word.
fn split(minor_bits: u32, major: u64, minor: u64) -> Result<u64, DevNumError> {
    let minor_mask = (1u64 << minor_bits) - 1;
    let major_mask = 0xffff_ffffu64 & !minor_mask;
    let dev = ((major << minor_bits) & major_mask) | (minor & minor_mask);

    if (dev & major_mask) >> minor_bits != major {
        return Err(DevNumError::InvalidMajor { value: major });
    }
    if dev & minor_mask != minor {
        return Err(DevNumError::InvalidMinor { value: minor });
    }
    Ok(dev)
}

fn bsdos_triple(major: u64, unit: u64, subunit: u64) -> Result<u64, DevNumError> {
    let dev = ((major << 20) & 0xfff0_0000) | ((unit << 8) & 0x000f_ff00) | (subunit & 0xff);

    if (dev & 0xfff0_0000) >> 20 != major {
        return Err(DevNumError::InvalidMajor { value: major });
    }
    if (dev & 0x000f_ff00) >> 8 != unit {
        return Err(DevNumError::InvalidUnit { value: unit });
    }
    if dev & 0xff != subunit {
        return Err(DevNumError::InvalidSubunit { value: subunit });
    }
    Ok(dev)
}

fn freebsd(major: u64, minor: u64) -> Result<u64, DevNumError> {
    let dev = ((major << 8) & 0x0000_ff00) | (minor & 0xffff_00ff);

    if (dev & 0x0000_ff00) >> 8 != major {
        return Err(DevNumError::InvalidMajor { value: major });
    }
    if dev & 0xffff_00ff != minor {
        return Err(DevNumError::InvalidMinor { value: minor });
    }
    Ok(dev)
}

fn netbsd(major: u64, minor: u64) -> Result<u64, DevNumError> {
    let dev = ((major << 8) & 0x000f_ff00) | ((minor << 12) & 0xfff0_0000) | (minor & 0xff);

    if (dev & 0x000f_ff00) >> 8 != major {
        return Err(DevNumError::InvalidMajor { value: major });
    }
    if ((dev & 0xfff0_0000) >> 12) | (dev & 0xff) != minor {
        return Err(DevNumError::InvalidMinor { value: minor });
    }
    Ok(dev)
}

#[cfg(target_os = "linux")]
mod native {
    use super::DevNumError;

    // glibc `makedev`: 32-bit major and minor spread over a 64-bit dev_t.
    pub(super) fn encode(major: u64, minor: u64) -> Result<u64, DevNumError> {
        if major > u64::from(u32::MAX) {
            return Err(DevNumError::InvalidMajor { value: major });
        }
        if minor > u64::from(u32::MAX) {
            return Err(DevNumError::InvalidMinor { value: minor });
        }
        Ok(((major & 0xffff_f000) << 32)
            | ((major & 0x0000_0fff) << 8)
            | ((minor & 0xffff_ff00) << 12)
            | (minor & 0x0000_00ff))
    }
}

#[cfg(target_os = "netbsd")]
mod native {
    use super::DevNumError;

    pub(super) fn encode(major: u64, minor: u64) -> Result<u64, DevNumError> {
        super::netbsd(major, minor)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "netbsd")))]
mod native {
    use super::DevNumError;

    // 8-bit major over a 24-bit minor, as on Darwin.
    pub(super) fn encode(major: u64, minor: u64) -> Result<u64, DevNumError> {
        super::split(24, major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(lookup("native").unwrap(), DevFormat::Native);
        assert_eq!(lookup("linux").unwrap(), DevFormat::Split8x8);
        assert_eq!(lookup("svr4").unwrap(), DevFormat::Split14x18);
        assert_eq!(lookup("bsdos").unwrap(), DevFormat::Bsdos);
    }

    #[test]
    fn test_lookup_unknown_name() {
        let err = lookup("plan9").unwrap_err();
        assert_eq!(
            err,
            DevNumError::UnknownFormat {
                name: "plan9".to_string()
            }
        );
        assert_eq!(err.to_string(), "invalid format: plan9");
    }

    #[test]
    fn test_format_table_is_sorted() {
        let all: Vec<&str> = names().collect();
        let mut sorted = all.clone();
        sorted.sort_unstable();
        assert_eq!(all, sorted);
        assert_eq!(all.len(), 16);
    }

    #[test]
    fn test_every_name_resolves() {
        for name in names() {
            assert!(lookup(name).is_ok(), "{} should resolve", name);
        }
    }

    #[test]
    fn test_split_8_8() {
        let f = lookup("4bsd").unwrap();
        assert_eq!(f.encode(&[3, 7]).unwrap(), 0x0307);
        assert_eq!(f.encode(&[255, 255]).unwrap(), 0xffff);
    }

    #[test]
    fn test_split_8_8_rejects_wide_major() {
        let err = lookup("linux").unwrap().encode(&[256, 0]).unwrap_err();
        assert_eq!(err, DevNumError::InvalidMajor { value: 256 });
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn test_split_8_8_rejects_wide_minor() {
        let err = lookup("sunos").unwrap().encode(&[1, 300]).unwrap_err();
        assert_eq!(err, DevNumError::InvalidMinor { value: 300 });
    }

    #[test]
    fn test_split_8_24() {
        let f = lookup("hpux").unwrap();
        assert_eq!(f.encode(&[0x12, 0x34_5678]).unwrap(), 0x1234_5678);
        assert!(f.encode(&[0x100, 0]).is_err());
    }

    #[test]
    fn test_split_12_20() {
        let f = lookup("osf1").unwrap();
        assert_eq!(f.encode(&[0xabc, 0xdef01]).unwrap(), 0xabcd_ef01);
        assert_eq!(
            f.encode(&[1, 0x10_0000]).unwrap_err(),
            DevNumError::InvalidMinor { value: 0x10_0000 }
        );
    }

    #[test]
    fn test_split_14_18() {
        let f = lookup("solaris").unwrap();
        assert_eq!(f.encode(&[1, 1]).unwrap(), (1 << 18) | 1);
        assert_eq!(f.encode(&[0x3fff, 0x3_ffff]).unwrap(), 0xffff_ffff);
        assert!(f.encode(&[0x4000, 0]).is_err());
    }

    #[test]
    fn test_bsdos_pair_and_triple() {
        let f = lookup("bsdos").unwrap();
        assert_eq!(f.encode(&[1, 2]).unwrap(), (1 << 20) | 2);
        assert_eq!(f.encode(&[1, 2, 3]).unwrap(), (1 << 20) | (2 << 8) | 3);
    }

    #[test]
    fn test_bsdos_triple_range_errors() {
        let f = lookup("bsdos").unwrap();
        assert_eq!(
            f.encode(&[0x1000, 0, 0]).unwrap_err(),
            DevNumError::InvalidMajor { value: 0x1000 }
        );
        assert_eq!(
            f.encode(&[1, 0x1000, 0]).unwrap_err(),
            DevNumError::InvalidUnit { value: 0x1000 }
        );
        assert_eq!(
            f.encode(&[1, 1, 0x100]).unwrap_err(),
            DevNumError::InvalidSubunit { value: 0x100 }
        );
    }

    #[test]
    fn test_triple_rejected_by_two_field_formats() {
        let err = lookup("netbsd").unwrap().encode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, DevNumError::TooManyFields { count: 3, .. }));
        assert!(err.to_string().starts_with("too many fields for format"));
    }

    #[test]
    fn test_single_value_rejected_by_registry() {
        // single numbers bypass the registry entirely; asking it anyway is a field-count error
        let err = DevFormat::Native.encode(&[42]).unwrap_err();
        assert!(matches!(err, DevNumError::TooManyFields { count: 1, .. }));
    }

    #[test]
    fn test_freebsd_layout() {
        let f = lookup("freebsd").unwrap();
        assert_eq!(f.encode(&[4, 0x0001_0002]).unwrap(), 0x0001_0402);
        assert_eq!(
            f.encode(&[4, 0x100]).unwrap_err(),
            DevNumError::InvalidMinor { value: 0x100 }
        );
    }

    #[test]
    fn test_netbsd_layout() {
        let f = lookup("netbsd").unwrap();
        assert_eq!(f.encode(&[3, 7]).unwrap(), 0x0307);
        assert_eq!(f.encode(&[3, 0x1234]).unwrap(), 0x0120_0334);
        assert!(f.encode(&[0x1000, 0]).is_err());
        assert!(f.encode(&[0, 0x10_0000]).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_native_linux_layout() {
        let f = DevFormat::default();
        assert_eq!(f.encode(&[3, 7]).unwrap(), 0x0307);
        assert_eq!(f.encode(&[8, 300]).unwrap(), 0x0010_082c);
        assert_eq!(f.encode(&[0x1000, 0]).unwrap(), 0x1000_0000_0000);
        assert_eq!(
            f.encode(&[1 << 32, 0]).unwrap_err(),
            DevNumError::InvalidMajor { value: 1 << 32 }
        );
    }
}
