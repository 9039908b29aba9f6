//! Property-based tests for the device number format registry.
//!
//! These check that encoding is deterministic and total inside each format's
//! field widths, that anything wider is rejected with the offending value in
//! the message, and that single numbers bypass the registry.

use claudefs_mknod::devnum::{self, DevFormat, DevNumError};
use claudefs_mknod::node::{resolve_device, NodeKind};
use proptest::prelude::*;

/// (name, major bits, minor bits) for formats with plain contiguous fields.
const SPLIT_FORMATS: &[(&str, u32, u32)] = &[
    ("386bsd", 8, 8),
    ("4bsd", 8, 8),
    ("isc", 8, 8),
    ("linux", 8, 8),
    ("sco", 8, 8),
    ("sunos", 8, 8),
    ("svr3", 8, 8),
    ("ultrix", 8, 8),
    ("hpux", 8, 24),
    ("osf1", 12, 20),
    ("bsdos", 12, 20),
    ("solaris", 14, 18),
    ("svr4", 14, 18),
    ("netbsd", 12, 20),
];

fn any_format_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(devnum::names().collect::<Vec<_>>())
}

/// A split format plus a major/minor pair that fits it.
fn fitting_pair() -> impl Strategy<Value = (&'static str, u64, u64)> {
    prop::sample::select(SPLIT_FORMATS.to_vec()).prop_flat_map(|(name, major_bits, minor_bits)| {
        (
            Just(name),
            0u64..(1u64 << major_bits),
            0u64..(1u64 << minor_bits),
        )
    })
}

/// A split format plus a major that is one bit too wide for it.
fn oversized_major() -> impl Strategy<Value = (&'static str, u64, u64)> {
    prop::sample::select(SPLIT_FORMATS.to_vec()).prop_flat_map(|(name, major_bits, _)| {
        (
            Just(name),
            (1u64 << major_bits)..(1u64 << (major_bits + 1)),
            Just(0u64),
        )
    })
}

/// A split format plus a minor that is one bit too wide for it.
fn oversized_minor() -> impl Strategy<Value = (&'static str, u64, u64)> {
    prop::sample::select(SPLIT_FORMATS.to_vec()).prop_flat_map(|(name, _, minor_bits)| {
        (
            Just(name),
            Just(0u64),
            (1u64 << minor_bits)..(1u64 << (minor_bits + 1)),
        )
    })
}

proptest! {
    #[test]
    fn test_single_number_is_used_verbatim(dev in any::<u64>(), name in any_format_name()) {
        let format = devnum::lookup(name).unwrap();
        let resolved = resolve_device(NodeKind::CharDevice, &[dev], Some(format)).unwrap();
        prop_assert_eq!(resolved, Some(dev));
    }

    #[test]
    fn test_encode_is_total_and_deterministic((name, major, minor) in fitting_pair()) {
        let format = devnum::lookup(name).unwrap();
        let first = format.encode(&[major, minor]);
        let second = format.encode(&[major, minor]);
        prop_assert!(first.is_ok(), "{} rejected {}/{}: {:?}", name, major, minor, first);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_pairs_do_not_collide(
        (name, major, minor) in fitting_pair(),
        other_minor in 0u64..256,
    ) {
        prop_assume!(other_minor != minor);
        let format = devnum::lookup(name).unwrap();
        let a = format.encode(&[major, minor]).unwrap();
        let b = format.encode(&[major, other_minor]).unwrap();
        prop_assert_ne!(a, b);
    }

    #[test]
    fn test_wide_major_is_rejected((name, major, minor) in oversized_major()) {
        let err = devnum::lookup(name).unwrap().encode(&[major, minor]).unwrap_err();
        prop_assert_eq!(err.clone(), DevNumError::InvalidMajor { value: major });
        prop_assert!(err.to_string().contains(&major.to_string()));
    }

    #[test]
    fn test_wide_minor_is_rejected((name, major, minor) in oversized_minor()) {
        let err = devnum::lookup(name).unwrap().encode(&[major, minor]).unwrap_err();
        prop_assert_eq!(err.clone(), DevNumError::InvalidMinor { value: minor });
        prop_assert!(err.to_string().contains(&minor.to_string()));
    }

    #[test]
    fn test_bsdos_triple_total(major in 0u64..0x1000, unit in 0u64..0x1000, subunit in 0u64..0x100) {
        let dev = devnum::lookup("bsdos").unwrap().encode(&[major, unit, subunit]).unwrap();
        prop_assert_eq!(dev, (major << 20) | (unit << 8) | subunit);
    }

    #[test]
    fn test_freebsd_minor_middle_byte_rejected(major in 0u64..0x100, minor in any::<u32>()) {
        let minor = u64::from(minor);
        let result = devnum::lookup("freebsd").unwrap().encode(&[major, minor]);
        if minor & 0xff00 == 0 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(DevNumError::InvalidMinor { value: minor }));
        }
    }

    #[test]
    fn test_native_pair_matches_direct_call(major in 0u64..0x100, minor in 0u64..0x100) {
        let via_request = resolve_device(NodeKind::BlockDevice, &[major, minor], None).unwrap();
        prop_assert_eq!(via_request, Some(DevFormat::Native.encode(&[major, minor]).unwrap()));
    }
}
