//! Unit tests for ByteCodeOffset and SourceLocation

use core_types::{ByteCodeOffset, SourceLocation};

#[cfg(test)]
mod byte_code_offset_tests {
    use super::*;

    #[test]
    fn test_offsets_order_by_position() {
        let mut offsets = vec![ByteCodeOffset(9), ByteCodeOffset(0), ByteCodeOffset(4)];
        offsets.sort();
        assert_eq!(offsets, vec![ByteCodeOffset(0), ByteCodeOffset(4), ByteCodeOffset(9)]);
    }

    #[test]
    fn test_invalid_sorts_last() {
        assert!(ByteCodeOffset(u32::MAX - 1) < ByteCodeOffset::INVALID);
        assert!(ByteCodeOffset(u32::MAX - 1).is_valid());
    }

    #[test]
    fn test_display_pads_to_four_digits() {
        assert_eq!(ByteCodeOffset(0).to_string(), "#0000");
        assert_eq!(ByteCodeOffset(0x12345).to_string(), "#12345");
    }
}

#[cfg(test)]
mod source_location_tests {
    use super::*;

    #[test]
    fn test_source_location_equality() {
        let a = SourceLocation {
            function_number: 3,
            offset: ByteCodeOffset(12),
        };
        let b = SourceLocation {
            function_number: 3,
            offset: ByteCodeOffset(12),
        };
        let c = SourceLocation {
            function_number: 4,
            ..a
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
