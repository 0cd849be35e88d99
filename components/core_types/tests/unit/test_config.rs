//! Unit tests for JitFlags

use core_types::{ErrorKind, JitFlags};

#[cfg(test)]
mod jit_flags_tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(JitFlags::from_json("{}").unwrap(), JitFlags::default());
    }

    #[test]
    fn test_json_overrides_only_named_switches() {
        let flags = JitFlags::from_json(r#"{ "polymorphic_inline": false, "fixed_script_method_calls": true }"#).unwrap();
        assert!(!flags.polymorphic_inline);
        assert!(flags.fixed_script_method_calls);
        assert!(flags.inline_built_ins);
    }

    #[test]
    fn test_malformed_json_is_invalid_config() {
        let error = JitFlags::from_json(r#"{ "inline": "yes" }"#).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidConfig);
        assert!(error.message.starts_with("jit flags:"));
    }

    #[test]
    fn test_no_inlining_keeps_other_switches() {
        let flags = JitFlags::no_inlining();
        assert!(!flags.inline);
        assert!(flags.float_type_spec);
    }
}
