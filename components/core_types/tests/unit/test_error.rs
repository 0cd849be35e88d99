//! Unit tests for JitError and ErrorKind

use core_types::{ByteCodeOffset, ErrorKind, JitError, JitResult};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::OutOfStack.to_string(), "out of stack");
        assert_eq!(ErrorKind::OutOfMemory.to_string(), "out of memory");
        assert_eq!(ErrorKind::InvalidConfig.to_string(), "invalid config");
        assert_eq!(ErrorKind::IrBuild.to_string(), "IR build failure");
    }

    #[test]
    fn test_error_kind_copy_and_eq() {
        let kind = ErrorKind::IrBuild;
        let copy = kind;
        assert_eq!(kind, copy);
        assert_ne!(kind, ErrorKind::OutOfMemory);
    }
}

#[cfg(test)]
mod jit_error_tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(JitError::out_of_stack("x").kind, ErrorKind::OutOfStack);
        assert_eq!(JitError::out_of_memory("x").kind, ErrorKind::OutOfMemory);
        assert_eq!(JitError::invalid_config("x").kind, ErrorKind::InvalidConfig);
        assert_eq!(JitError::ir_build("x").kind, ErrorKind::IrBuild);
    }

    #[test]
    fn test_new_has_no_location() {
        let error = JitError::new(ErrorKind::IrBuild, "no body for callee");
        assert_eq!(error.message, "no body for callee");
        assert_eq!(error.location, None);
    }

    #[test]
    fn test_location_does_not_change_message() {
        let error = JitError::invalid_config("budget").at(ByteCodeOffset(0x40));
        assert_eq!(error.location, Some(ByteCodeOffset(0x40)));
        assert_eq!(error.to_string(), "invalid config: budget");
    }

    #[test]
    fn test_error_is_std_error() {
        let error: Box<dyn std::error::Error> = Box::new(JitError::out_of_memory("code buffer"));
        assert_eq!(error.to_string(), "out of memory: code buffer");
    }

    #[test]
    fn test_result_propagates_with_question_mark() {
        fn probe(depth: u32) -> JitResult<u32> {
            if depth > 8 {
                return Err(JitError::out_of_stack(format!("depth {depth}")));
            }
            Ok(depth)
        }

        fn nested() -> JitResult<u32> {
            let a = probe(2)?;
            let b = probe(9)?;
            Ok(a + b)
        }

        let error = nested().unwrap_err();
        assert!(error.is_resource_exhaustion());
        assert_eq!(error.message, "depth 9");
    }
}
