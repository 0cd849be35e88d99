//! Unit tests for TypeId, Addr and ScriptContextInfo

use core_types::{Addr, ObjectLayout, ScriptContextInfo, TypeId};

#[cfg(test)]
mod type_id_tests {
    use super::*;

    #[test]
    fn test_primitives_are_not_objects() {
        for type_id in [
            TypeId::Undefined,
            TypeId::Null,
            TypeId::Boolean,
            TypeId::Integer,
            TypeId::Number,
            TypeId::String,
            TypeId::Symbol,
        ] {
            assert!(!type_id.is_object(), "{type_id:?}");
            assert!(!type_id.is_true_object(), "{type_id:?}");
        }
    }

    #[test]
    fn test_true_objects() {
        for type_id in [TypeId::Object, TypeId::Function, TypeId::Array, TypeId::Proxy] {
            assert!(type_id.is_true_object(), "{type_id:?}");
        }
    }

    #[test]
    fn test_internal_objects_are_not_true_objects() {
        for type_id in [TypeId::HostDispatch, TypeId::ActivationObject, TypeId::SpreadArgument] {
            assert!(type_id.is_object(), "{type_id:?}");
            assert!(!type_id.is_true_object(), "{type_id:?}");
        }
    }

    #[test]
    fn test_undefined_or_null() {
        assert!(TypeId::Undefined.is_undefined_or_null());
        assert!(TypeId::Null.is_undefined_or_null());
        assert!(!TypeId::Boolean.is_undefined_or_null());
    }

    #[test]
    fn test_type_id_serializes_by_name() {
        assert_eq!(serde_json::to_string(&TypeId::Function).unwrap(), "\"Function\"");
        let parsed: TypeId = serde_json::from_str("\"NativeIntArray\"").unwrap();
        assert_eq!(parsed, TypeId::NativeIntArray);
    }
}

#[cfg(test)]
mod script_context_tests {
    use super::*;

    #[test]
    fn test_null_addr() {
        assert!(Addr::NULL.is_null());
        assert!(!Addr(0x10).is_null());
    }

    #[test]
    fn test_default_singletons_are_distinct() {
        let context = ScriptContextInfo::default();
        let singletons = [
            context.undefined_addr,
            context.null_addr,
            context.true_addr,
            context.false_addr,
            context.global_object_addr,
        ];
        for (i, a) in singletons.iter().enumerate() {
            assert!(!a.is_null());
            for b in &singletons[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_script_context_json_round_trip() {
        let context = ScriptContextInfo {
            layout: ObjectLayout {
                type_offset: 8,
                ..ObjectLayout::default()
            },
            ..ScriptContextInfo::default()
        };
        let json = serde_json::to_string(&context).unwrap();
        let parsed: ScriptContextInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, context);
    }
}
