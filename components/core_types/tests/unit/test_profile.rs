//! Unit tests for the call-site profile records

use core_types::{
    Addr, BuiltInFlags, BuiltinFunction, FixedField, FunctionBodyInfo, FunctionJitTimeInfo, ObjTypeSpecFldInfo,
    ThisType, TypeId,
};
use std::sync::Arc;

fn script(number: u32, name: &str) -> FunctionJitTimeInfo {
    FunctionJitTimeInfo::script(
        Addr(0x100 * number as usize + 0x80),
        Arc::new(FunctionBodyInfo::new(number, name, Addr(0x100 * number as usize), 2)),
    )
}

#[cfg(test)]
mod function_body_tests {
    use super::*;

    #[test]
    fn test_new_body_defaults() {
        let body = FunctionBodyInfo::new(5, "f", Addr(0x500), 3);
        assert_eq!(body.in_params_count, 3);
        assert_eq!(body.profiled_call_site_count, 0);
        assert!(body.has_profile_info);
        assert!(!body.uses_arguments_object);
        assert_eq!(body.this_type, ThisType::Simple);
    }
}

#[cfg(test)]
mod jit_time_info_tests {
    use super::*;

    #[test]
    fn test_built_in_record_has_no_body() {
        let info = FunctionJitTimeInfo::built_in(Addr(0x900), BuiltinFunction::MathMax);
        assert!(!info.has_body());
        assert_eq!(info.inlinee_count(), 0);
        assert_eq!(info.display_name(), "Math.max");
    }

    #[test]
    fn test_unknown_record_name() {
        assert_eq!(FunctionJitTimeInfo::default().display_name(), "<unknown>");
    }

    #[test]
    fn test_variants_follow_next_chain() {
        let c = Arc::new(script(3, "c"));
        let b = Arc::new(script(2, "b").with_next(c));
        let a = script(1, "a").with_next(b);
        let names: Vec<&str> = a.variants().map(FunctionJitTimeInfo::display_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lookups_by_profile_id_and_cache_index() {
        let getter = Arc::new(script(4, "get x"));
        let fld = Arc::new(ObjTypeSpecFldInfo {
            property_id: 11,
            uses_accessor: true,
            ..Default::default()
        });
        let info = script(1, "main")
            .with_inlinee(2, Arc::new(script(2, "callee")))
            .with_ldfld_inlinee(7, getter)
            .with_fld_info(7, fld);

        assert_eq!(info.inlinee(2).map(|i| i.display_name()), Some("callee"));
        assert!(info.inlinee(3).is_none());
        assert!(!info.is_polymorphic_call_site(2));
        assert!(!info.is_polymorphic_call_site(3));
        assert!(info.is_ldfld_inlinee_present());
        assert_eq!(info.ldfld_inlinee(7).map(|i| i.display_name()), Some("get x"));
        assert_eq!(info.fld_info(7).map(|f| f.property_id), Some(11));
    }
}

#[cfg(test)]
mod fld_info_tests {
    use super::*;

    #[test]
    fn test_fixed_function_requires_fixed_value() {
        let field = FixedField::new(Addr(0xA0), Addr(0xA8), Addr(0x60), TypeId::Function);
        let mut info = ObjTypeSpecFldInfo {
            fixed_fields: vec![field.clone(), field],
            ..Default::default()
        };
        assert!(info.fixed_function().is_none());
        info.has_fixed_value = true;
        assert_eq!(info.fixed_function().map(|f| f.func_info_addr), Some(Addr(0xA8)));
        assert!(info.fixed_function_at(1).is_some());
        assert!(info.fixed_function_at(2).is_none());
    }
}

#[cfg(test)]
mod built_in_tests {
    use super::*;

    #[test]
    fn test_math_built_ins_need_type_specialization() {
        assert!(BuiltinFunction::MathAbs.flags().requires_type_spec());
        assert!(BuiltinFunction::MathImul.flags().contains(BuiltInFlags::SRC2_TO_INT));
        assert!(!BuiltinFunction::ArrayPush.flags().requires_type_spec());
    }

    #[test]
    fn test_receiver_built_ins_use_src0() {
        for built_in in [BuiltinFunction::ArrayPush, BuiltinFunction::StringCharAt, BuiltinFunction::FunctionApply] {
            assert!(built_in.flags().contains(BuiltInFlags::USE_SRC0), "{}", built_in.name());
        }
        assert!(!BuiltinFunction::MathSqrt.flags().intersects(BuiltInFlags::USE_SRC0));
    }

    #[test]
    fn test_float_preference() {
        assert!(BuiltinFunction::MathSqrt.can_float_preference());
        assert!(!BuiltinFunction::MathFloor.can_float_preference());
    }
}
