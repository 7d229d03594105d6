//! Container tests

use omas::ods::MAX_BACK_FILL;
use omas::value::{NdArray, UArray, UFloat, Value};
use omas::{DynamicPathCreation, Environment, Key, OdsError, Ods, tokens};

const IP: &str = "equilibrium.time_slice.0.global_quantities.ip";

fn with_time_slices(times: &[f64]) -> Ods {
    let mut ods = Ods::new().unwrap();
    for time in times {
        ods.set("equilibrium.time_slice.+.time", *time).unwrap();
    }
    ods
}

mod access_tests {
    use super::*;

    #[test]
    fn test_set_and_get_in_every_syntax() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 1.0e6).unwrap();

        assert_eq!(ods.get(IP).unwrap(), Value::Float(1.0e6));
        assert_eq!(
            ods.get("equilibrium.time_slice[0].global_quantities.ip")
                .unwrap(),
            Value::Float(1.0e6)
        );
        assert_eq!(
            ods.get(tokens!["equilibrium", "time_slice", 0, "global_quantities", "ip"])
                .unwrap(),
            Value::Float(1.0e6)
        );
    }

    #[test]
    fn test_append_and_negative_index() {
        let ods = with_time_slices(&[0.1, 0.2]);
        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 2);
        assert_eq!(
            ods.get("equilibrium.time_slice.-1.time").unwrap(),
            Value::Float(0.2)
        );
        assert_eq!(
            ods.get("equilibrium.time_slice[-2].time").unwrap(),
            Value::Float(0.1)
        );
    }

    #[test]
    fn test_ten_appends() {
        let mut ods = Ods::new().unwrap();
        for k in 0..10 {
            ods.set("equilibrium.time_slice.+.time", k as f64).unwrap();
        }
        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 10);
        assert_eq!(
            ods.get("equilibrium.time_slice.9.time").unwrap(),
            Value::Float(9.0)
        );
    }

    #[test]
    fn test_index_past_the_end() {
        let mut ods = with_time_slices(&[0.1, 0.2]);
        assert!(matches!(
            ods.set("equilibrium.time_slice.5.time", 0.5),
            Err(OdsError::Index { .. })
        ));
        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 2);
        assert!(matches!(
            ods.get("equilibrium.time_slice.-3.time"),
            Err(OdsError::Index { .. })
        ));
    }

    #[test]
    fn test_dynamic_array_structures_back_fill() {
        let mut ods = Ods::builder()
            .dynamic_path_creation(DynamicPathCreation::DynamicArrayStructures)
            .build()
            .unwrap();
        ods.set("equilibrium.time_slice.3.time", 0.4).unwrap();

        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 4);
        assert_eq!(
            ods.get("equilibrium.time_slice.3.time").unwrap(),
            Value::Float(0.4)
        );
        assert!(ods.get("equilibrium.time_slice.1.time").unwrap_err().is_missing());
    }

    #[test]
    fn test_back_fill_is_bounded() {
        let mut ods = Ods::builder()
            .consistency_check(false)
            .dynamic_path_creation(DynamicPathCreation::DynamicArrayStructures)
            .build()
            .unwrap();
        assert!(matches!(
            ods.set("x.1000000000000", 1),
            Err(OdsError::Index { .. })
        ));
        assert!(ods.is_empty());

        ods.set(format!("x.{}", MAX_BACK_FILL), 1).unwrap();
        assert_eq!(ods.keys_at("x").unwrap().len(), MAX_BACK_FILL + 1);
    }

    #[test]
    fn test_creation_off_requires_existing_nodes() {
        let mut ods = Ods::builder().dynamic_path_creation(false).build().unwrap();
        assert!(matches!(
            ods.set(IP, 1.0),
            Err(OdsError::Configuration(_))
        ));
        assert!(ods.is_empty());
    }

    #[test]
    fn test_creation_off_reads_fail_without_creating() {
        let ods = Ods::builder().dynamic_path_creation(false).build().unwrap();
        assert!(matches!(
            ods.get("equilibrium.time_slice.0.time"),
            Err(OdsError::MissingLeaf(_) | OdsError::Address(_))
        ));
        assert!(ods.is_empty());
        assert!(ods.paths().is_empty());
    }

    #[test]
    fn test_missing_reads_do_not_create() {
        let ods = Ods::new().unwrap();
        assert!(ods.get(IP).unwrap_err().is_missing());
        assert!(ods.is_empty());
        assert_eq!(ods.get_or(IP, 7.0).unwrap(), Value::Float(7.0));
        assert!(!ods.contains(IP));
    }

    #[test]
    fn test_contains() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 1.0).unwrap();
        assert!(ods.contains(IP));
        assert!(ods.contains("equilibrium.time_slice.0"));
        assert!(ods.contains("@equilibrium.*ip"));
        assert!(!ods.contains("equilibrium.time_slice.1"));
        assert!(!ods.contains("not a path"));
    }

    #[test]
    fn test_node_reads_point_to_subtree() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 1.0).unwrap();
        assert!(matches!(
            ods.get("equilibrium.time_slice.0"),
            Err(OdsError::Address(_))
        ));
    }
}

mod schema_tests {
    use super::*;

    #[test]
    fn test_unknown_locations() {
        let mut ods = Ods::new().unwrap();
        assert!(ods
            .set("equilibrium.time_slice.0.global_quantities.nonsense", 1.0)
            .unwrap_err()
            .is_schema_lookup());
        assert!(matches!(
            ods.set("equilibrium.time_slice.global_quantities.ip", 1.0),
            Err(OdsError::Address(_))
        ));
        assert!(matches!(
            ods.set("equilibrium.time_slice.0", 1.0),
            Err(OdsError::Type { .. })
        ));
        assert!(ods.is_empty());
    }

    #[test]
    fn test_consistency_off_accepts_anything() {
        let mut ods = Ods::builder().consistency_check(false).build().unwrap();
        ods.set("anything.goes.0.here", "x").unwrap();
        assert_eq!(
            ods.get("anything.goes.0.here").unwrap(),
            Value::Str("x".to_string())
        );
    }

    #[test]
    fn test_coercion() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 3).unwrap();
        assert_eq!(ods.get(IP).unwrap(), Value::Float(3.0));

        let flag = "equilibrium.ids_properties.homogeneous_time";
        assert!(matches!(ods.set(flag, 1.5), Err(OdsError::Type { .. })));
        ods.set(flag, 2.0).unwrap();
        assert_eq!(ods.get(flag).unwrap(), Value::Int(2));

        assert!(matches!(ods.set(IP, "abc"), Err(OdsError::Type { .. })));
        assert!(matches!(
            ods.set(IP, vec![1.0, 2.0]),
            Err(OdsError::Type { .. })
        ));
        assert_eq!(ods.get(IP).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_multidimensional_leaves() {
        let mut ods = Ods::new().unwrap();
        let psi = NdArray::new(vec![2, 2], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        ods.set("equilibrium.time_slice.0.profiles_2d.0.psi", psi.clone())
            .unwrap();
        assert_eq!(
            ods.get("equilibrium.time_slice.0.profiles_2d.0.psi").unwrap(),
            Value::FloatArray(psi)
        );
    }

    #[test]
    fn test_kind_conflicts() {
        let mut ods = Ods::builder().consistency_check(false).build().unwrap();
        ods.set("a.b", 1.0).unwrap();
        assert!(matches!(ods.set("a.0", 1.0), Err(OdsError::Type { .. })));
        assert!(matches!(ods.set("a.b.c", 1.0), Err(OdsError::Type { .. })));
        assert_eq!(ods.get("a.b").unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_enabling_checks_validates_first() {
        let mut ods = Ods::builder().consistency_check(false).build().unwrap();
        ods.set("nonsense.x", 1.0).unwrap();
        assert!(ods.set_consistency_check(true).is_err());
        assert!(!ods.consistency_check());

        ods.delete("nonsense").unwrap();
        ods.set_consistency_check(true).unwrap();
        assert!(ods.consistency_check());
    }

    #[test]
    fn test_version_switch_revalidates() {
        let mut ods = Ods::builder().imas_version("3.20.0").build().unwrap();
        ods.set("ec_antennas.antenna.0.power.data", vec![1.0, 2.0])
            .unwrap();

        assert!(ods.set_imas_version("3.21.0").is_err());
        assert_eq!(ods.imas_version(), "3.20.0");

        ods.delete("ec_antennas").unwrap();
        ods.set_imas_version("3.21.0").unwrap();
        assert_eq!(ods.imas_version(), "3.21.0");
    }

    #[test]
    fn test_unknown_version() {
        assert!(matches!(
            Ods::builder().imas_version("9.9.9").build(),
            Err(OdsError::Configuration(_))
        ));
        assert!(matches!(
            Ods::builder().cocosio(42).build(),
            Err(OdsError::Configuration(_))
        ));
    }

    #[test]
    fn test_info() {
        let ods = Ods::new().unwrap();
        let entry = ods.info(IP).unwrap();
        assert_eq!(entry.units.as_deref(), Some("A"));
        assert!(entry.is_dynamic());
        assert!(ods.info("equilibrium.nonsense").is_err());
    }

    #[test]
    fn test_list_coordinates() {
        let mut ods = Ods::new().unwrap();
        ods.set("equilibrium.time_slice.0.profiles_1d.psi", vec![0.0, 0.5, 1.0])
            .unwrap();
        ods.set("equilibrium.time_slice.0.profiles_1d.q", vec![1.0, 2.0, 3.0])
            .unwrap();

        let coordinates = ods.list_coordinates();
        assert!(coordinates.contains("equilibrium.time_slice.0.profiles_1d.psi"));
        assert_eq!(coordinates.len(), 1);
    }
}

mod uncertainty_tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, UFloat::new(1.0e6, 1.0e4)).unwrap();

        assert_eq!(
            ods.get(IP).unwrap(),
            Value::Uncertain(UFloat::new(1.0e6, 1.0e4))
        );
        assert_eq!(ods.get_raw(IP).unwrap(), Value::Float(1.0e6));
        assert_eq!(
            ods.get_raw(format!("{}_error_upper", IP)).unwrap(),
            Value::Float(1.0e4)
        );
    }

    #[test]
    fn test_array_round_trip() {
        let mut ods = Ods::new().unwrap();
        let psi = UArray::from_pairs(&[(0.0, 0.1), (1.0, 0.2)]);
        ods.set("equilibrium.time_slice.0.profiles_1d.psi", psi.clone())
            .unwrap();
        assert_eq!(
            ods.get("equilibrium.time_slice.0.profiles_1d.psi").unwrap(),
            Value::UncertainArray(psi)
        );
    }

    #[test]
    fn test_negative_std_dev_writes_nothing() {
        let mut ods = Ods::new().unwrap();
        let path = "equilibrium.time_slice.0.global_quantities.psi_axis";
        assert!(matches!(
            ods.set(path, UFloat::new(1.0, -1.0)),
            Err(OdsError::Value { .. })
        ));
        assert!(!ods.contains(path));
        assert!(ods.is_empty());
    }

    #[test]
    fn test_delete_removes_error_bars() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, UFloat::new(1.0, 0.1)).unwrap();
        ods.delete(IP).unwrap();
        assert!(ods.paths().is_empty());
    }
}

mod slice_tests {
    use super::*;

    #[test]
    fn test_slice_reads_stack() {
        let ods = with_time_slices(&[0.1, 0.2]);
        assert_eq!(
            ods.get("equilibrium.time_slice.:.time").unwrap(),
            Value::from(vec![0.1, 0.2])
        );
        assert_eq!(
            ods.get_slice("equilibrium.time_slice[:].time").unwrap(),
            vec![Value::Float(0.1), Value::Float(0.2)]
        );
        assert!(ods.get_slice("equilibrium.time_slice.0.time").is_err());
    }

    #[test]
    fn test_slices_are_read_only() {
        let mut ods = with_time_slices(&[0.1]);
        assert!(matches!(
            ods.set("equilibrium.time_slice.:.time", 1.0),
            Err(OdsError::Address(_))
        ));
    }

    #[test]
    fn test_pattern_reads_first_match() {
        let mut ods = Ods::new().unwrap();
        ods.set("equilibrium.time_slice.0.global_quantities.ip", 1.0)
            .unwrap();
        ods.set("equilibrium.time_slice.1.global_quantities.ip", 2.0)
            .unwrap();
        assert_eq!(ods.get("@eq.*1.*.ip").unwrap(), Value::Float(2.0));
        assert!(ods.get("@core_profiles.*").is_err());
        assert!(ods.set("@eq.*.ip", 1.0).is_err());
    }
}

mod structure_tests {
    use super::*;

    #[test]
    fn test_delete_keeps_positions() {
        let mut ods = with_time_slices(&[0.1, 0.2, 0.3]);

        ods.delete("equilibrium.time_slice.1").unwrap();
        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 3);
        assert_eq!(
            ods.get("equilibrium.time_slice.2.time").unwrap(),
            Value::Float(0.3)
        );

        ods.delete("equilibrium.time_slice.-1").unwrap();
        assert_eq!(ods.keys_at("equilibrium.time_slice").unwrap().len(), 2);
        assert!(ods.get("equilibrium.time_slice.1.time").unwrap_err().is_missing());

        assert!(ods.delete("core_profiles").is_err());
    }

    #[test]
    fn test_paths_and_flat_order() {
        let mut ods = Ods::new().unwrap();
        ods.set("equilibrium.time_slice.0.time", 0.1).unwrap();
        ods.set("equilibrium.time", vec![0.1]).unwrap();
        ods.set("core_profiles.time", vec![0.1]).unwrap();
        ods.set("equilibrium.ids_properties.homogeneous_time", 1)
            .unwrap();

        let paths: Vec<String> = ods.paths().iter().map(ToString::to_string).collect();
        assert_eq!(
            paths,
            vec![
                "core_profiles.time",
                "equilibrium.ids_properties.homogeneous_time",
                "equilibrium.time",
                "equilibrium.time_slice.0.time",
            ]
        );

        let flat = ods.flat();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat["equilibrium.time_slice.0.time"], Value::Float(0.1));
        assert_eq!(
            ods.keys(),
            vec![
                Key::Name("core_profiles".to_string()),
                Key::Name("equilibrium".to_string())
            ]
        );
    }

    #[test]
    fn test_subtree_handles() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 1.0).unwrap();

        let mut slice = ods.subtree("equilibrium.time_slice.-1").unwrap();
        assert_eq!(slice.location().to_string(), "equilibrium.time_slice.0");
        assert_eq!(slice.ulocation(), "equilibrium.time_slice.:");
        assert_eq!(
            slice.get("global_quantities.ip").unwrap(),
            Value::Float(1.0)
        );
        assert!(slice
            .set("global_quantities.nonsense", 1.0)
            .unwrap_err()
            .is_schema_lookup());

        slice
            .set("profiles_1d.psi", vec![0.0, 1.0])
            .unwrap();
        assert!(!ods.contains("equilibrium.time_slice.0.profiles_1d.psi"));

        ods.set_subtree("equilibrium.time_slice.0", slice).unwrap();
        assert_eq!(
            ods.get("equilibrium.time_slice.0.profiles_1d.psi").unwrap(),
            Value::from(vec![0.0, 1.0])
        );
        assert!(matches!(ods.subtree(IP), Err(OdsError::Address(_))));
    }

    #[test]
    fn test_set_subtree_validates_location() {
        let mut ods = Ods::new().unwrap();
        let mut gq = ods.empty_like();
        gq.set_consistency_check(false).unwrap();
        gq.set("ip", 1.0).unwrap();

        assert!(ods.set_subtree("core_profiles.vacuum_toroidal_field", gq.copy()).is_err());
        ods.set_subtree("equilibrium.time_slice.0.global_quantities", gq)
            .unwrap();
        assert_eq!(ods.get(IP).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut ods = Ods::new().unwrap();
        ods.set(IP, 1.0).unwrap();

        let mut copy = ods.copy();
        assert_eq!(copy, ods);
        copy.set(IP, 2.0).unwrap();
        assert_eq!(ods.get(IP).unwrap(), Value::Float(1.0));
        assert_ne!(copy, ods);

        ods.set(IP, 3.0).unwrap();
        assert_eq!(copy.get(IP).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_copy_keeps_unchecked_content() {
        let mut ods = Ods::builder().consistency_check(false).build().unwrap();
        ods.set("bla.tra", 1.0).unwrap();

        let copy = ods.copy();
        assert_eq!(copy, ods);
        assert_eq!(copy.get("bla.tra").unwrap(), Value::Float(1.0));
        assert!(!copy.consistency_check());
    }
}

mod code_parameters_tests {
    use super::*;

    const XML: &str = r#"<parameters>
        <launcher index="0"><mharm>2</mharm></launcher>
        <tolerance>0.1</tolerance>
    </parameters>"#;

    #[test]
    fn test_markup_becomes_a_tree() {
        let mut ods = Ods::new().unwrap();
        ods.set("equilibrium.code.parameters", XML).unwrap();

        assert_eq!(
            ods.get("equilibrium.code.parameters.launcher.0.mharm")
                .unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            ods.get("equilibrium.code.parameters.tolerance").unwrap(),
            Value::Float(0.1)
        );
        assert!(matches!(
            ods.get("equilibrium.code.parameters"),
            Err(OdsError::Address(_))
        ));

        let guard = ods
            .environment(Environment::new().raw_code_parameters(true))
            .unwrap();
        let xml = guard.get("equilibrium.code.parameters").unwrap();
        assert!(xml.as_str().unwrap().contains("<parameters>"));
        assert!(xml.as_str().unwrap().contains("<mharm>"));
    }

    #[test]
    fn test_malformed_markup() {
        let mut ods = Ods::new().unwrap();
        assert!(ods
            .set("equilibrium.code.parameters", "<parameters><a>")
            .is_err());
        assert!(ods.is_empty());
    }
}
