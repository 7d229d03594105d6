//! Serialization adapter tests

use omas::path::Path;
use omas::storage::{self, LoadOptions, MemoryBackend};
use omas::value::{NdArray, UFloat, Value};
use omas::{DynamicPathCreation, Ods};
use tempfile::TempDir;

const IP: &str = "equilibrium.time_slice.0.global_quantities.ip";

fn p(s: &str) -> Path {
    Path::parse(s).unwrap()
}

fn sample() -> Ods {
    let mut ods = Ods::builder()
        .dynamic_path_creation(DynamicPathCreation::DynamicArrayStructures)
        .build()
        .unwrap();
    ods.set("equilibrium.time_slice.0.time", 0.1).unwrap();
    ods.set(IP, UFloat::new(1.0e6, 1.0e4)).unwrap();
    ods.set("equilibrium.time", vec![0.1]).unwrap();
    ods.set("pf_active.coil.2.name", "PF3").unwrap();
    ods.set("pf_active.coil.2.element.1.turns_with_sign", 12.0)
        .unwrap();
    ods
}

mod backend_tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let ods = sample();
        let mut backend = MemoryBackend::new("memory");
        storage::save_to_backend(&ods, &mut backend).unwrap();

        assert!(!backend.is_open());
        assert_eq!(backend.allocated(&p("pf_active.coil")), Some(3));
        assert_eq!(backend.allocated(&p("pf_active.coil.2.element")), Some(2));
        assert_eq!(backend.allocated(&p("equilibrium.time_slice")), Some(1));
        assert_eq!(backend.len(), ods.paths().len());

        let mut loaded = Ods::new().unwrap();
        let count =
            storage::load_from_backend(&mut loaded, &mut backend, &LoadOptions::new()).unwrap();
        assert_eq!(count, 5);
        assert_eq!(loaded, ods);
        assert_eq!(
            loaded.get(IP).unwrap(),
            Value::Uncertain(UFloat::new(1.0e6, 1.0e4))
        );
        assert_eq!(loaded.keys_at("pf_active.coil").unwrap().len(), 3);
        assert_eq!(
            loaded.dynamic_path_creation(),
            DynamicPathCreation::On
        );
    }

    #[test]
    fn test_subset_load() {
        let ods = sample();
        let mut backend = MemoryBackend::new("memory");
        storage::save_to_backend(&ods, &mut backend).unwrap();

        let mut loaded = Ods::new().unwrap();
        let options = LoadOptions::new().paths(["pf_active.coil.:.name"]).unwrap();
        let count = storage::load_from_backend(&mut loaded, &mut backend, &options).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            loaded.get("pf_active.coil.2.name").unwrap(),
            Value::Str("PF3".to_string())
        );
        assert!(!loaded.contains("equilibrium"));
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let mut backend = MemoryBackend::new("memory");
        backend.insert(p(IP), Value::Float(-9e40));
        backend.insert(p("equilibrium.time"), Value::FloatArray(NdArray::from_vec(Vec::new())));
        backend.insert(
            p("equilibrium.ids_properties.homogeneous_time"),
            Value::Int(-999_999_999),
        );
        backend.insert(p("equilibrium.time_slice.0.time"), Value::Float(0.1));

        let mut loaded = Ods::new().unwrap();
        let count =
            storage::load_from_backend(&mut loaded, &mut backend, &LoadOptions::new()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(loaded.paths(), vec![p("equilibrium.time_slice.0.time")]);
    }

    #[test]
    fn test_orphan_error_bars_are_ignored() {
        let mut backend = MemoryBackend::new("memory");
        backend.insert(p(&format!("{}_error_upper", IP)), Value::Float(1.0));

        let mut loaded = Ods::new().unwrap();
        let count =
            storage::load_from_backend(&mut loaded, &mut backend, &LoadOptions::new()).unwrap();
        assert_eq!(count, 0);
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_unknown_locations() {
        let mut backend = MemoryBackend::new("memory");
        backend.insert(p("equilibrium.nonsense"), Value::Float(1.0));
        backend.insert(p("equilibrium.time_slice.0.time"), Value::Float(0.1));

        let mut strict = Ods::new().unwrap();
        let err = storage::load_from_backend(&mut strict, &mut backend, &LoadOptions::new())
            .unwrap_err();
        assert!(err.is_schema_lookup());
        assert!(!backend.is_open());

        let mut lenient = Ods::new().unwrap();
        let options = LoadOptions::new().allow_missing_schema_nodes(true);
        let count = storage::load_from_backend(&mut lenient, &mut backend, &options).unwrap();
        assert_eq!(count, 1);
        assert!(lenient.contains("equilibrium.time_slice.0.time"));
    }
}

mod file_tests {
    use super::*;

    fn round_trip(name: &str) -> (Ods, Ods) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        let ods = sample();
        ods.save(&path).unwrap();
        let loaded = Ods::load(&path).unwrap();
        (ods, loaded)
    }

    #[test]
    fn test_json() {
        let (ods, loaded) = round_trip("shot.json");
        assert_eq!(loaded, ods);
    }

    #[test]
    fn test_yaml() {
        let (ods, loaded) = round_trip("shot.yaml");
        assert_eq!(loaded, ods);
    }

    #[test]
    fn test_dump_keeps_settings() {
        let (ods, loaded) = round_trip("shot.dump");
        assert_eq!(loaded, ods);
        assert_eq!(
            loaded.dynamic_path_creation(),
            DynamicPathCreation::DynamicArrayStructures
        );
    }

    #[test]
    fn test_json_nan_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nan.json");
        let mut ods = Ods::new().unwrap();
        ods.set("equilibrium.time", vec![f64::NAN, 0.2]).unwrap();
        ods.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("null"));
        let loaded = Ods::load(&path).unwrap();
        let times = loaded.get("equilibrium.time").unwrap().to_f64_vec().unwrap();
        assert!(times[0].is_nan());
        assert_eq!(times[1], 0.2);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let ods = sample();
        assert!(ods.save(dir.path().join("shot.pkl")).is_err());
        assert!(Ods::load(dir.path().join("missing.json")).is_err());
    }
}
