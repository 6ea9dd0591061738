// tests/recipes.rs

//! The recipes shipped in `recipes/`.

mod common;

use common::{bundled_registry, spec};
use pantry::recipe::DependencyType;
use pantry::{Composer, Error, Resolver, VariantValue};

#[test]
fn test_bundled_recipes_load() {
    let reg = bundled_registry();
    for name in ["libsvm", "liblinear", "seidr", "vowpal-wabbit", "blas", "boost"] {
        assert!(reg.contains(name), "missing recipe {}", name);
    }
    let versions = reg.versions_of("liblinear").unwrap();
    assert_eq!(versions.first().map(|v| v.as_str()), Some("246"));
    assert_eq!(versions.last().map(|v| v.as_str()), Some("230"));
}

#[test]
fn test_seidr_pins_its_libraries() {
    let reg = bundled_registry();
    let resolution = Resolver::new(&reg).resolve(&spec("seidr")).unwrap();

    assert_eq!(resolution.node("libsvm").unwrap().version.as_str(), "323");
    assert_eq!(resolution.node("liblinear").unwrap().version.as_str(), "230");
    assert_eq!(resolution.node("libnetworkit").unwrap().version.as_str(), "7.1");
    assert_eq!(
        resolution.node("libnetworkit").unwrap().variants.get("static"),
        Some(&VariantValue::Bool(true))
    );
    assert!(!resolution.contains("intel-tbb"));
    assert!(!resolution.contains("mpi"));

    let tool = resolution
        .dependencies_of("seidr")
        .find(|e| e.to == "pkg-config")
        .unwrap();
    assert_eq!(tool.types, vec![DependencyType::Build]);
}

#[test]
fn test_seidr_tbb_binding() {
    let reg = bundled_registry();
    let composer = Composer::new(&reg, "/opt/pantry");

    let off = Resolver::new(&reg).resolve(&spec("seidr~tbb")).unwrap();
    let plan = composer.compose(&off).unwrap();
    let seidr = plan.step("seidr").unwrap();
    assert!(seidr.env("TBB_ROOT").is_none());
    assert!(seidr.arguments.contains(&"-DSEIDR_PSTL:BOOL=OFF".to_string()));
    assert!(seidr.arguments.contains(&"-DSEIDR_WITHOUT_MPI=ON".to_string()));
    assert_eq!(seidr.env("COIN_UTILS_ROOT"), Some("/usr"));

    let on = Resolver::new(&reg).resolve(&spec("seidr+tbb")).unwrap();
    let plan = composer.compose(&on).unwrap();
    let seidr = plan.step("seidr").unwrap();
    assert_eq!(seidr.env("TBB_ROOT"), Some("/usr"));
    assert!(seidr.arguments.contains(&"-DSEIDR_PSTL:BOOL=ON".to_string()));
    assert_eq!(plan.steps.iter().filter(|s| s.env("TBB_ROOT").is_some()).count(), 1);

    assert_eq!(seidr.patches.len(), 3);
    assert!(seidr.patches[0].path.ends_with("seidr/deps-cmakelists.patch"));
}

#[test]
fn test_seidr_plan_builds_libraries_first() {
    let reg = bundled_registry();
    let resolution = Resolver::new(&reg).resolve(&spec("seidr")).unwrap();
    let plan = Composer::new(&reg, "/opt/pantry").compose(&resolution).unwrap();

    let buildable: Vec<&str> = plan.buildable().map(|s| s.name.as_str()).collect();
    assert_eq!(buildable.len(), 3);
    assert_eq!(buildable.last(), Some(&"seidr"));

    let liblinear = plan.step("liblinear").unwrap();
    assert_eq!(liblinear.filters.len(), 1);
    assert!(liblinear.install.iter().any(|r| r.files.contains(&"tron.h".to_string())));
}

#[test]
fn test_vowpal_wabbit_plan() {
    let reg = bundled_registry();
    let resolution = Resolver::new(&reg).resolve(&spec("vowpal-wabbit")).unwrap();
    assert!(!resolution.contains("flatbuffers"));

    let plan = Composer::new(&reg, "/opt/pantry").compose(&resolution).unwrap();
    let vw = plan.step("vowpal-wabbit").unwrap();
    assert_eq!(vw.targets, vec!["vw_cli_bin".to_string()]);
    assert!(vw.arguments.windows(2).any(|w| w[0] == "-G" && w[1] == "Ninja"));
    assert!(vw.arguments.contains(&"-DVW_INSTALL:BOOL=ON".to_string()));
    assert!(!vw.arguments.contains(&"-DBUILD_FLATBUFFERS=ON".to_string()));

    let with = Resolver::new(&reg)
        .resolve(&spec("vowpal-wabbit+flatbuffers"))
        .unwrap();
    assert!(with.contains("flatbuffers"));
}

#[test]
fn test_seidr_and_vowpal_wabbit_disagree_on_boost() {
    let reg = bundled_registry();
    let err = Resolver::new(&reg)
        .resolve_all(&[spec("seidr"), spec("vowpal-wabbit")])
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { ref package, .. } if package == "boost"));
}

#[test]
fn test_later_requests_satisfied_by_seidr_pins() {
    let reg = bundled_registry();
    let resolver = Resolver::new(&reg);

    for extra in ["libsvm", "libsvm@323:", "boost", "boost+system"] {
        let resolution = resolver.resolve_all(&[spec("seidr"), spec(extra)]).unwrap();
        assert_eq!(resolution.node("libsvm").unwrap().version.as_str(), "323");
        assert_eq!(resolution.roots, vec!["seidr".to_string(), spec(extra).name]);
    }

    let err = resolver.resolve_all(&[spec("seidr"), spec("boost~system")]).unwrap_err();
    assert!(matches!(err, Error::Conflict { ref package, .. } if package == "boost"));
}

#[test]
fn test_disjoint_pins_conflict() {
    let reg = bundled_registry();
    let err = Resolver::new(&reg)
        .resolve_all(&[spec("libsvm@=323"), spec("libsvm@=330")])
        .unwrap_err();
    match err {
        Error::Conflict { package, first, second, .. } => {
            assert_eq!(package, "libsvm");
            assert!(first.contains("323"));
            assert_eq!(second, "libsvm@=330");
        }
        other => panic!("unexpected error {:?}", other),
    }
}
