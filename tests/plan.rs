// tests/plan.rs

//! Build plan composition over resolved graphs.

mod common;

use common::{RecipeText, registry, spec};
use pantry::{BuildPlan, Composer, Error, RecipeRegistry, Resolver};
use std::path::Path;

fn plan(reg: &RecipeRegistry, request: &str) -> pantry::Result<BuildPlan> {
    let resolution = Resolver::new(reg).resolve(&spec(request))?;
    Composer::new(reg, "/opt/pantry").compose(&resolution)
}

fn diamond() -> RecipeRegistry {
    registry(&[
        RecipeText::new("app")
            .version("1.0")
            .depends("left")
            .depends("right")
            .build_tool("cmake-tool")
            .cmake()
            .build(),
        RecipeText::new("left").version("1.0").depends("base").build(),
        RecipeText::new("right").version("2.0").depends("base").build(),
        RecipeText::new("base").version("3.1").version("3.0").build(),
        RecipeText::new("cmake-tool").version("3.27").build(),
    ])
}

#[test]
fn test_dependencies_precede_dependents() {
    let reg = diamond();
    let resolution = Resolver::new(&reg).resolve(&spec("app")).unwrap();
    let plan = Composer::new(&reg, "/opt/pantry").compose(&resolution).unwrap();

    assert_eq!(plan.len(), resolution.len());
    for edge in &resolution.edges {
        let from = plan.position(&edge.from).unwrap();
        let to = plan.position(&edge.to).unwrap();
        assert!(to < from, "{} must come before {}", edge.to, edge.from);
    }
}

#[test]
fn test_plan_is_deterministic() {
    let reg = diamond();
    let first = plan(&reg, "app").unwrap();
    for _ in 0..5 {
        let again = plan(&reg, "app").unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn test_prefixes_are_unique_and_rooted() {
    let reg = diamond();
    let plan = plan(&reg, "app").unwrap();

    let mut prefixes: Vec<&Path> = plan.steps.iter().map(|s| s.prefix.as_path()).collect();
    for prefix in &prefixes {
        assert!(prefix.starts_with("/opt/pantry"));
    }
    prefixes.sort();
    prefixes.dedup();
    assert_eq!(prefixes.len(), plan.len());

    let base = plan.step("base").unwrap();
    let dir = base.prefix.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(dir, format!("base-3.1-{}", base.short_hash()));
}

#[test]
fn test_search_paths_come_from_dependencies() {
    let reg = diamond();
    let plan = plan(&reg, "app").unwrap();
    let app = plan.step("app").unwrap();
    let left = plan.step("left").unwrap();
    let tool = plan.step("cmake-tool").unwrap();

    let cmake_path = app.env("CMAKE_PREFIX_PATH").unwrap();
    assert!(cmake_path.contains(&left.prefix.display().to_string()));
    let path = app.env("PATH").unwrap();
    assert!(path.contains(&tool.prefix.join("bin").display().to_string()));
    assert!(
        app.arguments
            .contains(&format!("-DCMAKE_INSTALL_PREFIX={}", app.prefix.display()))
    );
}

#[test]
fn test_variant_change_changes_hash() {
    let reg = registry(&[RecipeText::new("seidr")
        .version("0.14.2")
        .variant("mpi", false)
        .build()]);
    let off = plan(&reg, "seidr").unwrap();
    let on = plan(&reg, "seidr+mpi").unwrap();

    assert_ne!(off.steps[0].hash, on.steps[0].hash);
    assert_ne!(off.steps[0].prefix, on.steps[0].prefix);
}

#[test]
fn test_conditional_binding_only_with_variant() {
    let reg = registry(&[
        RecipeText::new("seidr")
            .version("0.14.2")
            .variant("tbb", false)
            .depends("zlib")
            .depends_when("intel-tbb", "+tbb")
            .env_prefix("TBB_ROOT", "intel-tbb", Some("+tbb"))
            .env_prefix("ZLIB_ROOT", "zlib", None)
            .cmake()
            .build(),
        RecipeText::new("intel-tbb").version("2020.3").build(),
        RecipeText::new("zlib").version("1.2.13").build(),
    ]);

    let without = plan(&reg, "seidr~tbb").unwrap();
    assert!(without.steps.iter().all(|s| s.env("TBB_ROOT").is_none()));
    assert!(without.step("seidr").unwrap().env("ZLIB_ROOT").is_some());

    let with = plan(&reg, "seidr+tbb").unwrap();
    let tbb_prefix = with.step("intel-tbb").unwrap().prefix.display().to_string();
    for step in &with.steps {
        match step.name.as_str() {
            "seidr" => assert_eq!(step.env("TBB_ROOT"), Some(tbb_prefix.as_str())),
            _ => assert!(step.env("TBB_ROOT").is_none()),
        }
    }
}

#[test]
fn test_prefix_of_unresolved_package_fails() {
    let reg = registry(&[
        RecipeText::new("seidr")
            .version("0.14.2")
            .env_prefix("TBB_ROOT", "intel-tbb", None)
            .build(),
        RecipeText::new("intel-tbb").version("2020.3").build(),
    ]);
    let err = plan(&reg, "seidr").unwrap_err();
    assert!(matches!(err, Error::PlanComposition { ref package, .. } if package == "seidr"));
}
