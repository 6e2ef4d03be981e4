//! Bundle loading tests
//!
//! Directory and archive bundles, `$ref` resolution and the schema cache.

use std::fs;
use std::path::Path;

use checkmate::commands::{execute_pack, PackOptions};
use checkmate::package::schema::{load_schema, resolve_schema};
use checkmate::package::{Package, Source, CACHE_FILE, CONFIG_FILE, DATA_FILE};
use checkmate::{CheckmateError, Config, Feature, Project, ResourceLoader};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_bundle(dir: &Path) {
    let config = json!({
        "name": "Tree Works",
        "author": "Council",
        "license": "MIT",
        "features": [
            {"type": "number", "tag": "trees", "title": "Trees to fell"},
            {"$ref": "fragments/protected.json", "tag": "protected"},
            {"type": "checkform", "tag": "site", "properties": {
                "address": {"$ref": "fragments/address.json"}
            }}
        ]
    });
    fs::create_dir_all(dir.join("fragments")).unwrap();
    fs::write(dir.join(CONFIG_FILE), config.to_string()).unwrap();
    fs::write(
        dir.join("fragments/protected.json"),
        json!({"type": "checkbox", "tag": "ignored", "condition": "trees > 5"}).to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("fragments/address.json"),
        json!({"type": "string", "title": "Address"}).to_string(),
    )
    .unwrap();
}

fn bundle_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_bundle(&temp.path().join("trees"));
    temp
}

// =============================================================================
// Opening bundles
// =============================================================================

mod open_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_directory() {
        let temp = bundle_dir();
        let dir = temp.path().join("trees");
        let package = Package::open(&dir).unwrap();
        assert_eq!(package.name(), "trees");
        assert!(matches!(package.source(), Source::Directory(_)));
        assert!(package.get("fragments/protected.json").is_some());
        assert_eq!(package.default_archive(), Some(temp.path().join("trees.chlx")));
    }

    #[test]
    fn test_open_bare_name_prefers_archive() {
        let temp = bundle_dir();
        let dir = temp.path().join("trees");
        let mut package = Package::open(&dir).unwrap();
        let archive = package.save_as(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let reopened = Package::open(&dir).unwrap();
        assert!(matches!(reopened.source(), Source::Archive(path) if *path == archive));
        assert_eq!(reopened.names(), package.names());
    }

    #[test]
    fn test_open_missing_bundle() {
        let temp = TempDir::new().unwrap();
        let result = Package::open(temp.path().join("nothing"));
        assert!(matches!(result, Err(CheckmateError::NotFound(_))));
    }

    #[test]
    fn test_directory_without_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme.md"), "hello").unwrap();
        let result = Package::open(temp.path());
        assert!(matches!(result, Err(CheckmateError::Schema(_))));
    }

    #[test]
    fn test_project_from_directory_resolves_refs() {
        let temp = bundle_dir();
        let mut project = Project::new(Package::open(temp.path().join("trees")).unwrap()).unwrap();
        assert_eq!(project.name, "Tree Works");
        assert!(project.feature("ignored").is_none());
        assert_eq!(project.feature("address").unwrap().tag(), "address");

        project.set_feature("trees", &json!(8)).unwrap();
        assert_eq!(project.feature("protected").unwrap().value(), json!(true));
    }

    #[test]
    fn test_pack_command_writes_archive() {
        let temp = bundle_dir();
        let dir = temp.path().join("trees");
        execute_pack(PackOptions {
            dir: dir.clone(),
            output: Some(temp.path().join("out/packed")),
        })
        .unwrap();

        let archive = temp.path().join("out/packed.chlx");
        let package = Package::open(&archive).unwrap();
        assert_eq!(package.name(), "packed");
        assert!(package.get("fragments/address.json").is_some());
    }
}

// =============================================================================
// Schema cache
// =============================================================================

mod cache_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feature_tags(project: &Project) -> Vec<String> {
        project
            .features()
            .iter()
            .map(|f| f.tag().to_string())
            .collect()
    }

    #[test]
    fn test_cached_and_fresh_loads_agree() {
        let temp = bundle_dir();
        let dir = temp.path().join("trees");

        let fresh = Project::with_config(
            Package::open(&dir).unwrap(),
            Config {
                schema_cache: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!dir.join(CACHE_FILE).exists());

        // The first cached load writes the cache through to the directory
        let first = Project::new(Package::open(&dir).unwrap()).unwrap();
        assert!(dir.join(CACHE_FILE).exists());
        let cached = Project::new(Package::open(&dir).unwrap()).unwrap();

        for project in [&first, &cached] {
            assert_eq!(feature_tags(project), feature_tags(&fresh));
            assert_eq!(project.schema(), fresh.schema());
            assert_eq!(project.author, fresh.author);
            assert_eq!(project.license, fresh.license);
        }
    }

    #[test]
    fn test_cache_is_preferred_when_present() {
        let temp = bundle_dir();
        let dir = temp.path().join("trees");
        let mut package = Package::open(&dir).unwrap();
        let cached = load_schema(&mut package, true).unwrap();
        assert!(cached.generated_at.is_some());

        // Editing the config after caching is not seen until the cache goes
        let changed = json!({"name": "Renamed", "features": []});
        fs::write(dir.join(CONFIG_FILE), changed.to_string()).unwrap();
        let mut reopened = Package::open(&dir).unwrap();
        assert_eq!(load_schema(&mut reopened, true).unwrap().name, "Tree Works");
        assert_eq!(resolve_schema(&reopened).unwrap().name, "Renamed");
    }

    #[test]
    fn test_resolved_fragment_takes_referencing_tag() {
        let temp = bundle_dir();
        let package = Package::open(temp.path().join("trees")).unwrap();
        let schema = resolve_schema(&package).unwrap();
        assert_eq!(schema.features[1]["tag"], json!("protected"));
        assert_eq!(schema.features[1]["type"], json!("checkbox"));
        assert!(schema.features[1].get("$ref").is_none());
        assert_eq!(
            schema.features[2]["properties"]["address"]["type"],
            json!("string")
        );
        assert!(schema.generated_at.is_none());
    }

    #[test]
    fn test_saved_answers_travel_with_archive() {
        let temp = bundle_dir();
        let mut project = Project::new(Package::open(temp.path().join("trees")).unwrap()).unwrap();
        project.set_feature("trees", &json!(9)).unwrap();
        let archive = project.save_project().unwrap();
        assert_eq!(archive, temp.path().join("trees.chlx"));

        let package = Package::open(&archive).unwrap();
        let data: Value = serde_json::from_slice(package.get(DATA_FILE).unwrap()).unwrap();
        assert_eq!(data["values"]["trees"], json!(9));
        assert_eq!(data["tags"], json!(["protected"]));
    }
}
