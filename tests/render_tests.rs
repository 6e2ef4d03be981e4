//! Report rendering tests
//!
//! Text templates through a project, and document export through a stand-in
//! converter script.

use checkmate::package::{Package, CONFIG_FILE};
use checkmate::{CheckmateError, Config, Project, RenderOutput};
use serde_json::{json, Value};

fn project_with(templates: Value, files: Vec<(&str, Vec<u8>)>, config: Config) -> Project {
    let bundle = json!({
        "name": "Hedgerow",
        "author": "Parish",
        "templates": templates,
        "features": [
            {"type": "number", "tag": "lengthM", "default": 25},
            {"type": "checkbox", "tag": "notice", "condition": "lengthM > 20"},
            {"type": "checklist", "tag": "species", "enum": [
                {"tag": "hawthorn", "title": "Hawthorn", "default": true},
                {"tag": "hazel", "title": "Hazel"}
            ]}
        ]
    });
    let mut all = vec![(CONFIG_FILE, bundle.to_string().into_bytes())];
    all.extend(files);
    Project::with_config(Package::from_files("hedgerow", all), config).unwrap()
}

// =============================================================================
// Text templates
// =============================================================================

mod text_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_runs_collapse_to_one_line() {
        let project = project_with(
            json!([{"name": "report", "filenames": ["report.md"]}]),
            vec![("report.md", b"Title\n\n\n\nBody".to_vec())],
            Config::default(),
        );
        assert_eq!(project.evaluate(), "Title\n\nBody");
    }

    #[test]
    fn test_template_sees_tags_and_values() {
        let body = "# {{name}} by {{author}}\n\n\
                    {{#if tags.notice}}Notice needed for {{values.lengthM}} m.{{/if}}\n\n\n\n\
                    {{#each values.species}}- {{this}}\n{{/each}}";
        let project = project_with(
            json!([{"name": "report", "filenames": ["report.md"]}]),
            vec![("report.md", body.as_bytes().to_vec())],
            Config::default(),
        );
        assert_eq!(
            project.evaluate(),
            "# Hedgerow by Parish\n\nNotice needed for 25 m.\n\n- hawthorn"
        );
    }

    #[test]
    fn test_partials_come_from_later_files() {
        let project = project_with(
            json!([{"name": "report", "filenames": ["report.md", "footer.md"]}]),
            vec![
                ("report.md", b"Length {{values.lengthM}}\n{{> footer}}".to_vec()),
                ("footer.md", b"-- {{name}}".to_vec()),
            ],
            Config::default(),
        );
        let output = project.render(Some("report")).unwrap();
        assert_eq!(output.as_text(), Some("Length 25\n-- Hedgerow"));
    }

    #[test]
    fn test_unknown_template_is_not_found() {
        let project = project_with(
            json!([{"name": "report", "filenames": ["report.md"]}]),
            vec![("report.md", b"x".to_vec())],
            Config::default(),
        );
        assert!(matches!(project.render(Some("other")), Err(CheckmateError::NotFound(_))));
    }

    #[test]
    fn test_no_templates_evaluates_empty() {
        let project = project_with(json!([]), Vec::new(), Config::default());
        assert_eq!(project.evaluate(), "");
        assert!(project.render(None).is_err());
    }
}

// =============================================================================
// Document export
// =============================================================================

#[cfg(unix)]
mod document_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{self, File};
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{ZipArchive, ZipWriter};

    const DOCUMENT_XML: &str =
        "<w:document><w:tbl><w:tblPr><w:tblStyle w:val=\"Table\" /></w:tblPr></w:tbl></w:document>";

    fn fixture_docx(dir: &Path) -> PathBuf {
        let path = dir.join("fixture.docx");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(DOCUMENT_XML.as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    /// Write an executable stand-in for the converter
    fn script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-converter");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn config(dir: &Path, program: String, timeout_secs: u64) -> Config {
        let mut config = Config {
            output_dir: dir.join("out"),
            ..Default::default()
        };
        config.converter.program = program;
        config.converter.timeout_secs = timeout_secs;
        config
    }

    fn document_project(config: Config, reference: bool) -> Project {
        let mut template = json!({"name": "letter", "filenames": ["letter.md"], "format": "docx"});
        let mut files = vec![("letter.md", b"| a | b |\n|---|---|\n| 1 | 2 |".to_vec())];
        if reference {
            template["reference_doc"] = json!("reference.docx");
            files.push(("reference.docx", b"reference".to_vec()));
        }
        project_with(json!([template]), files, config)
    }

    fn document_xml(path: &Path) -> String {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn test_document_export_rewrites_table_style() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture_docx(temp.path());
        let log = temp.path().join("args.log");
        let program = script(
            temp.path(),
            &format!(
                "echo \"$@\" > {}\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    --output=*) out=\"${{arg#--output=}}\" ;;\n  esac\ndone\ncp {} \"$out\"",
                log.display(),
                fixture.display()
            ),
        );
        let project = document_project(config(temp.path(), program, 30), true);

        let output = project.render(None).unwrap();
        let path = temp.path().join("out/letter.docx");
        assert!(matches!(&output, RenderOutput::Document(p) if *p == path));
        assert_eq!(
            document_xml(&path),
            "<w:document><w:tbl><w:tblPr><w:tblStyle w:val=\"StileTable\" /></w:tblPr></w:tbl></w:document>"
        );

        let args = fs::read_to_string(&log).unwrap();
        assert!(args.starts_with("--from=markdown+pipe_tables --to=docx --columns=43 --wrap=preserve"));
        assert!(args.contains("--reference-doc="));
    }

    #[test]
    fn test_failing_converter_reports_stderr() {
        let temp = TempDir::new().unwrap();
        let program = script(temp.path(), "echo 'unknown reader' >&2\nexit 3");
        let project = document_project(config(temp.path(), program, 30), false);

        let err = project.render(None).unwrap_err();
        assert!(matches!(err, CheckmateError::Conversion(_)));
        assert!(err.to_string().contains("unknown reader"));
        assert!(!temp.path().join("out/letter.docx").exists());
    }

    #[test]
    fn test_converter_without_output_fails() {
        let temp = TempDir::new().unwrap();
        let program = script(temp.path(), "exit 0");
        let project = document_project(config(temp.path(), program, 30), false);

        let err = project.render(None).unwrap_err();
        assert!(err.to_string().contains("produced no output"));
    }

    #[test]
    fn test_slow_converter_times_out() {
        let temp = TempDir::new().unwrap();
        let program = script(temp.path(), "sleep 5");
        let project = document_project(config(temp.path(), program, 1), false);

        let started = std::time::Instant::now();
        let err = project.render(None).unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }

    #[test]
    fn test_missing_reference_document() {
        let temp = TempDir::new().unwrap();
        let mut template = json!({"name": "letter", "filenames": ["letter.md"], "format": "docx"});
        template["reference_doc"] = json!("absent.docx");
        let project = project_with(
            json!([template]),
            vec![("letter.md", b"x".to_vec())],
            config(temp.path(), "true".to_string(), 30),
        );
        assert!(matches!(project.render(None), Err(CheckmateError::NotFound(_))));
    }
}
