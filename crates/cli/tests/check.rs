use bindscope_cli::{Cli, run_with};
use bindscope_plugin::testing::*;
use bindscope_plugin::{InMemoryRepository, TypeDeclaration};
use clap::Parser;
use std::path::Path;
use tempfile::TempDir;

fn write_declarations(dir: &TempDir, declarations: Vec<TypeDeclaration>) -> std::path::PathBuf {
    let mut repo = InMemoryRepository::new();
    for declaration in declarations {
        repo.insert(declaration).unwrap();
    }
    let path = dir.path().join("declarations.json");
    std::fs::write(&path, serde_json::to_string_pretty(&repo.to_file()).unwrap()).unwrap();
    path
}

fn run(args: &[&str], file: &Path) -> (bool, String) {
    let mut argv = vec!["bindscope", "check", file.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    let ok = run_with(cli, &mut out).unwrap();
    (ok, String::from_utf8(out).unwrap())
}

fn app(extra: Option<&str>) -> Vec<TypeDeclaration> {
    let mut app = component("App").install("NetModule");
    if let Some(module) = extra {
        app = app.install(module);
    }
    let mut declarations = vec![
        app.entry_point("client", "HttpClient").build(),
        module("NetModule").provides("client", "HttpClient", &[]).build(),
    ];
    if let Some(module_name) = extra {
        declarations.push(module(module_name).provides("other", "HttpClient", &[]).build());
    }
    declarations
}

#[test]
fn test_clean_file() {
    let dir = TempDir::new().unwrap();
    let file = write_declarations(&dir, app(None));
    let (ok, output) = run(&[], &file);
    assert!(ok);
    assert_eq!(output, "checked 1 graph: 0 errors, 0 warnings\n");
}

#[test]
fn test_duplicate_binding_fails() {
    let dir = TempDir::new().unwrap();
    let file = write_declarations(&dir, app(Some("NetModule2")));
    let (ok, output) = run(&[], &file);
    assert!(!ok);
    assert!(output.starts_with("error: [bindscope/DuplicateBindings] HttpClient is bound multiple times:"));
    assert!(output.contains("  at App [App]\n"));
    assert!(output.ends_with("checked 1 graph: 1 error, 0 warnings\n"));
}

#[test]
fn test_full_binding_graph_option() {
    let dir = TempDir::new().unwrap();
    let file = write_declarations(&dir, app(Some("NetModule2")));
    let (ok, output) = run(
        &["--root", "NetModule2", "-A", "bindscope.fullBindingGraphValidation=WARNING"],
        &file,
    );
    assert!(ok, "{}", output);
    assert_eq!(output, "checked 1 graph: 0 errors, 0 warnings\n");
}

#[test]
fn test_invalid_option_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = write_declarations(&dir, app(None));
    let cli = Cli::try_parse_from([
        "bindscope",
        "check",
        file.to_str().unwrap(),
        "-A",
        "bindscope.nullableValidation=NONE",
    ])
    .unwrap();
    let mut out = Vec::new();
    assert!(run_with(cli, &mut out).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let cli = Cli::try_parse_from(["bindscope", "check", dir.path().join("nope.json").to_str().unwrap()]).unwrap();
    let mut out = Vec::new();
    let err = run_with(cli, &mut out).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load declarations"));
}

#[test]
fn test_schema_describes_declaration_file() {
    let cli = Cli::try_parse_from(["bindscope", "schema"]).unwrap();
    let mut out = Vec::new();
    assert!(run_with(cli, &mut out).unwrap());
    let schema: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(schema["title"], "DeclarationFile");
    assert!(schema["properties"]["types"].is_object());
}
