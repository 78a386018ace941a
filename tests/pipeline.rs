//! Pipeline tests: the full run over directory and archive collections on
//! disk, as the CLI drives it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use srcremap::error::RemapError;
use srcremap::output::RunSummary;
use srcremap::rangemap::RangeMap;
use srcremap::remap::{run_apply, run_extract, run_remap, OutputMode, RemapConfig};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const OLD: &str = r#"package com.x;

public class Old {
    private int count;

    public int bump(int step) {
        count += step;
        return count;
    }
}
"#;

const USER: &str = r#"package com.y;

import com.x.Old;

public class User {
    public int run() {
        Old old = new Old();
        return old.bump(2);
    }
}
"#;

const MAPPINGS: &str = "\
CL: com/x/Old com/x/Counter
FD: com/x/Old/count com/x/Counter/total
MD: com/x/Old/bump (I)I com/x/Counter/increment (I)I
";

const PARAMS: &str = "com/x/Old.bump(I)I=|amount\n";

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (id, text) in files {
        let path = root.join(id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (id, bytes) in files {
        zip.start_file(*id, zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn read_zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("joined.srg", MAPPINGS), ("joined.exc", PARAMS)]);
        Workspace { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, input: &str) -> RemapConfig {
        let mut config = RemapConfig::new(self.path(input));
        config.primary = vec![self.path("joined.srg")];
        config.secondary = vec![self.path("joined.exc")];
        config.range_map = Some(self.path("out.rangemap"));
        config.rename_log = Some(self.path("out.rangelog"));
        config
    }
}

fn expected_old() -> String {
    OLD.replace("class Old", "class Counter")
        .replace("count", "total")
        .replace("bump(int step)", "increment(int amount)")
        .replace("step", "amount")
}

fn expected_user() -> String {
    USER.replace("com.x.Old", "com.x.Counter")
        .replace("Old old = new Old()", "Counter old = new Counter()")
        .replace("bump", "increment")
}

// ============================================================================
// Directory Collections
// ============================================================================

#[test]
fn directory_to_separate_directory() {
    let ws = Workspace::new();
    write_tree(
        &ws.path("src"),
        &[("com/x/Old.java", OLD), ("com/y/User.java", USER), ("README.txt", "notes\n")],
    );
    let mut config = ws.config("src");
    config.output = OutputMode::Separate(ws.path("out"));

    let mut summary = RunSummary::new("remap");
    run_remap(&config, &mut summary).unwrap();

    let out = ws.path("out");
    assert_eq!(fs::read_to_string(out.join("com/x/Old.java")).unwrap(), expected_old());
    assert_eq!(fs::read_to_string(out.join("com/y/User.java")).unwrap(), expected_user());
    assert_eq!(fs::read_to_string(out.join("README.txt")).unwrap(), "notes\n");
    // input untouched
    assert_eq!(fs::read_to_string(ws.path("src/com/x/Old.java")).unwrap(), OLD);

    let apply = summary.apply.as_ref().unwrap();
    assert_eq!(apply.units_failed, 0);
    assert!(apply.substitutions > 0);
    assert_eq!(summary.mapping.as_ref().unwrap().skipped_lines, 0);

    let log = fs::read_to_string(ws.path("out.rangelog")).unwrap();
    assert!(log.contains("bump\tincrement\tcom/x/Old.java\t"));
    let range_map = RangeMap::load(&ws.path("out.rangemap")).unwrap();
    assert!(range_map.signatures().contains("com.x.Old.bump(I)I"));
}

#[test]
fn directory_in_place() {
    let ws = Workspace::new();
    write_tree(&ws.path("src"), &[("com/x/Old.java", OLD), ("com/y/User.java", USER)]);
    let config = ws.config("src");
    assert!(config.is_in_place());

    let mut summary = RunSummary::new("remap");
    run_remap(&config, &mut summary).unwrap();

    assert_eq!(
        fs::read_to_string(ws.path("src/com/x/Old.java")).unwrap(),
        expected_old()
    );
    assert_eq!(
        fs::read_to_string(ws.path("src/com/y/User.java")).unwrap(),
        expected_user()
    );
}

#[test]
fn separate_output_naming_the_input_is_rejected() {
    let ws = Workspace::new();
    write_tree(&ws.path("src"), &[("com/x/Old.java", OLD)]);
    let mut config = ws.config("src");
    config.output = OutputMode::Separate(ws.path("src/../src"));
    assert!(!config.is_in_place());

    let mut summary = RunSummary::new("remap");
    let err = run_remap(&config, &mut summary).unwrap_err();
    assert!(matches!(err, RemapError::InvalidArguments { .. }), "{err:?}");
    assert_eq!(fs::read_to_string(ws.path("src/com/x/Old.java")).unwrap(), OLD);
    assert!(!ws.path("out.rangemap").exists());
}

#[test]
fn default_artifacts_go_to_temporary_files() {
    let ws = Workspace::new();
    write_tree(&ws.path("src"), &[("com/x/Old.java", OLD)]);
    let mut config = ws.config("src");
    config.range_map = None;
    config.rename_log = None;
    config.output = OutputMode::Separate(ws.path("out"));

    let mut summary = RunSummary::new("remap");
    run_remap(&config, &mut summary).unwrap();

    let range_map = PathBuf::from(summary.range_map.clone().unwrap());
    let rename_log = PathBuf::from(summary.rename_log.clone().unwrap());
    assert!(range_map.exists());
    assert!(rename_log.exists());
    fs::remove_file(range_map).unwrap();
    fs::remove_file(rename_log).unwrap();
}

// ============================================================================
// Archive Collections
// ============================================================================

#[test]
fn archive_to_archive_keeps_other_entries() {
    let ws = Workspace::new();
    write_zip(
        &ws.path("src.zip"),
        &[
            ("com/x/Old.java", OLD.as_bytes()),
            ("com/y/User.java", USER.as_bytes()),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
        ],
    );
    let mut config = ws.config("src.zip");
    config.output = OutputMode::Separate(ws.path("out.jar"));

    let mut summary = RunSummary::new("remap");
    run_remap(&config, &mut summary).unwrap();

    let out = ws.path("out.jar");
    assert_eq!(read_zip_entry(&out, "com/x/Old.java"), expected_old().into_bytes());
    assert_eq!(read_zip_entry(&out, "com/y/User.java"), expected_user().into_bytes());
    assert_eq!(read_zip_entry(&out, "META-INF/MANIFEST.MF"), b"Manifest-Version: 1.0\n");
}

#[test]
fn archive_in_place() {
    let ws = Workspace::new();
    write_zip(&ws.path("src.zip"), &[("com/x/Old.java", OLD.as_bytes())]);
    let config = ws.config("src.zip");

    let mut summary = RunSummary::new("remap");
    run_remap(&config, &mut summary).unwrap();

    assert_eq!(
        read_zip_entry(&ws.path("src.zip"), "com/x/Old.java"),
        expected_old().into_bytes()
    );
}

// ============================================================================
// Split Phases and Failures
// ============================================================================

#[test]
fn extract_then_apply() {
    let ws = Workspace::new();
    write_tree(&ws.path("src"), &[("com/x/Old.java", OLD), ("com/y/User.java", USER)]);
    let mut config = ws.config("src");

    let mut summary = RunSummary::new("extract");
    run_extract(&config, &mut summary).unwrap();
    assert!(summary.extraction.as_ref().unwrap().worked);
    // extraction alone writes no sources
    assert_eq!(fs::read_to_string(ws.path("src/com/x/Old.java")).unwrap(), OLD);

    config.output = OutputMode::Separate(ws.path("out"));
    let mut summary = RunSummary::new("apply");
    run_apply(&config, &ws.path("out.rangemap"), &mut summary).unwrap();
    assert_eq!(
        fs::read_to_string(ws.path("out/com/x/Old.java")).unwrap(),
        expected_old()
    );
}

#[test]
fn failed_extraction_writes_nothing() {
    let ws = Workspace::new();
    write_tree(
        &ws.path("src"),
        &[("A.java", "class A { void f( }"), ("B.java", "class B { int = ; }")],
    );
    let mut config = ws.config("src");
    config.output = OutputMode::Separate(ws.path("out"));

    let mut summary = RunSummary::new("remap");
    let err = run_remap(&config, &mut summary).unwrap_err();
    assert!(matches!(err, RemapError::ExtractionFailed { .. }));
    assert!(!summary.extraction.as_ref().unwrap().worked);
    assert!(!ws.path("out").exists());
    assert!(!ws.path("out.rangemap").exists());
}

#[test]
fn missing_mapping_file_is_an_error() {
    let ws = Workspace::new();
    write_tree(&ws.path("src"), &[("com/x/Old.java", OLD)]);
    let mut config = ws.config("src");
    config.primary.push(ws.path("missing.srg"));

    let mut summary = RunSummary::new("remap");
    let err = run_remap(&config, &mut summary).unwrap_err();
    assert!(matches!(err, RemapError::Table(_)));
    assert_eq!(fs::read_to_string(ws.path("src/com/x/Old.java")).unwrap(), OLD);
}
