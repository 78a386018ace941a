//! Range application driven by a range map read back from disk, against
//! directory and archive stores.

use std::fs;
use std::path::Path;

use srcremap_core::apply::{remap_sources, ApplyOptions, Stores};
use srcremap_core::rangemap::{Occurrence, RangeMap, Span};
use srcremap_core::signature::{OccurrenceKind, SymbolSignature};
use srcremap_core::store::{open_for_read, open_for_write, open_in_place};
use srcremap_core::table::RenameTable;

const A: &str = "class A { int foo(int bar) { return bar; } }";
const B: &str = "class B { A a; int run() { return a.foo(1); } }";

fn occ(start: usize, end: usize, sig: &str, kind: OccurrenceKind) -> Occurrence {
    Occurrence::new(Span::new(start, end), SymbolSignature::from(sig), kind)
}

fn range_map() -> RangeMap {
    let mut map = RangeMap::new();
    map.insert_unit(
        "p/A.java",
        vec![
            occ(6, 7, "A", OccurrenceKind::Type),
            occ(14, 17, "A.foo(I)I", OccurrenceKind::Method),
            occ(22, 25, "A.foo(I)I#0", OccurrenceKind::Parameter),
            occ(36, 39, "A.foo(I)I#0", OccurrenceKind::Parameter),
        ],
    )
    .unwrap();
    map.insert_unit(
        "p/B.java",
        vec![
            occ(6, 7, "B", OccurrenceKind::Type),
            occ(10, 11, "A", OccurrenceKind::Type),
            occ(19, 22, "B.run()I", OccurrenceKind::Method),
            occ(36, 39, "A.foo(I)I", OccurrenceKind::Method),
        ],
    )
    .unwrap();
    map
}

fn table() -> RenameTable {
    let mut table = RenameTable::new();
    table.insert("A", "Alpha");
    table.insert("A.foo(I)I", "compute");
    table.insert_param("A.foo(I)I", 0, "input");
    table
}

/// Save, then load back, the way the two phases hand off.
fn reloaded(dir: &Path) -> RangeMap {
    let path = dir.join("out.rangemap");
    range_map().save(&path).unwrap();
    RangeMap::load(&path).unwrap()
}

#[test]
fn reloaded_map_matches_the_original() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(reloaded(dir.path()), range_map());
}

#[test]
fn directory_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("p")).unwrap();
    fs::write(src.join("p/A.java"), A).unwrap();
    fs::write(src.join("p/B.java"), B).unwrap();
    let map = reloaded(dir.path());

    let mut store = open_in_place(&src).unwrap();
    let report = remap_sources(
        Stores::InPlace(store.as_mut()),
        &map,
        &table(),
        &ApplyOptions::default(),
    )
    .unwrap();
    store.close().unwrap();

    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(src.join("p/A.java")).unwrap(),
        "class Alpha { int compute(int input) { return input; } }"
    );
    assert_eq!(
        fs::read_to_string(src.join("p/B.java")).unwrap(),
        "class B { Alpha a; int run() { return a.compute(1); } }"
    );
    let olds: Vec<_> = report.log.entries().iter().map(|e| e.old.as_str()).collect();
    assert_eq!(olds, ["A", "foo", "bar", "bar", "A", "foo"]);
}

#[test]
fn directory_to_archive_copies_other_units() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("p")).unwrap();
    fs::write(src.join("p/A.java"), A).unwrap();
    fs::write(src.join("p/B.java"), B).unwrap();
    fs::write(src.join("p/notes.txt"), "class A\n").unwrap();
    let map = reloaded(dir.path());
    let jar = dir.path().join("out.jar");

    let mut input = open_for_read(&src).unwrap();
    let mut output = open_for_write(&jar).unwrap();
    let report = remap_sources(
        Stores::Separate {
            input: input.as_ref(),
            output: output.as_mut(),
        },
        &map,
        &table(),
        &ApplyOptions::default(),
    )
    .unwrap();
    output.close().unwrap();
    input.close().unwrap();
    assert!(report.is_clean());

    let written = open_for_read(&jar).unwrap();
    assert_eq!(
        written.enumerate().unwrap(),
        ["p/A.java", "p/B.java", "p/notes.txt"]
    );
    assert_eq!(
        written.read("p/A.java").unwrap(),
        "class Alpha { int compute(int input) { return input; } }"
    );
    assert_eq!(written.read("p/notes.txt").unwrap(), "class A\n");
    // input untouched
    assert_eq!(fs::read_to_string(src.join("p/A.java")).unwrap(), A);
}

#[test]
fn unmapped_table_leaves_sources_alone() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("p")).unwrap();
    fs::write(src.join("p/A.java"), A).unwrap();
    let mut map = RangeMap::new();
    map.insert_unit("p/A.java", range_map().occurrences("p/A.java").to_vec())
        .unwrap();

    let mut store = open_in_place(&src).unwrap();
    let report = remap_sources(
        Stores::InPlace(store.as_mut()),
        &map,
        &RenameTable::new(),
        &ApplyOptions::default(),
    )
    .unwrap();
    store.close().unwrap();

    assert!(report.log.is_empty());
    assert_eq!(report.units_written(), 0);
    assert_eq!(fs::read_to_string(src.join("p/A.java")).unwrap(), A);
}
