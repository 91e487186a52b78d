mod common;

use common::ArchiveBuilder;
use nestarc::{ArchiveFile, ArchiveKind, Error};

fn inner_archive() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry("conf/inner.toml", b"inner = true\n")
        .entry("notes.txt", b"nested content")
        .build()
}

#[test]
fn test_stored_nested_archive_is_a_window_over_the_parent() {
    let inner = inner_archive();
    let file = ArchiveBuilder::new()
        .entry("lib/util.arc", &inner)
        .entry("other.txt", b"x")
        .write_temp();
    let parent = ArchiveFile::open_path(file.path()).unwrap();

    let header = parent.find_entry("lib/util.arc").unwrap().unwrap();
    let nested = parent.nested_archive(&header).unwrap();

    assert_eq!(nested.kind(), ArchiveKind::NestedArchive);
    assert_eq!(nested.backing_path(), parent.backing_path());
    assert_eq!(nested.entry_count(), 2);
    assert_eq!(
        nested.read("conf/inner.toml").unwrap().unwrap(),
        b"inner = true\n"
    );
    assert_eq!(nested.read("notes.txt").unwrap().unwrap(), b"nested content");
}

#[test]
fn test_nested_archive_inside_a_prefixed_parent() {
    let inner = inner_archive();
    let file = ArchiveBuilder::new()
        .prefix(&[0xEEu8; 777])
        .entry("lib/util.arc", &inner)
        .write_temp();
    let parent = ArchiveFile::open_path(file.path()).unwrap();

    let header = parent.find_entry("lib/util.arc").unwrap().unwrap();
    let nested = parent.nested_archive(&header).unwrap();
    assert_eq!(nested.read("notes.txt").unwrap().unwrap(), b"nested content");
}

#[cfg(feature = "deflate")]
#[test]
fn test_compressed_nested_archive_is_a_packaging_error() {
    let inner = inner_archive();
    let file = ArchiveBuilder::new()
        .deflated_entry("lib/y.pkg", &inner)
        .write_temp();
    let parent = ArchiveFile::open_path(file.path()).unwrap();

    let header = parent.find_entry("lib/y.pkg").unwrap().unwrap();
    let err = parent.nested_archive(&header).unwrap_err();
    assert!(err.is_packaging_error());
    match err {
        Error::Configuration { entry } => assert_eq!(entry, "lib/y.pkg"),
        other => panic!("unexpected error: {other:?}"),
    }
    let message = format!(
        "{}",
        Error::Configuration {
            entry: "lib/y.pkg".to_string()
        }
    );
    assert!(message.contains("must be stored without compression"));
}

#[test]
fn test_directory_entry_becomes_a_filtered_view() {
    let file = ArchiveBuilder::new()
        .directory("APP-INF/classes/")
        .entry("APP-INF/classes/app/main.cmp", b"component bytes")
        .entry("APP-INF/classes/app/util.cmp", b"util bytes")
        .entry("APP-INF/unrelated.txt", b"outside the view")
        .write_temp();
    let parent = ArchiveFile::open_path(file.path()).unwrap();

    let header = parent.find_entry("APP-INF/classes/").unwrap().unwrap();
    let view = parent.nested_archive(&header).unwrap();

    assert_eq!(view.kind(), ArchiveKind::NestedDirectory);
    assert_eq!(view.backing_path(), parent.backing_path());
    // Child names lose the directory prefix; outside entries disappear.
    assert_eq!(view.entry_count(), 2);
    assert_eq!(
        view.read("app/main.cmp").unwrap().unwrap(),
        b"component bytes"
    );
    assert!(view.read("APP-INF/unrelated.txt").unwrap().is_none());
    assert!(view.read("unrelated.txt").unwrap().is_none());
}

#[test]
fn test_nested_inside_nested() {
    let innermost = ArchiveBuilder::new()
        .entry("deep.txt", b"two levels down")
        .build();
    let middle = ArchiveBuilder::new()
        .entry("lib/deep.arc", &innermost)
        .build();
    let file = ArchiveBuilder::new()
        .entry("lib/middle.arc", &middle)
        .write_temp();

    let outer = ArchiveFile::open_path(file.path()).unwrap();
    let middle_header = outer.find_entry("lib/middle.arc").unwrap().unwrap();
    let middle = outer.nested_archive(&middle_header).unwrap();
    let deep_header = middle.find_entry("lib/deep.arc").unwrap().unwrap();
    let deep = middle.nested_archive(&deep_header).unwrap();

    assert_eq!(deep.backing_path(), outer.backing_path());
    assert_eq!(deep.read("deep.txt").unwrap().unwrap(), b"two levels down");
}

#[test]
fn test_nested_location_chains_entry_names() {
    let inner = inner_archive();
    let file = ArchiveBuilder::new()
        .entry("lib/util.arc", &inner)
        .write_temp();
    let parent = ArchiveFile::open_path(file.path()).unwrap();

    let header = parent.find_entry("lib/util.arc").unwrap().unwrap();
    let nested = parent.nested_archive(&header).unwrap();
    assert_eq!(
        nested.location(),
        format!("{}!/lib/util.arc", file.path().display())
    );
}
