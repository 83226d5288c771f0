//! Scenario tests ported from the concrete walkthroughs this crate's mount
//! engine is specified against: dummy-parent synthesis, both nesting
//! policies, partial-path search, and deep synthesized directory chains.
//! Single-flight initialization under concurrent first touch is covered as a
//! unit test in `src/context.rs`, since it needs a counting `ZipSource` the
//! public API has no way to inject.

use std::io::Read;

use vfs_zip::{Handler, Options};

use crate::fixtures;

#[test]
fn dummy_parent_synthesized_for_entry_with_no_directory_listing() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "outer.jar", &[("META-INF/empty.txt", b"")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();

    let meta_inf = root.get_child("META-INF").unwrap().expect("META-INF synthesized");
    assert!(!meta_inf.is_leaf().unwrap(), "synthesized parent must not be a leaf");
    assert_eq!(meta_inf.size().unwrap(), 0);

    let children = meta_inf.get_children().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "empty.txt");

    let empty = meta_inf.get_child("empty.txt").unwrap().expect("empty.txt must exist");
    assert!(empty.is_leaf().unwrap());
    assert_eq!(empty.size().unwrap(), 0);

    let mut buf = Vec::new();
    empty.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert!(buf.is_empty());
}

#[test]
fn no_copy_nested_mount_streams_without_extracting_to_disk() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("a/b.txt", b"hi")]);
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[("lib/inner.jar", &inner_bytes)]);

    let root = vfs_zip::mount_file(&outer_path, Options::default()).unwrap();

    let inner = root.get_child("lib/inner.jar").unwrap().expect("inner.jar mounted");
    assert!(matches!(inner, Handler::Delegating(_)));
    assert!(!inner.is_leaf().unwrap(), "a mounted archive root is a container");

    let leaf = inner
        .get_child("a")
        .unwrap()
        .expect("a/")
        .get_child("b.txt")
        .unwrap()
        .expect("a/b.txt");
    let mut buf = Vec::new();
    leaf.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hi");
}

#[test]
fn copy_mode_extracts_once_and_reuses_it_on_repeat_lookup() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("a/b.txt", b"hi")]);
    let marker = format!("copy-scenario-{}.jar", std::process::id());
    let entry_name = format!("lib/{marker}");
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[(entry_name.as_str(), &inner_bytes)]);

    let options = Options::builder().use_copy(true).build();
    let root = vfs_zip::mount_file(&outer_path, options).unwrap();

    let first = root.get_child(&entry_name).unwrap().expect("first lookup");
    let before = fixtures::count_temp_files(&marker);
    assert_eq!(before, 1, "exactly one file should be extracted");

    let second = root.get_child(&entry_name).unwrap().expect("repeat lookup");
    assert_eq!(fixtures::count_temp_files(&marker), 1, "repeat lookup must not re-extract");

    let leaf = first
        .get_child("a")
        .unwrap()
        .expect("a/")
        .get_child("b.txt")
        .unwrap()
        .expect("a/b.txt");
    let mut buf = Vec::new();
    leaf.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hi");

    drop(second);
}

#[test]
fn partial_path_resolves_through_a_nested_archive_with_no_prior_context() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("a/b.txt", b"hi")]);
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[("lib/inner.jar", &inner_bytes)]);

    let target = outer_path.join("lib/inner.jar/a/b.txt");
    let handler = vfs_zip::resolve_partial_path(&target, Options::default()).unwrap();

    let mut buf = Vec::new();
    handler.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hi");
}

#[test]
fn partial_path_resolves_a_directory_inside_a_nested_archive() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("a/b.txt", b"hi")]);
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[("lib/inner.jar", &inner_bytes)]);

    let target = outer_path.join("lib/inner.jar/a");
    let handler = vfs_zip::resolve_partial_path(&target, Options::default()).unwrap();
    assert!(!handler.is_leaf().unwrap());
}

#[test]
fn deep_dummy_parent_chain_without_any_directory_entries() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "deep.zip", &[("deep/a/b/c.txt", b"leaf")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    let leaf = root
        .get_child("deep")
        .unwrap()
        .expect("deep/")
        .get_child("a")
        .unwrap()
        .expect("deep/a/")
        .get_child("b")
        .unwrap()
        .expect("deep/a/b/")
        .get_child("c.txt")
        .unwrap()
        .expect("deep/a/b/c.txt");

    assert!(leaf.is_leaf().unwrap());
    let mut buf = Vec::new();
    leaf.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"leaf");
}

#[test]
fn backing_file_error_surfaces_on_first_touch_not_at_mount_time() {
    pretty_env_logger::try_init().ok();
    // mount_file only stats the path; the missing file isn't an error until
    // something actually tries to read it.
    let root = vfs_zip::mount_file("/no/such/archive.zip", Options::default()).unwrap();
    let err = root.get_child("anything").unwrap_err();
    assert!(matches!(err, vfs_zip::Error::BackingIO(_)));
}

#[test]
fn nonexistent_child_returns_none_rather_than_an_error() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("a.txt", b"x")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    assert!(root.get_child("missing.txt").unwrap().is_none());
}

#[test]
fn replace_installs_a_new_handler_visible_on_the_next_lookup() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("a.txt", b"original")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    let original = root.get_child("a.txt").unwrap().expect("a.txt must exist");

    let stand_in_bytes = fixtures::zip_bytes(&[("x.txt", b"stand-in")]);
    let stand_in_path = dir.path().join("stand_in.zip");
    std::fs::write(&stand_in_path, &stand_in_bytes).unwrap();
    let stand_in = vfs_zip::mount_file(&stand_in_path, Options::default()).unwrap();

    original.replace(stand_in).unwrap();

    let replaced = root.get_child("a.txt").unwrap().expect("a.txt still resolves");
    let inner = replaced.get_child("x.txt").unwrap().expect("stand-in content");
    let mut buf = Vec::new();
    inner.open_stream().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"stand-in");
}

#[test]
fn replace_on_a_context_root_fails_for_lack_of_a_parent() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("a.txt", b"x")]);
    let other_path = fixtures::write_zip(dir.path(), "other.zip", &[("b.txt", b"y")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    let other = vfs_zip::mount_file(&other_path, Options::default()).unwrap();

    assert!(root.replace(other).is_err());
}

#[test]
fn case_insensitive_fallback_resolves_mismatched_case_by_default() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("README.txt", b"x")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    let found = root.get_child("readme.txt").unwrap();
    assert!(found.is_some(), "case-insensitive fallback should resolve a mismatched-case lookup");
}

#[test]
fn case_sensitive_option_rejects_mismatched_case() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("README.txt", b"x")]);

    let options = Options::builder().case_sensitive(true).build();
    let root = vfs_zip::mount_file(&path, options).unwrap();
    assert!(root.get_child("readme.txt").unwrap().is_none());
    assert!(root.get_child("README.txt").unwrap().is_some());
}

#[test]
fn get_child_rejects_bad_argument_names() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("a.txt", b"x")]);
    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();

    assert!(matches!(
        root.get_child(""),
        Err(vfs_zip::Error::Invariant(vfs_zip::Invariant::EmptyArgument { .. }))
    ));
    assert!(matches!(
        root.get_child(".."),
        Err(vfs_zip::Error::Invariant(vfs_zip::Invariant::InvalidName { .. }))
    ));
}

#[test]
fn mount_bytes_rejects_an_empty_name() {
    pretty_env_logger::try_init().ok();
    let bytes = fixtures::zip_bytes(&[("a.txt", b"x")]);
    assert!(matches!(
        vfs_zip::mount_bytes("", bytes, Options::default()),
        Err(vfs_zip::Error::Invariant(vfs_zip::Invariant::EmptyArgument { .. }))
    ));
}
