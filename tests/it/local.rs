//! Cleanup and drop semantics for extracted nested archives, in the style of
//! this crate's own local integration tests rather than anything ported from
//! elsewhere.

use vfs_zip::Options;

use crate::fixtures;

#[test]
fn cleanup_on_drop_removes_the_extracted_temp_file() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("x.txt", b"y")]);
    let marker = format!("drop-scenario-{}.jar", std::process::id());
    let entry_name = format!("lib/{marker}");
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[(entry_name.as_str(), &inner_bytes)]);

    let options = Options::builder().use_copy(true).build();
    {
        let root = vfs_zip::mount_file(&outer_path, options).unwrap();
        root.get_child(&entry_name).unwrap().expect("nested mount");
        assert_eq!(fixtures::count_temp_files(&marker), 1);
    }
    assert_eq!(
        fixtures::count_temp_files(&marker),
        0,
        "dropping every handle to the nested mount must delete its extracted file"
    );
}

#[test]
fn cleanup_on_cleanup_removes_the_extracted_temp_file() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("x.txt", b"y")]);
    let marker = format!("explicit-cleanup-{}.jar", std::process::id());
    let entry_name = format!("lib/{marker}");
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[(entry_name.as_str(), &inner_bytes)]);

    let options = Options::builder().use_copy(true).build();
    let root = vfs_zip::mount_file(&outer_path, options).unwrap();
    let nested = root.get_child(&entry_name).unwrap().expect("nested mount");
    assert_eq!(fixtures::count_temp_files(&marker), 1);

    nested.cleanup().unwrap();
    assert_eq!(fixtures::count_temp_files(&marker), 0);
}

#[test]
fn cleanup_called_multiple_times_does_not_error() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = fixtures::zip_bytes(&[("x.txt", b"y")]);
    let marker = format!("multi-cleanup-{}.jar", std::process::id());
    let entry_name = format!("lib/{marker}");
    let outer_path = fixtures::write_zip(dir.path(), "outer.jar", &[(entry_name.as_str(), &inner_bytes)]);

    let options = Options::builder().use_copy(true).build();
    let root = vfs_zip::mount_file(&outer_path, options).unwrap();
    let nested = root.get_child(&entry_name).unwrap().expect("nested mount");

    nested.cleanup().unwrap();
    nested.cleanup().unwrap();
    nested.cleanup().unwrap();
    assert_eq!(fixtures::count_temp_files(&marker), 0);
}

#[test]
fn top_level_cleanup_does_not_delete_the_original_file() {
    pretty_env_logger::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_zip(dir.path(), "plain.zip", &[("a.txt", b"x")]);

    let root = vfs_zip::mount_file(&path, Options::default()).unwrap();
    root.cleanup().unwrap();
    assert!(path.exists(), "a top-level mount never owns the caller's file");
}
