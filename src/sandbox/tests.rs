use super::*;
use crate::test_support::build_zip;

#[test]
fn test_sandbox_builder_new() {
    let builder = SandboxBuilder::new();
    assert_eq!(builder.arena.len(), 0);
    assert_eq!(builder.entries.len(), 0);
}

#[test]
fn test_add_files_share_one_arena() {
    let mut builder = SandboxBuilder::new();
    builder.add_file("a.txt", b"AAA", 3).unwrap();
    builder.add_file("b.txt", b"BBB", 3).unwrap();
    let sandbox = builder.build();

    assert_eq!(sandbox.get("a.txt").unwrap(), b"AAA");
    assert_eq!(sandbox.get("b.txt").unwrap(), b"BBB");
    assert_eq!(sandbox.total_size(), 6);
    assert_eq!(sandbox.get_entry("b.txt").unwrap().offset, 3);
}

#[test]
fn test_repeated_name_replaces_entry() {
    let mut builder = SandboxBuilder::new();
    builder.add_file("a.txt", b"old", 3).unwrap();
    builder.add_file("a.txt", b"newer", 5).unwrap();
    let sandbox = builder.build();

    assert_eq!(sandbox.file_count(), 1);
    assert_eq!(sandbox.get("a.txt").unwrap(), b"newer");
    assert_eq!(sandbox.total_size(), 5);
    assert_eq!(sandbox.member_count(), 1);
    assert_eq!(sandbox.uncompressed_size(), 5);
}

#[test]
fn test_file_size_limit() {
    let mut builder = SandboxBuilder::new().max_file_size(10);
    assert!(builder.add_file("small.txt", b"tiny", 4).is_ok());

    let err = builder
        .add_file("large.txt", b"this is way too large", 21)
        .unwrap_err();
    assert!(err.to_string().contains("File too large"));
}

#[test]
fn test_total_size_limit() {
    let mut builder = SandboxBuilder::new().max_file_size(100).max_total_size(12);
    builder.add_file("one.txt", b"12345", 5).unwrap();
    builder.add_file("two.txt", b"67890", 5).unwrap();

    let err = builder.add_file("three.txt", b"overflow", 8).unwrap_err();
    assert!(matches!(err, SandboxError::FileTooLarge { size: 18, max: 12 }));
}

#[test]
fn test_ingest_zip_skips_directories_and_forks() {
    let bytes = build_zip(&[
        ("course/", b""),
        ("course/readme.md", b"# Readme"),
        ("__MACOSX/course/._readme.md", b"junk"),
        ("course/._notes.txt", b"junk"),
    ]);

    let sandbox = SandboxBuilder::new().ingest_zip(&bytes).unwrap().build();
    let paths: Vec<_> = sandbox.list().map(|e| e.virtual_path.as_str()).collect();

    assert_eq!(paths, vec!["course/readme.md"]);
    assert_eq!(sandbox.skipped().len(), 2);
    assert_eq!(
        sandbox.skipped()[0],
        "Skipped '__MACOSX/course/._readme.md': macOS resource fork"
    );
    assert!(sandbox.skipped()[1].contains("course/._notes.txt"));
}

#[test]
fn test_ingest_zip_notes_unsafe_members() {
    let bytes = build_zip(&[("ok.txt", b"fine"), ("../evil.txt", b"nope")]);

    let sandbox = SandboxBuilder::new().ingest_zip(&bytes).unwrap().build();

    assert_eq!(sandbox.file_count(), 1);
    assert_eq!(sandbox.skipped().len(), 1);
    assert!(sandbox.skipped()[0].contains("../evil.txt"));
}

#[test]
fn test_ingest_zip_entry_limit() {
    let bytes = build_zip(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")]);

    let result = SandboxBuilder::new().max_entries(2).ingest_zip(&bytes);
    assert!(matches!(
        result,
        Err(SandboxError::TooManyEntries { count: 3, max: 2 })
    ));
}

#[test]
fn test_ingest_zip_notes_oversized_members() {
    let bytes = build_zip(&[("big.txt", &[b'x'; 64]), ("small.txt", b"ok")]);

    let sandbox = SandboxBuilder::new()
        .max_file_size(16)
        .ingest_zip(&bytes)
        .unwrap()
        .build();

    assert!(sandbox.get("big.txt").is_none());
    assert_eq!(sandbox.get("small.txt").unwrap(), b"ok");
    assert_eq!(sandbox.member_count(), 2);
    assert_eq!(sandbox.skipped().len(), 1);
    assert!(sandbox.skipped()[0].contains("big.txt"));
    assert!(sandbox.skipped()[0].contains("File too large"));
}

#[test]
fn test_ingest_zip_with_lists_everything_loads_selected() {
    let bytes = build_zip(&[
        ("lesson.md", b"# Lesson"),
        ("video.mp4", &[0u8; 256]),
        ("notes.txt", b"notes"),
    ]);

    let sandbox = SandboxBuilder::new()
        .ingest_zip_with(&bytes, |member| member.extension() != "mp4")
        .unwrap()
        .build();

    let listed: Vec<_> = sandbox.members().map(|m| m.virtual_path.as_str()).collect();
    assert_eq!(listed, vec!["lesson.md", "video.mp4", "notes.txt"]);
    assert_eq!(sandbox.file_count(), 2);
    assert!(sandbox.get("video.mp4").is_none());
    assert_eq!(sandbox.uncompressed_size(), 8 + 256 + 5);
    assert_eq!(sandbox.total_size(), 8 + 5);
    assert!(sandbox.skipped().is_empty());
}

#[test]
fn test_unselected_members_ignore_the_size_limit() {
    let bytes = build_zip(&[("huge.bin", &[0u8; 4096]), ("a.txt", b"a")]);

    let sandbox = SandboxBuilder::new()
        .max_file_size(16)
        .ingest_zip_with(&bytes, |member| member.virtual_path == "a.txt")
        .unwrap()
        .build();

    assert!(sandbox.skipped().is_empty());
    assert_eq!(sandbox.members().next().unwrap().size, 4096);
    assert_eq!(sandbox.file_count(), 1);
}

#[test]
fn test_ingest_rejects_non_zip() {
    let result = SandboxBuilder::new().ingest_zip(b"not an archive");
    assert!(matches!(result, Err(SandboxError::ZipParseFailed(_))));
}

#[test]
fn test_member_depth_and_extension() {
    let bytes = build_zip(&[
        ("top.txt", b"1"),
        ("lessons/one.md", b"2"),
        ("lessons/deep/Two.MD", b"3"),
    ]);
    let sandbox = SandboxBuilder::new().ingest_zip(&bytes).unwrap().build();

    let members: Vec<_> = sandbox.members().collect();
    assert_eq!(members[0].depth(), 0);
    assert_eq!(members[2].depth(), 2);
    assert_eq!(members[0].extension(), "txt");
    assert_eq!(members[2].extension(), "md");
}

#[test]
fn test_member_names_and_forks() {
    let bytes = build_zip(&[("a/imsmanifest.xml", b"<manifest/>")]);
    assert_eq!(member_names(&bytes).unwrap(), vec!["a/imsmanifest.xml"]);
    assert!(member_names(b"plain text").is_none());

    assert!(is_resource_fork("__MACOSX/a/imsmanifest.xml"));
    assert!(is_resource_fork("pkg/._imsmanifest.xml"));
    assert!(!is_resource_fork("pkg/imsmanifest.xml"));
}
