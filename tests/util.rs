use std::fs;
use std::os::unix::fs::PermissionsExt;

use kptag::consts;
use kptag::util::{self, Password, ScratchDir};
use kptag::KptagError;

#[test]
fn ensure_output_free() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.kdbx");

    assert!(util::ensure_output_free(&output, false).is_ok());

    fs::write(&output, b"").unwrap();
    let err = util::ensure_output_free(&output, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KptagError>(),
        Some(KptagError::OutputExists(path)) if *path == output
    ));
    assert!(util::ensure_output_free(&output, true).is_ok());
}

#[test]
fn scratch_dir_is_private_and_removed() {
    let dir = tempfile::tempdir().unwrap();

    let scratch = ScratchDir::new(dir.path()).unwrap();
    let path = scratch.path().to_path_buf();
    assert_eq!(path.parent().unwrap(), dir.path());
    assert_eq!(
        fs::metadata(&path).unwrap().permissions().mode() & 0o777,
        0o700
    );

    let file = scratch.write("filtered.xml", b"<KeePassFile/>").unwrap();
    assert_eq!(fs::read(&file).unwrap(), b"<KeePassFile/>");
    assert_eq!(
        fs::metadata(&file).unwrap().permissions().mode() & 0o777,
        0o600
    );
    // never clobbers
    assert!(scratch.write("filtered.xml", b"again").is_err());

    drop(scratch);
    assert!(!path.exists());
}

#[test]
fn scratch_dirs_are_unique() {
    let dir = tempfile::tempdir().unwrap();

    let a = ScratchDir::new(dir.path()).unwrap();
    let b = ScratchDir::new(dir.path()).unwrap();
    assert_ne!(a.path(), b.path());
}

#[test]
fn missing_tmpdir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");

    let err = ScratchDir::new(&missing).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KptagError>(),
        Some(KptagError::TempDirMissing(_))
    ));
    assert!(util::write_debug_export(&missing, b"").is_err());
}

#[test]
fn debug_export_overwrites() {
    let dir = tempfile::tempdir().unwrap();

    let first = util::write_debug_export(dir.path(), b"first run").unwrap();
    let second = util::write_debug_export(dir.path(), b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn generate_chars_from_set() {
    let chars = util::generate_chars_from_set(consts::ALNUM, 20);

    assert_eq!(chars.len(), 20);
    assert!(chars.bytes().all(|c| consts::ALNUM.contains(&c)));
}

#[test]
fn password_is_not_printed() {
    let password = Password::new("hunter2");

    assert_eq!(format!("{:?}", password), "Password(..)");
    assert_eq!(password.as_bytes(), b"hunter2");
}
