use std::fs;
use std::io::Write;

use symbolicate_report::commands::{resolve_config, OutputTarget, SymbolicateArgs};
use symbolicate_report::{canonicalize_or_current, sha256_file};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let result = canonicalize_or_current(".").expect("canonicalize");
    assert_eq!(result, std::env::current_dir().expect("cwd"));
}

#[test]
fn canonicalize_or_current_keeps_missing_absolute_paths() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");
    let result = canonicalize_or_current(missing.to_str().unwrap()).expect("canonicalize");
    assert_eq!(result, missing);

    let existing = tmp.path().join("report.json");
    fs::write(&existing, "{}").unwrap();
    let result = canonicalize_or_current(existing.to_str().unwrap()).expect("canonicalize");
    assert_eq!(result, existing.canonicalize().unwrap());
}

#[test]
fn sha256_file_hashes_contents() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("bin");
    fs::write(&path, b"abc").unwrap();
    assert_eq!(
        sha256_file(&path).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert!(sha256_file(&tmp.path().join("nope")).is_err());
}

#[test]
fn output_file_appears_only_after_commit() {
    let tmp = tempdir().expect("tempdir");
    let dest = tmp.path().join("result.txt");

    let mut target = OutputTarget::acquire(Some(dest.as_path())).expect("acquire");
    writeln!(target.writer(), "partial").unwrap();
    drop(target);
    assert!(!dest.exists());
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);

    let mut target = OutputTarget::acquire(Some(dest.as_path())).expect("acquire");
    writeln!(target.writer(), "complete").unwrap();
    target.commit().expect("commit");
    assert_eq!(fs::read_to_string(&dest).unwrap(), "complete\n");
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[test]
fn command_line_overrides_config_file() {
    let tmp = tempdir().expect("tempdir");
    let config_path = tmp.path().join("symbolicate.yml");
    fs::write(&config_path, "app_name: FromFile\nsearch_roots: [/from/file]\n").unwrap();

    let args = SymbolicateArgs {
        report: "report.json".into(),
        config: Some(config_path.to_string_lossy().to_string()),
        search_roots: vec!["/from/cli".into()],
        ..SymbolicateArgs::default()
    };
    let config = resolve_config(&args).expect("config");
    assert_eq!(config.app_name, "FromFile");
    assert_eq!(config.search_roots, vec![std::path::PathBuf::from("/from/cli")]);

    let args = SymbolicateArgs { app_name: Some("FromCli".into()), ..args };
    assert_eq!(resolve_config(&args).unwrap().app_name, "FromCli");

    let args = SymbolicateArgs { config: Some("/no/such/config.yaml".into()), ..args };
    assert!(resolve_config(&args).is_err());
}

#[cfg(unix)]
#[test]
fn committed_output_file_gets_default_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().expect("tempdir");
    let reference = tmp.path().join("reference.txt");
    fs::File::create(&reference).unwrap();
    let dest = tmp.path().join("result.txt");

    let mut target = OutputTarget::acquire(Some(dest.as_path())).expect("acquire");
    writeln!(target.writer(), "complete").unwrap();
    target.commit().expect("commit");

    let mode = |p: &std::path::Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(&dest), mode(&reference));
}
