use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use symbolicate_core::locate::{
    declared_identity, locate, resolve_bundle_binary, IdentitySource, LocateError, MatchKind,
};
use symbolicate_core::model::{BinaryImage, Report};
use symbolicate_core::tools::{
    BinaryIdentity, Candidate, CandidateSource, IdentityExtractor, ToolError,
};
use symbolicate_core::SymbolicateConfig;

/// Reports a UUID per candidate path.
struct PerPathExtractor {
    uuids: Vec<(PathBuf, &'static str)>,
    calls: Cell<usize>,
}

impl IdentityExtractor for PerPathExtractor {
    fn identify(&self, binary: &Path, _arch: &str) -> Result<Option<BinaryIdentity>, ToolError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self
            .uuids
            .iter()
            .find(|(p, _)| p == binary)
            .map(|(_, u)| BinaryIdentity { uuid: u.to_string(), arch: None }))
    }
}

struct ListedCandidates(Vec<PathBuf>);

impl CandidateSource for ListedCandidates {
    fn candidates(&self) -> Vec<Candidate> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, p)| Candidate {
                path: p.clone(),
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1000 - i as u64),
            })
            .collect()
    }
}

fn image(name: &str, addr: u64, uuid: &str) -> BinaryImage {
    BinaryImage { name: name.into(), image_addr: addr, image_size: 0x1000, uuid: uuid.into() }
}

fn report_with(images: Vec<BinaryImage>) -> Report {
    Report { binary_images: images, ..Report::default() }
}

#[test]
fn declared_identity_prefers_named_image_and_uppercases_uuid() {
    let config = SymbolicateConfig::default();
    let images = vec![
        image("/usr/lib/dyld", 0x1000, "1111"),
        image("/var/Bundle/MatrixTestApp.app/MatrixTestApp", 0x4000, "abcd-1234"),
    ];
    let declared = declared_identity(&images, &config).expect("identity");
    assert_eq!(declared.source, IdentitySource::NamedImage);
    assert_eq!(declared.load_addr, 0x4000);
    assert_eq!(declared.uuid.as_deref(), Some("ABCD-1234"));

    let bundle = vec![image("/var/Bundle/MatrixTestApp.app", 0x8000, "")];
    let declared = declared_identity(&bundle, &config).expect("identity");
    assert_eq!(declared.source, IdentitySource::NamedImage);
    assert_eq!(declared.uuid, None);
}

#[test]
fn declared_identity_falls_back_to_lowest_address() {
    let config = SymbolicateConfig::default();
    let images = vec![image("/usr/lib/libobjc.A.dylib", 0x9000, "aa"), image("Other", 0x2000, "bb")];
    let declared = declared_identity(&images, &config).expect("identity");
    assert_eq!(declared.source, IdentitySource::LowestAddress);
    assert_eq!(declared.path, "Other");
    assert!(declared_identity(&[], &config).is_none());
}

#[test]
fn existing_report_path_is_used_without_searching() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = temp.path().join("MatrixTestApp.app");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("MatrixTestApp"), b"macho").unwrap();

    let config = SymbolicateConfig::default();
    let report = report_with(vec![image(bundle.to_str().unwrap(), 0x4000, "ABCD")]);
    let extractor = PerPathExtractor { uuids: vec![], calls: Cell::new(0) };
    let located =
        locate(&report, &config, &ListedCandidates(vec![]), &extractor).expect("located");

    assert_eq!(located.match_kind, MatchKind::ReportPath);
    assert_eq!(located.path, bundle.join("MatrixTestApp"));
    assert_eq!(extractor.calls.get(), 0);
}

#[test]
fn first_candidate_with_matching_uuid_wins() {
    let config = SymbolicateConfig::default();
    let report = report_with(vec![image("/gone/MatrixTestApp", 0x4000, "abcd-1234")]);
    let newest = PathBuf::from("/builds/a/MatrixTestApp");
    let older = PathBuf::from("/builds/b/MatrixTestApp");
    let extractor = PerPathExtractor {
        uuids: vec![(newest.clone(), "9999-0000"), (older.clone(), "ABCD-1234")],
        calls: Cell::new(0),
    };

    let located =
        locate(&report, &config, &ListedCandidates(vec![newest, older.clone()]), &extractor)
            .expect("located");
    assert_eq!(located.match_kind, MatchKind::UuidMatch);
    assert_eq!(located.path, older);
    assert_eq!(extractor.calls.get(), 2);
}

#[test]
fn no_candidates_is_an_error() {
    let config = SymbolicateConfig { search_roots: vec![], ..SymbolicateConfig::default() };
    let report = report_with(vec![image("/gone/MatrixTestApp", 0x4000, "ABCD")]);
    let extractor = PerPathExtractor { uuids: vec![], calls: Cell::new(0) };
    let err = locate(&report, &config, &ListedCandidates(vec![]), &extractor).unwrap_err();
    assert!(matches!(err, LocateError::NoBinaryFound { searched: 0, .. }));
    assert!(err.to_string().contains("/gone/MatrixTestApp"));
}

#[test]
fn empty_image_list_is_an_error() {
    let config = SymbolicateConfig::default();
    let extractor = PerPathExtractor { uuids: vec![], calls: Cell::new(0) };
    let err =
        locate(&Report::default(), &config, &ListedCandidates(vec![]), &extractor).unwrap_err();
    assert!(matches!(err, LocateError::NoBinaryImages));
}

#[test]
fn lowest_address_fallback_raises_an_advisory() {
    let config = SymbolicateConfig::default();
    let report = report_with(vec![image("/gone/SomethingElse", 0x4000, "")]);
    let extractor = PerPathExtractor { uuids: vec![], calls: Cell::new(0) };
    let located = locate(
        &report,
        &config,
        &ListedCandidates(vec![PathBuf::from("/builds/MatrixTestApp")]),
        &extractor,
    )
    .expect("located");
    assert!(located.advisories.iter().any(|a| a.contains("lowest-addressed")));
    assert!(located.match_kind.is_degraded());
}

#[test]
fn bundles_resolve_to_their_executable() {
    let temp = tempfile::tempdir().unwrap();
    let app = temp.path().join("Demo.app");
    assert_eq!(resolve_bundle_binary(&app), app.join("Demo"));

    let dsym = temp.path().join("Demo.app.dSYM");
    let dwarf = dsym.join("Contents/Resources/DWARF");
    fs::create_dir_all(&dwarf).unwrap();
    fs::write(dwarf.join("Demo"), b"dwarf").unwrap();
    assert_eq!(resolve_bundle_binary(&dsym), dwarf.join("Demo"));

    let plain = temp.path().join("Demo");
    assert_eq!(resolve_bundle_binary(&plain), plain);
}

#[test]
fn searched_count_covers_every_root_and_pattern() {
    let config = SymbolicateConfig {
        search_roots: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        product_patterns: vec!["x".into(), "y".into(), "z".into()],
        ..SymbolicateConfig::default()
    };
    let report = report_with(vec![image("/gone/MatrixTestApp", 0x4000, "ABCD")]);
    let extractor = PerPathExtractor { uuids: vec![], calls: Cell::new(0) };
    let err = locate(&report, &config, &ListedCandidates(vec![]), &extractor).unwrap_err();
    assert!(matches!(err, LocateError::NoBinaryFound { searched: 6, .. }));
}
