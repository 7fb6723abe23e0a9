use std::path::PathBuf;

use symbolicate_core::classify::Classification;
use symbolicate_core::locate::{
    DeclaredIdentity, FallbackReason, IdentitySource, LocatedBinary, MatchKind,
};
use symbolicate_core::model::ThreadIndex;
use symbolicate_core::render::{render_text, APP_CODE_HEADER};
use symbolicate_core::resolve::{SymbolLanguage, Unresolved};
use symbolicate_core::walker::{
    AppCodeLocation, FrameReport, FrameStatus, ResolvedFrame, SymbolicationReport, ThreadReport,
    ThreadRole, WalkStats,
};

fn binary(match_kind: MatchKind) -> LocatedBinary {
    LocatedBinary {
        path: PathBuf::from("/builds/MatrixTestApp.app/MatrixTestApp"),
        load_addr: 0x1_0000_0000,
        declared: DeclaredIdentity {
            path: "/var/MatrixTestApp.app/MatrixTestApp".into(),
            load_addr: 0x1_0000_0000,
            uuid: Some("ABCD-1234".into()),
            source: IdentitySource::NamedImage,
        },
        match_kind,
        advisories: vec![],
    }
}

fn resolved_frame() -> FrameReport {
    FrameReport {
        index: 1,
        address: 0x1_0000_1000,
        object_name: "MatrixTestApp".into(),
        display_name: "MatrixTestApp".into(),
        device_symbol: None,
        library: None,
        status: FrameStatus::Resolved,
        resolved: Some(ResolvedFrame {
            display_name: "MatrixTestApp".into(),
            symbolicated_text: "-[Foo bar] (in MatrixTestApp) (Foo.mm:42)".into(),
            source_file: Some("Foo.mm".into()),
            line_number: Some(42),
            classification: Classification::AppCode,
            language: SymbolLanguage::ObjectiveC,
        }),
        classification: Classification::AppCode,
        app_resolution_failed: false,
    }
}

fn thread(frames: Vec<FrameReport>) -> ThreadReport {
    let symbolicated_count = frames.iter().filter(|f| f.status == FrameStatus::Resolved).count();
    ThreadReport {
        label: "Main thread".into(),
        role: ThreadRole::Main,
        index: ThreadIndex::Number(0),
        name: Some("com.apple.main-thread".into()),
        crashed: false,
        app_frame_count: 1,
        opportunistic: false,
        symbolicated_count,
        frames,
    }
}

fn render(report: &SymbolicationReport) -> String {
    let mut out = Vec::new();
    render_text(report, &mut out).expect("render");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn app_code_section_is_stable() {
    let report = SymbolicationReport {
        app_name: "MatrixTestApp".into(),
        arch: "arm64".into(),
        binary: binary(MatchKind::UuidMatch),
        advisories: vec![],
        threads: vec![thread(vec![resolved_frame()])],
        app_code_locations: vec![
            AppCodeLocation {
                thread: "Main thread".into(),
                file: Some("Foo.mm".into()),
                line: Some(42),
                symbol: "-[Foo bar] (in MatrixTestApp) (Foo.mm:42)".into(),
            },
            AppCodeLocation {
                thread: "App thread 4".into(),
                file: None,
                line: None,
                symbol: "main (in MatrixTestApp) + 52".into(),
            },
        ],
        stats: WalkStats { threads: 1, total_frames: 1, attempted: 1, resolved: 1, ..WalkStats::default() },
    };

    let text = render(&report);
    assert!(text.contains("Match:        UUID match"));
    assert!(text.contains("=>  1  MatrixTestApp"));
    assert!(text.contains("      -[Foo bar] (in MatrixTestApp) (Foo.mm:42)"));
    assert!(text.contains("(100.0%)"));

    let section = text.split(APP_CODE_HEADER).nth(1).expect("app code section");
    assert_eq!(
        section,
        "\n[Main thread] Foo.mm:42\n    -[Foo bar] (in MatrixTestApp) (Foo.mm:42)\n\n\
         [App thread 4]\n    main (in MatrixTestApp) + 52\n\n"
    );
}

#[test]
fn degraded_runs_show_advisories_and_hints() {
    let failed = FrameReport {
        status: FrameStatus::Failed(Unresolved::EchoedAddress),
        resolved: None,
        classification: Classification::SystemLibrary,
        app_resolution_failed: true,
        ..resolved_frame()
    };
    let report = SymbolicationReport {
        app_name: "MatrixTestApp".into(),
        arch: "arm64".into(),
        binary: binary(MatchKind::LatestFallback(FallbackReason::NoUuidMatch)),
        advisories: vec!["No candidate matched UUID ABCD-1234".into()],
        threads: vec![thread(vec![failed]), thread(vec![])],
        app_code_locations: vec![],
        stats: WalkStats { threads: 2, total_frames: 1, attempted: 1, failed: 1, ..WalkStats::default() },
    };

    let text = render(&report);
    assert!(text.contains("may not match report"));
    assert!(text.contains("  ! No candidate matched UUID ABCD-1234"));
    assert!(text.contains("[resolution failed]"));
    assert!(text.contains("(no backtrace for this thread)"));
    assert!(text.contains("No application addresses were resolved"));
    assert!(text.ends_with("APP CODE LOCATIONS\n(none)\n"));
}
