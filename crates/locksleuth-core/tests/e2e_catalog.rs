/// End-to-end catalog tests against the scripted backend.
///
/// These drive `FileHandleCatalog` through full discovery passes and close
/// requests over a `FakeBackend`, so every filtering, skipping and
/// path-resolution branch runs on any host. Hanging name queries use real
/// threads, which makes the timing assertions meaningful.
use locksleuth_core::backend::fake::{FakeBackend, FakeObject};
use locksleuth_core::backend::SkipReason;
use locksleuth_core::nt::NtStatus;
use locksleuth_core::{CatalogOptions, FileHandleCatalog, FileObjectKind, HandleError, HandleRef};
use std::time::{Duration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────────────

const FILE: u16 = 37;
const DIRECTORY: u16 = 3;
const EVENT: u16 = 16;

fn named(path: &str) -> FakeObject {
    FakeObject::Named(path.to_owned())
}

/// Two mounted volumes and a mix of handles:
///
/// ```text
/// pid 100  0x40  File       C:\Users\test\locked.txt
/// pid 100  0x44  Event      (never reported)
/// pid 200  0x10  Directory  C:\Users\test
/// pid 200  0x14  File       D:\data\db.sqlite
/// pid 300  0x08  File       \Device\NamedPipe\foo (unmapped)
/// ```
fn system() -> FakeBackend {
    FakeBackend::new()
        .with_standard_types()
        .with_device(r"\Device\HarddiskVolume1", "C:")
        .with_device(r"\Device\HarddiskVolume4", "D:")
        .with_handle(
            100,
            0x40,
            FILE,
            named(r"\Device\HarddiskVolume1\Users\test\locked.txt"),
        )
        .with_handle(100, 0x44, EVENT, named(r"\BaseNamedObjects\evt"))
        .with_handle(200, 0x10, DIRECTORY, named(r"\Device\HarddiskVolume1\Users\test"))
        .with_handle(200, 0x14, FILE, named(r"\Device\HarddiskVolume4\data\db.sqlite"))
        .with_handle(300, 0x08, FILE, named(r"\Device\NamedPipe\foo"))
}

fn fast(backend: FakeBackend) -> FileHandleCatalog<FakeBackend> {
    FileHandleCatalog::with_options(
        backend,
        CatalogOptions {
            name_query_timeout: Duration::from_millis(50),
        },
    )
}

fn paths(catalog: &mut FileHandleCatalog<FakeBackend>, filter: Option<&str>) -> Vec<String> {
    catalog
        .get_open_handles(filter)
        .unwrap()
        .into_iter()
        .map(|h| h.dos_path)
        .collect()
}

// ── Discovery ────────────────────────────────────────────────────────────────

#[test]
fn test_locked_file_is_found() {
    let mut catalog = fast(system());
    let found = catalog
        .get_open_handles(Some(r"C:\Users\test\locked.txt"))
        .unwrap();

    assert_eq!(found.len(), 1);
    let info = &found[0];
    assert_eq!(info.process_id, 100);
    assert_eq!(info.handle_value, 0x40);
    assert_eq!(info.dos_path, r"C:\Users\test\locked.txt");
    assert_eq!(info.nt_path, r"\Device\HarddiskVolume1\Users\test\locked.txt");
    assert_eq!(info.object_type_name, FileObjectKind::File);
}

#[test]
fn test_no_filter_reports_every_mapped_file_handle() {
    let mut catalog = fast(system());
    assert_eq!(
        paths(&mut catalog, None),
        vec![
            r"C:\Users\test\locked.txt".to_owned(),
            r"C:\Users\test".to_owned(),
            r"D:\data\db.sqlite".to_owned(),
        ]
    );
}

#[test]
fn test_empty_filter_matches_everything() {
    let mut catalog = fast(system());
    assert_eq!(paths(&mut catalog, Some("")).len(), 3);
}

#[test]
fn test_filter_ignores_case_and_separator_style() {
    let mut catalog = fast(system());
    let expected = vec![r"C:\Users\test\locked.txt".to_owned(), r"C:\Users\test".to_owned()];
    assert_eq!(paths(&mut catalog, Some(r"C:\Users\test")), expected);
    assert_eq!(paths(&mut catalog, Some(r"c:\USERS\TEST")), expected);
    assert_eq!(paths(&mut catalog, Some("c:/users/test")), expected);
}

#[test]
fn test_every_result_matches_its_filter() {
    let mut catalog = fast(system());
    for filter in [r"C:\", r"d:\DATA", r"C:\Users\test\locked", r"E:\"] {
        for info in catalog.get_open_handles(Some(filter)).unwrap() {
            assert!(
                info.dos_path
                    .to_lowercase()
                    .starts_with(&filter.to_lowercase()),
                "{} does not start with {filter}",
                info.dos_path
            );
        }
    }
}

#[test]
fn test_only_file_and_directory_types_are_queried() {
    let mut catalog = fast(
        system()
            .with_type(51, "Mutant")
            .with_handle(400, 0x20, 51, named(r"\Device\HarddiskVolume1\fake"))
            .with_handle(400, 0x24, 99, named(r"\Device\HarddiskVolume1\unknown")),
    );

    let found = catalog.get_open_handles(None).unwrap();
    assert!(found.iter().all(|h| h.process_id != 400));
    assert!(found
        .iter()
        .all(|h| matches!(h.object_type_name, FileObjectKind::File | FileObjectKind::Directory)));
    // Event, Mutant and the unknown index never reach the name query.
    assert_eq!(catalog.backend().name_queries(), 4);
}

#[test]
fn test_unmapped_device_is_dropped() {
    let mut catalog = fast(system());
    let found = catalog.get_open_handles(None).unwrap();
    assert!(found.iter().all(|h| h.process_id != 300));
    assert!(found.iter().all(|h| !h.nt_path.contains("NamedPipe")));
}

#[test]
fn test_similar_volume_numbers_are_not_confused() {
    let mut catalog = fast(
        system().with_handle(500, 0x30, FILE, named(r"\Device\HarddiskVolume10\x.txt")),
    );
    let found = catalog.get_open_handles(None).unwrap();
    assert!(found.iter().all(|h| h.process_id != 500));
}

#[test]
fn test_skipped_entries_are_silently_absent() {
    let mut catalog = fast(
        system()
            .with_handle(
                600,
                0x04,
                FILE,
                FakeObject::Unduplicable(SkipReason::ProcessUnavailable),
            )
            .with_handle(601, 0x04, FILE, FakeObject::Unduplicable(SkipReason::NotSupported))
            .with_handle(602, 0x04, FILE, FakeObject::Status(NtStatus::ACCESS_DENIED))
            .with_handle(603, 0x04, FILE, FakeObject::Status(NtStatus::NOT_SUPPORTED))
            .with_handle(604, 0x04, FILE, FakeObject::Status(NtStatus::OBJECT_PATH_INVALID))
            .with_handle(605, 0x04, FILE, FakeObject::Status(NtStatus::PENDING))
            .with_handle(606, 0x04, FILE, named(""))
            .with_handle(607, 0x04, FILE, FakeObject::Unduplicable(SkipReason::AccessDenied)),
    );

    let found = catalog.get_open_handles(None).unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|h| h.process_id < 600));
}

#[test]
fn test_access_denied_duplication_is_not_an_error() {
    let mut catalog = fast(
        FakeBackend::new()
            .with_standard_types()
            .with_device(r"\Device\HarddiskVolume1", "C:")
            .with_handle(1, 0x04, FILE, FakeObject::Unduplicable(SkipReason::AccessDenied))
            .with_handle(2, 0x08, FILE, named(r"\Device\HarddiskVolume1\open.txt")),
    );
    assert_eq!(paths(&mut catalog, None), vec![r"C:\open.txt".to_owned()]);
    assert_eq!(catalog.backend().name_queries(), 1);
}

#[test]
fn test_unknown_query_status_is_fatal() {
    let mut catalog = fast(system().with_handle(
        700,
        0x04,
        FILE,
        FakeObject::Status(NtStatus::INFO_LENGTH_MISMATCH),
    ));
    let err = catalog.get_open_handles(None).unwrap_err();
    assert!(matches!(
        err,
        HandleError::NameQuery { status } if status == NtStatus::INFO_LENGTH_MISMATCH
    ));
}

#[test]
fn test_snapshot_failure_is_fatal() {
    let mut catalog = fast(system().with_snapshot_failure(NtStatus::ACCESS_DENIED));
    let err = catalog.get_open_handles(None).unwrap_err();
    assert!(matches!(err, HandleError::Snapshot { .. }));
    assert_eq!(catalog.backend().name_queries(), 0);
}

#[test]
fn test_one_duplicate_alive_at_a_time() {
    let mut catalog = fast(system());
    catalog.get_open_handles(None).unwrap();
    assert_eq!(catalog.backend().peak_duplicates(), 1);
    assert_eq!(catalog.backend().open_duplicates(), 0);
}

#[test]
fn test_repeated_passes_are_identical() {
    let mut catalog = fast(system());
    let first = catalog.get_open_handles(Some(r"C:\")).unwrap();
    let second = catalog.get_open_handles(Some(r"C:\")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_serialises_kind_as_type_name() {
    let mut catalog = fast(system());
    let found = catalog.get_open_handles(Some(r"C:\Users\test\locked.txt")).unwrap();
    let json = serde_json::to_value(&found).unwrap();
    assert_eq!(json[0]["object_type_name"], "File");
    assert_eq!(json[0]["dos_path"], r"C:\Users\test\locked.txt");
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

#[test]
fn test_hanging_queries_are_bounded_and_dropped() {
    let timeout = Duration::from_millis(50);
    let mut catalog = fast(
        system()
            .with_handle(800, 0x04, FILE, FakeObject::Hangs)
            .with_handle(801, 0x04, FILE, FakeObject::Hangs)
            .with_handle(802, 0x04, FILE, FakeObject::Hangs),
    );

    let start = Instant::now();
    let found = catalog.get_open_handles(None).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|h| h.process_id < 800));
    assert_eq!(catalog.backend().abandoned_queries(), 3);
    // Only the three hanging entries wait out the timeout.
    assert!(
        elapsed < 3 * timeout + Duration::from_millis(500),
        "pass took {elapsed:?}"
    );
}

#[test]
fn test_entries_after_a_hang_are_still_processed() {
    let mut catalog = fast(
        FakeBackend::new()
            .with_standard_types()
            .with_device(r"\Device\HarddiskVolume1", "C:")
            .with_handle(1, 0x04, FILE, FakeObject::Hangs)
            .with_handle(2, 0x08, FILE, named(r"\Device\HarddiskVolume1\after.txt")),
    );
    assert_eq!(paths(&mut catalog, None), vec![r"C:\after.txt".to_owned()]);
}

// ── Closing ──────────────────────────────────────────────────────────────────

#[test]
fn test_close_found_handles() {
    let mut catalog = fast(system());
    let found = catalog.get_open_handles(Some(r"C:\Users\test")).unwrap();
    let targets: Vec<HandleRef> = found.iter().map(HandleRef::from).collect();

    catalog.close_handles(&targets);
    assert_eq!(catalog.backend().closed_handles(), targets);
    assert!(catalog
        .get_open_handles(Some(r"C:\Users\test"))
        .unwrap()
        .is_empty());
    assert_eq!(paths(&mut catalog, None), vec![r"D:\data\db.sqlite".to_owned()]);
}

#[test]
fn test_close_failure_does_not_stop_the_rest() {
    let catalog = fast(system());
    let already_gone = HandleRef {
        process_id: 100,
        handle_value: 0x40,
    };
    catalog.close_handles(&[already_gone]);

    let unknown = HandleRef {
        process_id: 9999,
        handle_value: 0x4,
    };
    let survivor = HandleRef {
        process_id: 200,
        handle_value: 0x14,
    };
    catalog.close_handles(&[already_gone, unknown, survivor]);

    assert_eq!(catalog.backend().closed_handles(), vec![already_gone, survivor]);
}

#[test]
fn test_close_nothing_is_a_no_op() {
    let catalog = fast(system());
    catalog.close_handles(&[]);
    assert!(catalog.backend().closed_handles().is_empty());
}
