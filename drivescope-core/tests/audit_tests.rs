// Tests for the discover / walk phases

mod common;

use common::*;
use drivescope_core::audit::{
    AuditOptions, WalkReport, WalkSummary, authorize, discover_drives, walk_files,
};
use drivescope_core::checkpoint::{CheckpointStore, WalkCheckpoint};
use drivescope_core::data::{Database, WalkStatus};
use drivescope_core::error::AuditError;
use drivescope_core::sink::{FILES_SHEET, ResultSink};
use drivescope_core::walker::Budget;
use rusqlite::params;

fn options(budget: Budget) -> AuditOptions {
    AuditOptions {
        allowed_users: vec![format!("admin@{}", COMPANY_DOMAIN)],
        walker: walker_config(),
        budget,
        drive: None,
    }
}

fn two_drives() -> FakeDrive {
    let mut fake = FakeDrive::new("sales", "Sales");
    fake.add_drive("eng", "Engineering");
    fake.grant("sales", domain_permission(COMPANY_DOMAIN, "reader"));
    fake.grant("sales", user_permission("ext@other.com", "reader"));
    fake.add_file("sales", "s1", "pipeline.xlsx", 100);
    fake.add_file("sales", "s2", "targets.xlsx", 200);
    fake.add_folder("eng", "e-docs", "Docs");
    fake.add_file("e-docs", "e1", "design.md", 50);
    fake
}

async fn walked(fake: &FakeDrive, db: &Database, options: &AuditOptions) -> WalkSummary {
    match walk_files(fake, db, options, None).await.unwrap() {
        WalkReport::Walked(summary) => summary,
        WalkReport::AllComplete => panic!("expected a drive to walk"),
    }
}

fn data_rows(db: &Database) -> usize {
    db.read_sheet(FILES_SHEET).unwrap().len() - 1
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_authorize_is_case_insensitive() {
    let fake = FakeDrive::new("d", "D").with_user("Admin@ACME.co.jp");
    let user = authorize(&fake, &["admin@acme.co.jp".to_string()]).await.unwrap();
    assert_eq!(user, "Admin@ACME.co.jp");
}

#[tokio::test]
async fn test_unlisted_user_rejected_before_side_effects() {
    let fake = two_drives().with_user("intruder@other.com");
    let (_temp_dir, db) = create_test_db();

    let result = discover_drives(&fake, &db, &options(Budget::unbounded())).await;
    assert!(matches!(result, Err(AuditError::Unauthorized { ref user }) if user == "intruder@other.com"));
    assert!(!db.has_sheet(FILES_SHEET).unwrap());
    assert!(db.list_drives().unwrap().is_empty());

    let result = walk_files(&fake, &db, &options(Budget::unbounded()), None).await;
    assert!(matches!(result, Err(AuditError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_empty_allow_list_fails_closed() {
    let fake = FakeDrive::new("d", "D");
    assert!(matches!(
        authorize(&fake, &[]).await,
        Err(AuditError::Unauthorized { .. })
    ));
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discovery_registers_drives_with_sharing() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();

    let summary = discover_drives(&fake, &db, &options(Budget::unbounded())).await.unwrap();
    assert_eq!(summary.drives, 2);
    assert_eq!(summary.externally_shared, 1);
    assert_eq!(summary.errors, 0);

    let drives = db.list_drives().unwrap();
    assert_eq!(drives[0].name, "Sales");
    assert_eq!(drives[0].sharing, "internal-domain-share, external-share(1)");
    assert_eq!(drives[0].roles.readers, vec!["@acme.co.jp", "ext@other.com"]);
    assert_eq!(drives[0].roles.editors, None);
    assert_eq!(drives[1].sharing, "none");
    assert!(drives.iter().all(|d| d.status == WalkStatus::Pending));

    assert_eq!(db.read_sheet(FILES_SHEET).unwrap().len(), 1);
}

#[tokio::test]
async fn test_discovery_recovers_from_drive_permission_failure() {
    let mut fake = two_drives();
    fake.fail_permissions("eng");
    let (_temp_dir, db) = create_test_db();

    let summary = discover_drives(&fake, &db, &options(Budget::unbounded())).await.unwrap();
    assert_eq!(summary.drives, 2);
    assert_eq!(summary.errors, 1);

    let eng = db.get_drive("eng").unwrap().unwrap();
    assert!(eng.sharing.starts_with("error: "));
    assert_eq!(db.list_errors().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rediscovery_starts_over() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::items(1));
    discover_drives(&fake, &db, &opts).await.unwrap();
    walked(&fake, &db, &opts).await;
    assert!(db.load().unwrap().is_some());

    discover_drives(&fake, &db, &opts).await.unwrap();

    assert!(db.load().unwrap().is_none());
    assert_eq!(data_rows(&db), 0);
    assert!(db.list_drives().unwrap().iter().all(|d| d.status == WalkStatus::Pending));
}

#[tokio::test]
async fn test_failed_rediscovery_keeps_previous_inventory() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::unbounded());
    discover_drives(&fake, &db, &opts).await.unwrap();
    walked(&fake, &db, &opts).await;
    assert_eq!(data_rows(&db), 2);

    fake.fail_drive_listing(true);
    let result = discover_drives(&fake, &db, &opts).await;
    assert!(matches!(result, Err(AuditError::Api(_))));

    assert!(db.has_sheet(FILES_SHEET).unwrap());
    assert_eq!(data_rows(&db), 2);
    let sales = db.get_drive("sales").unwrap().unwrap();
    assert_eq!(sales.status, WalkStatus::Complete);
    assert_eq!(db.list_drives().unwrap().len(), 2);

    fake.fail_drive_listing(false);
    let mut invocations = 0;
    while let WalkReport::Walked(summary) = walk_files(&fake, &db, &opts, None).await.unwrap() {
        assert_eq!(summary.drive_id, "eng");
        invocations += 1;
        assert!(invocations < 10);
    }

    assert_eq!(invocations, 1);
    assert_eq!(data_rows(&db), 4);
}

#[tokio::test]
async fn test_failed_rediscovery_keeps_live_checkpoint() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::items(1));
    discover_drives(&fake, &db, &opts).await.unwrap();
    walked(&fake, &db, &opts).await;

    fake.fail_drive_listing(true);
    assert!(discover_drives(&fake, &db, &opts).await.is_err());
    assert_eq!(db.live_drive().unwrap().as_deref(), Some("sales"));

    fake.fail_drive_listing(false);
    let resumed = walked(&fake, &db, &opts).await;
    assert_eq!(resumed.drive_id, "sales");
    assert_eq!(resumed.start_row, 3);
    assert_eq!(data_rows(&db), 2);
}

// ============================================================================
// Walking
// ============================================================================

#[tokio::test]
async fn test_walk_requires_discovery() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();

    let result = walk_files(&fake, &db, &options(Budget::unbounded()), None).await;
    assert!(matches!(result, Err(AuditError::Setup(_))));
}

#[tokio::test]
async fn test_walks_every_drive_then_reports_complete() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::unbounded());
    discover_drives(&fake, &db, &opts).await.unwrap();

    let first = walked(&fake, &db, &opts).await;
    assert_eq!(first.drive_id, "sales");
    assert_eq!(first.emitted, 2);
    assert_eq!(first.start_row, 2);
    assert!(!first.has_more);
    assert_eq!(first.status, WalkStatus::Complete);

    let second = walked(&fake, &db, &opts).await;
    assert_eq!(second.drive_id, "eng");
    assert_eq!(second.start_row, 4);
    assert_eq!(second.stats.total_files, 1);
    assert_eq!(second.stats.total_folders, 1);

    let report = walk_files(&fake, &db, &opts, None).await.unwrap();
    assert_eq!(report, WalkReport::AllComplete);

    assert_eq!(data_rows(&db), 4);
    let sales = db.get_drive("sales").unwrap().unwrap();
    assert_eq!(sales.status, WalkStatus::Complete);
    assert_eq!(sales.stats.total_size_bytes, 300);
}

#[tokio::test]
async fn test_sliced_walk_persists_checkpoint_between_invocations() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::items(1));
    discover_drives(&fake, &db, &opts).await.unwrap();

    let first = walked(&fake, &db, &opts).await;
    assert_eq!(first.emitted, 1);
    assert!(first.has_more);
    assert_eq!(first.status, WalkStatus::InProgress);
    assert_eq!(db.live_drive().unwrap().as_deref(), Some("sales"));
    let sales = db.get_drive("sales").unwrap().unwrap();
    assert_eq!(sales.status, WalkStatus::InProgress);
    assert_eq!(sales.stats.total_files, 1);

    let second = walked(&fake, &db, &opts).await;
    assert_eq!(second.drive_id, "sales");
    assert_eq!(second.emitted, 1);
    assert_eq!(second.stats.total_files, 2);
    assert_eq!(second.start_row, 3);

    let mut invocations = 2;
    while let WalkReport::Walked(_) = walk_files(&fake, &db, &opts, None).await.unwrap() {
        invocations += 1;
        assert!(invocations < 50);
    }

    assert_eq!(data_rows(&db), 4);
    assert!(db.load().unwrap().is_none());
    assert!(
        db.list_drives()
            .unwrap()
            .iter()
            .all(|d| d.status == WalkStatus::Complete)
    );
}

#[tokio::test]
async fn test_requesting_other_drive_while_checkpointed_is_busy() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let mut opts = options(Budget::items(1));
    discover_drives(&fake, &db, &opts).await.unwrap();
    walked(&fake, &db, &opts).await;

    opts.drive = Some("eng".to_string());
    let result = walk_files(&fake, &db, &opts, None).await;
    assert!(matches!(
        result,
        Err(AuditError::CheckpointBusy { ref live, ref requested })
            if live == "sales" && requested == "eng"
    ));

    opts.drive = Some("sales".to_string());
    let resumed = walked(&fake, &db, &opts).await;
    assert_eq!(resumed.drive_id, "sales");
}

#[tokio::test]
async fn test_explicit_drive_selected_when_idle() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let mut opts = options(Budget::unbounded());
    discover_drives(&fake, &db, &opts).await.unwrap();

    opts.drive = Some("eng".to_string());
    assert_eq!(walked(&fake, &db, &opts).await.drive_id, "eng");

    opts.drive = Some("nowhere".to_string());
    assert!(matches!(
        walk_files(&fake, &db, &opts, None).await,
        Err(AuditError::Setup(_))
    ));
}

#[tokio::test]
async fn test_corrupt_checkpoint_restarts_drive_without_duplicate_rows() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::items(1));
    discover_drives(&fake, &db, &opts).await.unwrap();
    walked(&fake, &db, &opts).await;
    assert_eq!(data_rows(&db), 1);

    db.get_connection()
        .execute(
            "UPDATE checkpoint SET payload = ?1 WHERE slot = 'current'",
            params!["not json"],
        )
        .unwrap();

    let restarted = walked(&fake, &db, &opts).await;
    assert_eq!(restarted.drive_id, "sales");
    assert_eq!(restarted.emitted, 1);
    assert_eq!(restarted.rows_written, 0);
    assert!(restarted.errors >= 1);
    assert_eq!(data_rows(&db), 1);
    assert!(
        db.list_errors()
            .unwrap()
            .iter()
            .any(|e| e.context == "checkpoint")
    );

    // the restart began from scratch, so the rest of the drive follows
    let next = walked(&fake, &db, &opts).await;
    assert_eq!(next.drive_id, "sales");
    assert_eq!(next.rows_written, 1);
    assert_eq!(data_rows(&db), 2);
}

#[tokio::test]
async fn test_listing_failure_marks_drive_incomplete() {
    let mut fake = two_drives();
    fake.fail_listing("e-docs");
    let (_temp_dir, db) = create_test_db();
    let mut opts = options(Budget::unbounded());
    discover_drives(&fake, &db, &opts).await.unwrap();

    opts.drive = Some("eng".to_string());
    let summary = walked(&fake, &db, &opts).await;

    assert_eq!(summary.status, WalkStatus::Incomplete);
    assert!(!summary.has_more);
    assert_eq!(summary.errors, 1);
    assert_eq!(
        db.get_drive("eng").unwrap().unwrap().status,
        WalkStatus::Incomplete
    );
    assert!(db.load().unwrap().is_none());
}

#[tokio::test]
async fn test_stale_checkpoint_for_unknown_drive_is_setup_error() {
    let fake = two_drives();
    let (_temp_dir, db) = create_test_db();
    let opts = options(Budget::unbounded());
    discover_drives(&fake, &db, &opts).await.unwrap();
    db.save("ghost", &WalkCheckpoint::start("ghost", Vec::new())).unwrap();

    assert!(matches!(
        walk_files(&fake, &db, &opts, None).await,
        Err(AuditError::Setup(_))
    ));
}
