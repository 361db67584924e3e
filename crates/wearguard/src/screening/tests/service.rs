use std::sync::Arc;

use super::common::*;
use crate::screening::domain::SubjectId;
use crate::screening::ruleset::Ruleset;
use crate::screening::service::{ScreeningError, ScreeningService};
use crate::screening::store::RulesetStore;

#[tokio::test]
async fn check_subject_scores_worn_items() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    let report = service
        .check_subject(SubjectId(1))
        .await
        .expect("subject is screened");

    assert_eq!(report.subject_id, SubjectId(1));
    assert_eq!(report.item_count, 3);
    assert_eq!(report.score, 10.0);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].item.name, "Shotgun");
}

#[tokio::test]
async fn check_subject_without_items_fails_with_no_items() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    for subject in [3, 99] {
        let error = service
            .check_subject(SubjectId(subject))
            .await
            .expect_err("no items to screen");
        assert!(matches!(error, ScreeningError::NoItems(id) if id == SubjectId(subject)));
        assert_eq!(error.reason(), "no items");
    }
}

#[tokio::test]
async fn check_subject_reports_missing_ruleset() {
    let service = build_service(wardrobe(), UnavailableRuleset);

    let error = service
        .check_subject(SubjectId(1))
        .await
        .expect_err("ruleset cannot load");

    assert!(matches!(error, ScreeningError::RulesetUnavailable(_)));
    assert_eq!(error.reason(), "ruleset unavailable");
}

#[tokio::test]
async fn check_subject_reports_item_source_outage() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    let error = service
        .check_subject(SubjectId(4))
        .await
        .expect_err("item source is down");

    assert!(matches!(error, ScreeningError::ItemSource { .. }));
    assert_eq!(error.reason(), "item source unavailable");
}

#[tokio::test]
async fn check_subjects_with_no_ids_is_empty_success() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    let report = service.check_subjects(&[]).await.expect("empty batch");

    assert!(report.per_user.is_empty());
    assert_eq!(report.total_score, 0.0);
}

#[tokio::test]
async fn check_subjects_omits_subjects_without_items() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    let report = service
        .check_subjects(&[SubjectId(1), SubjectId(2), SubjectId(3), SubjectId(4), SubjectId(5)])
        .await
        .expect("batch succeeds");

    let scored: Vec<SubjectId> = report.per_user.iter().map(|entry| entry.subject_id).collect();
    assert_eq!(scored, vec![SubjectId(1), SubjectId(2)]);
    assert_eq!(report.per_user[0].score, 10.0);
    assert_eq!(report.per_user[1].score, 5.0);
    assert_eq!(report.total_score, 15.0);
}

#[tokio::test]
async fn check_subjects_requires_a_ruleset() {
    let service = build_service(wardrobe(), UnavailableRuleset);

    let error = service
        .check_subjects(&[SubjectId(1)])
        .await
        .expect_err("ruleset cannot load");

    assert_eq!(error.reason(), "ruleset unavailable");
}

#[tokio::test]
async fn check_subjects_bounds_concurrent_item_lookups() {
    let items = Arc::new(TrackingItems::default());
    let service = ScreeningService::new(
        Arc::clone(&items),
        Arc::new(RulesetStore::new(StaticRuleset(bunny_ruleset()))),
    )
    .with_concurrency(4);
    let ids: Vec<SubjectId> = (1..=500).map(SubjectId).collect();

    let report = service.check_subjects(&ids).await.expect("batch succeeds");

    assert!(items.peak() <= 4, "peak in-flight lookups was {}", items.peak());
    assert!(items.peak() > 1);
    assert_eq!(report.per_user.len(), 500);
    let order: Vec<SubjectId> = report.per_user.iter().map(|entry| entry.subject_id).collect();
    assert_eq!(order, ids);
    assert_eq!(report.total_score, 5000.0);
}

#[tokio::test]
async fn concurrency_limit_never_drops_below_one() {
    let items = Arc::new(TrackingItems::default());
    let service = ScreeningService::new(
        Arc::clone(&items),
        Arc::new(RulesetStore::new(StaticRuleset(bunny_ruleset()))),
    )
    .with_concurrency(0);

    let report = service
        .check_subjects(&[SubjectId(1), SubjectId(2)])
        .await
        .expect("batch succeeds");

    assert_eq!(items.peak(), 1);
    assert_eq!(report.per_user.len(), 2);
}

#[tokio::test]
async fn ruleset_is_fetched_once_across_calls() {
    let source = Arc::new(CountingRuleset::new(bunny_ruleset()));
    let service = build_service(wardrobe(), Arc::clone(&source));

    service.check_subject(SubjectId(1)).await.expect("first call");
    service.check_subject(SubjectId(2)).await.expect("second call");
    service
        .check_subjects(&[SubjectId(1), SubjectId(2)])
        .await
        .expect("batch call");

    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn modify_pattern_appends_to_blacklist() {
    let service = build_service(
        wardrobe().with_subject(7, vec![item(70, "Knife Set")]),
        StaticRuleset(bunny_ruleset()),
    );

    let before = service.check_subject(SubjectId(7)).await.expect("screened");
    assert_eq!(before.score, 0.0);

    let snapshot = service
        .modify_pattern("blacklist", "knife", Some(7.0))
        .await
        .expect("pattern added");
    assert_eq!(snapshot.ruleset.blacklist.len(), 3);

    let after = service.check_subject(SubjectId(7)).await.expect("screened");
    assert_eq!(after.score, 7.0);
    assert_eq!(after.matches[0].matched_text, "Knife");
}

#[tokio::test]
async fn modify_pattern_whitelist_suppresses_later_hits() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    service
        .modify_pattern("whitelist", "shotgun", None)
        .await
        .expect("whitelist entry added");

    let report = service.check_subject(SubjectId(1)).await.expect("screened");
    assert_eq!(report.score, 0.0);
    assert!(report.matches.is_empty());
}

#[tokio::test]
async fn modify_pattern_defaults_points_to_zero() {
    let service = build_service(wardrobe(), StaticRuleset(Ruleset::default()));

    let snapshot = service
        .modify_pattern("blacklist", "hat", None)
        .await
        .expect("pattern added");

    assert_eq!(snapshot.ruleset.blacklist[0].points, 0.0);
}

#[tokio::test]
async fn modify_pattern_rejects_unknown_list_without_mutation() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));
    let before = service.ruleset().await.expect("ruleset loads");

    let error = service
        .modify_pattern("greylist", "knife", Some(7.0))
        .await
        .expect_err("unknown list");

    assert!(matches!(error, ScreeningError::InvalidListKind(_)));
    assert_eq!(error.reason(), "invalid list kind");
    let after = service.ruleset().await.expect("ruleset loads");
    assert_eq!(after.revision, before.revision);
    assert_eq!(after.ruleset, before.ruleset);
}

#[tokio::test]
async fn modify_pattern_rejects_empty_text() {
    let service = build_service(wardrobe(), StaticRuleset(bunny_ruleset()));

    let error = service
        .modify_pattern("whitelist", "", None)
        .await
        .expect_err("empty text");

    assert!(matches!(error, ScreeningError::EmptyPattern));
    assert!(service.rulesets().cached().is_none());
}

#[tokio::test]
async fn modify_pattern_reports_missing_ruleset() {
    let service = build_service(wardrobe(), UnavailableRuleset);

    let error = service
        .modify_pattern("blacklist", "knife", Some(7.0))
        .await
        .expect_err("ruleset cannot load");

    assert_eq!(error.reason(), "ruleset unavailable");
}
