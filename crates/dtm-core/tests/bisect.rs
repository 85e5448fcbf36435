//! Bisection against in-memory history.

mod common;

use std::sync::Arc;

use common::{commit_id, history, FakeBuilder, FakeVcs, MB};
use dtm_core::{
    artifact_tag, BisectReport, Bisector, BuildPolicy, BuildStep, DtmError, DtmResult, Range,
    Thresholds, WorktreeState,
};
use tokio_util::sync::CancellationToken;

/// Sizes in MiB, oldest first; `None` fails to build.
fn fixture(sizes: &[Option<u64>]) -> (Arc<FakeVcs>, Arc<FakeBuilder>) {
    let mut builder = FakeBuilder::new();
    for (n, size) in sizes.iter().enumerate() {
        builder = match size {
            Some(mb) => builder.with_size(&commit_id(n), mb * MB),
            None => builder.failing(&commit_id(n)),
        };
    }
    common::shared(FakeVcs::new(history(sizes.len())), builder)
}

async fn bisect(
    vcs: &Arc<FakeVcs>,
    builder: &Arc<FakeBuilder>,
    size_mb: f64,
    range: Range,
) -> DtmResult<BisectReport> {
    let step = BuildStep::new(
        vcs.clone(),
        builder.clone(),
        "Dockerfile",
        BuildPolicy::default(),
    );
    let thresholds = Thresholds::from_raw(size_mb, 0.0)?;
    Bisector::new(step, thresholds)
        .find_regression(&range, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn finds_first_point_over_size_threshold() {
    let (vcs, builder) = fixture(&[Some(300), Some(320), Some(600), Some(650)]);

    let report = bisect(&vcs, &builder, 500.0, Range::default()).await.unwrap();

    assert_eq!(report.regression.point.id, commit_id(2));
    assert_eq!(report.regression.size, 600 * MB);
    assert!((report.regression.size_mb - 600.0).abs() < 1e-9);
    assert_eq!(report.range_len, 4);
    assert_eq!(report.probes, 2);
    assert_eq!(report.original_state, Some(WorktreeState::Branch("main".into())));
    assert_eq!(vcs.state(), WorktreeState::Branch("main".into()));
}

#[tokio::test]
async fn failed_probe_is_never_the_answer() {
    let (vcs, builder) = fixture(&[Some(300), Some(320), None, Some(600), Some(650)]);

    let report = bisect(&vcs, &builder, 500.0, Range::default()).await.unwrap();

    assert_eq!(report.regression.point.id, commit_id(3));
    assert!(builder.built().contains(&artifact_tag("dtm-analysis", &commit_id(2))));
}

#[tokio::test]
async fn explicit_endpoints_bound_the_range() {
    let (vcs, builder) = fixture(&[Some(900), Some(100), Some(200), Some(700), Some(800)]);

    let range = Range {
        good: Some(commit_id(1)),
        bad: Some(commit_id(3)),
    };
    let report = bisect(&vcs, &builder, 500.0, range).await.unwrap();

    assert_eq!(report.range_len, 3);
    assert_eq!(report.regression.point.id, commit_id(3));
    let c0 = artifact_tag("dtm-analysis", &commit_id(0));
    let c4 = artifact_tag("dtm-analysis", &commit_id(4));
    assert!(!builder.built().contains(&c0));
    assert!(!builder.built().contains(&c4));
}

#[tokio::test]
async fn only_commits_touching_the_build_file_are_probed() {
    let vcs = FakeVcs::new(history(4)).with_touching(&[commit_id(0), commit_id(2), commit_id(3)]);
    let builder = FakeBuilder::new()
        .with_size(&commit_id(0), 100 * MB)
        .with_size(&commit_id(1), 999 * MB)
        .with_size(&commit_id(2), 100 * MB)
        .with_size(&commit_id(3), 900 * MB);
    let (vcs, builder) = common::shared(vcs, builder);

    let report = bisect(&vcs, &builder, 500.0, Range::default()).await.unwrap();

    assert_eq!(report.range_len, 3);
    assert_eq!(report.regression.point.id, commit_id(3));
    assert!(!builder.built().contains(&artifact_tag("dtm-analysis", &commit_id(1))));
}

#[tokio::test]
async fn no_crossing_is_reported_after_restoring() {
    let (vcs, builder) = fixture(&[Some(100), Some(200), Some(300)]);

    let err = bisect(&vcs, &builder, 500.0, Range::default()).await.unwrap_err();

    assert!(matches!(err, DtmError::NoRegression));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(vcs.state(), WorktreeState::Branch("main".into()));
}

#[tokio::test]
async fn good_end_must_be_an_ancestor_of_bad_end() {
    let (vcs, builder) = fixture(&[Some(100), Some(200), Some(300), Some(400), Some(500)]);

    let range = Range {
        good: Some(commit_id(4)),
        bad: Some(commit_id(2)),
    };
    let err = bisect(&vcs, &builder, 250.0, range).await.unwrap_err();

    assert!(matches!(err, DtmError::RangeStartNotFound { .. }));
    assert!(builder.built().is_empty());
    assert!(vcs.checkouts().is_empty());
}

#[tokio::test]
async fn single_point_range_is_too_small() {
    let vcs = FakeVcs::new(history(3)).with_touching(&[commit_id(1)]);
    let (vcs, builder) = common::shared(vcs, FakeBuilder::new());

    let err = bisect(&vcs, &builder, 1.0, Range::default()).await.unwrap_err();

    assert!(matches!(err, DtmError::RangeTooSmall { len: 1 }));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn missing_threshold_is_rejected() {
    let (vcs, builder) = fixture(&[Some(1), Some(2)]);

    let err = bisect(&vcs, &builder, 0.0, Range::default()).await.unwrap_err();

    assert!(matches!(err, DtmError::NoThreshold));
    assert!(vcs.checkouts().is_empty());
}

#[tokio::test]
async fn unknown_endpoint_is_ref_not_found() {
    let (vcs, builder) = fixture(&[Some(1), Some(2)]);

    let range = Range {
        good: Some("v9.9.9".into()),
        bad: None,
    };
    let err = bisect(&vcs, &builder, 1.0, range).await.unwrap_err();

    assert!(matches!(err, DtmError::RefNotFound { ref name } if name == "v9.9.9"));
}
