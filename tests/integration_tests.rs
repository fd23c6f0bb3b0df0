// Integration tests for Venture Match

mod common;

use actix_web::{test as actix_test, web, App};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use venture_match::core::{ArtifactError, EncoderError, MatchError, Matcher};
use venture_match::models::{InvestorCandidate, PredictResponse, RankResponse};
use venture_match::routes::{self, predict::AppState};
use venture_match::services::{ArtifactStore, BundleManifest};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

fn has_two_decimals(value: f64) -> bool {
    ((value * 100.0).round() / 100.0 - value).abs() < 1e-9
}

#[test]
fn test_integration_matching_pair_outranks_mismatched_pair() {
    let matcher = Matcher::new(common::trained_artifact());

    let founder = common::founder(500_000.0, "AI/ML", "Series A");
    let aligned = common::investor(1_000_000.0, "Series A", "Moderate");
    let mismatched = common::investor(1_000_000.0, "Series B", "Low");

    let aligned_score = matcher.score(&founder, &aligned).unwrap();
    let mismatched_score = matcher.score(&founder, &mismatched).unwrap();

    assert!(
        aligned_score > mismatched_score,
        "aligned {} should beat mismatched {}",
        aligned_score,
        mismatched_score
    );
}

#[test]
fn test_integration_example_request() {
    let matcher = Matcher::new(common::trained_artifact());

    let founder = object(json!({"fund_required": 500000, "industry": "AI/ML", "funding_stage": "Series A"}));
    let investor = object(json!({
        "total_invested": 1000000,
        "preferred_funding_stage": "Series A",
        "risk_tolerance": "Moderate"
    }));

    let score = matcher.score_json(&founder, &investor).unwrap();
    assert!((0.0..=100.0).contains(&score));
    assert!(has_two_decimals(score), "{} has more than two decimals", score);

    // Same input, same answer
    assert_eq!(matcher.score_json(&founder, &investor).unwrap(), score);
}

#[test]
fn test_integration_unknown_category_still_scores() {
    let matcher = Matcher::new(common::trained_artifact());

    let founder = common::founder(750_000.0, "Quantum Computing", "Pre-Seed");
    let investor = common::investor(3_000_000.0, "Series A", "Aggressive");

    let score = matcher.score(&founder, &investor).unwrap();
    assert!((0.0..=100.0).contains(&score));
}

#[test]
fn test_integration_rejects_malformed_attributes() {
    let matcher = Matcher::new(common::trained_artifact());

    let founder = object(json!({"fund_required": "a lot", "industry": "AI/ML"}));
    let investor = object(json!({
        "total_invested": 1000000,
        "preferred_funding_stage": "Series A",
        "risk_tolerance": "Moderate"
    }));
    let err = matcher.score_json(&founder, &investor).unwrap_err();
    assert!(matches!(err, MatchError::Validation(_)));
    assert!(err.is_client_error());
    let message = err.to_string();
    assert!(message.contains("fund_required"), "{}", message);
    assert!(message.contains("funding_stage"), "{}", message);

    // Typed records bypassing JSON parsing are still checked
    let extra = common::founder(1.0, "AI/ML", "Seed").with_numeric("extra", 3.0);
    let err = matcher
        .score(&extra, &common::investor(1.0, "Seed", "Low"))
        .unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn test_integration_rank_orders_and_truncates() {
    let matcher = Matcher::new(common::trained_artifact());
    let founder = common::founder(500_000.0, "AI/ML", "Series A");

    let candidates: Vec<InvestorCandidate> = common::STAGES
        .iter()
        .flat_map(|stage| common::RISK_LEVELS.iter().map(move |risk| (stage, risk)))
        .enumerate()
        .map(|(i, (stage, risk))| InvestorCandidate {
            investor_id: format!("inv-{}", i),
            attributes: common::investor(1_000_000.0 + i as f64 * 100_000.0, stage, risk),
        })
        .collect();
    let total = candidates.len();

    let result = matcher.rank(&founder, candidates.clone(), 4).unwrap();
    assert_eq!(result.total_candidates, total);
    assert_eq!(result.matches.len(), 4);
    for w in result.matches.windows(2) {
        assert!(w[0].match_probability >= w[1].match_probability);
    }

    // Batched scores agree with one-at-a-time scores
    for m in &result.matches {
        let candidate = candidates.iter().find(|c| c.investor_id == m.investor_id).unwrap();
        let single = matcher.score(&founder, &candidate.attributes).unwrap();
        assert!((single - m.match_probability).abs() <= 0.011, "{} vs {}", single, m.match_probability);
    }
}

#[test]
fn test_integration_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let artifact = common::quick_artifact(11);

    let founder = common::founder(500_000.0, "Fintech", "Seed");
    let investor = common::investor(2_000_000.0, "Seed", "High");
    let matcher = Matcher::new(Arc::new(artifact));
    let before = matcher.score(&founder, &investor).unwrap();

    store.save(matcher.artifact()).unwrap();
    assert_eq!(store.current_version().unwrap().as_deref(), Some(matcher.model_version()));

    let loaded = store.load_current().unwrap();
    assert_eq!(loaded.version(), matcher.model_version());
    assert_eq!(
        loaded.seeker_encoder().feature_names().unwrap(),
        matcher.artifact().seeker_encoder().feature_names().unwrap()
    );
    assert_eq!(
        loaded.provider_encoder().feature_names().unwrap(),
        matcher.artifact().provider_encoder().feature_names().unwrap()
    );

    // Reloaded encoders and weights reproduce the in-memory model exactly
    let original = matcher.artifact();
    let seeker_before = original.seeker_encoder().transform(&founder).unwrap();
    let seeker_after = loaded.seeker_encoder().transform(&founder).unwrap();
    let provider_before = original.provider_encoder().transform(&investor).unwrap();
    let provider_after = loaded.provider_encoder().transform(&investor).unwrap();
    let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&seeker_before), bits(&seeker_after));
    assert_eq!(bits(&provider_before), bits(&provider_after));

    let raw_before = original.scorer().predict(&seeker_before, &provider_before).unwrap();
    let raw_after = loaded.scorer().predict(&seeker_after, &provider_after).unwrap();
    assert_eq!(raw_before.to_bits(), raw_after.to_bits());

    let after = Matcher::new(Arc::new(loaded)).score(&founder, &investor).unwrap();
    assert_eq!(before.to_bits(), after.to_bits());
}

#[test]
fn test_integration_store_without_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();

    assert!(store.current_version().unwrap().is_none());
    assert!(store.list_versions().unwrap().is_empty());
    assert!(matches!(store.load_current(), Err(ArtifactError::NoCurrentBundle(_))));
    assert!(store.set_current("missing").is_err());
}

#[test]
fn test_integration_pointer_swap_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();

    let first = common::quick_artifact(1);
    let second = common::quick_artifact(2);
    store.save(&first).unwrap();
    store.save(&second).unwrap();

    let versions = store.list_versions().unwrap();
    assert_eq!(versions.len(), 2);
    assert!(versions.contains(&first.version().to_string()));
    assert!(versions.contains(&second.version().to_string()));
    assert_eq!(store.current_version().unwrap().as_deref(), Some(second.version()));

    // Roll back
    store.set_current(first.version()).unwrap();
    assert_eq!(store.load_current().unwrap().version(), first.version());

    // Saving the same bundle twice is refused
    assert!(store.save(&first).is_err());
    // No staging leftovers
    let hidden = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging"))
        .count();
    assert_eq!(hidden, 0);
}

#[test]
fn test_integration_mixed_bundle_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();

    let first = common::quick_artifact(3);
    let second = common::quick_artifact(4);
    let first_dir = store.save(&first).unwrap();
    let second_dir = store.save(&second).unwrap();

    // Plant the older run's encoder in the current bundle
    let stale = std::fs::read(first_dir.join("seeker_encoder.json")).unwrap();
    std::fs::write(second_dir.join("seeker_encoder.json"), &stale).unwrap();
    assert!(matches!(
        store.load_current(),
        Err(ArtifactError::ChecksumMismatch { .. })
    ));

    // Even with a matching checksum the embedded version gives it away
    let manifest_path = second_dir.join("manifest.json");
    let mut manifest: BundleManifest =
        serde_json::from_slice(&std::fs::read(&manifest_path).unwrap()).unwrap();
    manifest.checksums.seeker_encoder = blake3::hash(&stale).to_hex().to_string();
    std::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();
    assert!(matches!(
        store.load_current(),
        Err(ArtifactError::VersionSkew { .. })
    ));

    // The untouched bundle still loads
    assert_eq!(store.load_version(first.version()).unwrap().version(), first.version());
}

#[test]
fn test_integration_corrupt_scorer_weights_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let bundle_dir = store.save(&common::quick_artifact(5)).unwrap();

    let path = bundle_dir.join("scorer.safetensors");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        store.load_current(),
        Err(ArtifactError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_integration_readers_never_see_partial_bundles() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    store.save(&common::quick_artifact(20)).unwrap();

    let bundles: Vec<_> = (21..24).map(common::quick_artifact).collect();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let store = store.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            let mut loads = 0usize;
            while !done.load(Ordering::Acquire) || loads == 0 {
                let artifact = store.load_current().expect("reader saw an inconsistent bundle");
                let seeker_dim = artifact.seeker_encoder().output_dim();
                assert_eq!(seeker_dim, Some(artifact.scorer().config().seeker_dim));
                loads += 1;
            }
            loads
        })
    };

    for artifact in &bundles {
        store.save(artifact).unwrap();
    }
    done.store(true, Ordering::Release);

    assert!(reader.join().unwrap() > 0);
    assert_eq!(
        store.current_version().unwrap().as_deref(),
        bundles.last().map(|a| a.version())
    );
}

#[test]
fn test_integration_scorer_guards() {
    let artifact = common::trained_artifact();
    let scorer = artifact.scorer();
    let seeker_dim = scorer.config().seeker_dim;
    let provider_dim = scorer.config().provider_dim;

    assert!(scorer
        .predict(&vec![0.0; seeker_dim + 1], &vec![0.0; provider_dim])
        .is_err());
    assert!(scorer
        .predict(&vec![0.0; seeker_dim], &vec![0.0; provider_dim - 1])
        .is_err());

    let p = scorer.predict(&vec![0.0; seeker_dim], &vec![0.0; provider_dim]).unwrap();
    assert!((0.0..=1.0).contains(&p));

    // Unfitted encoders never reach the scorer
    let fresh = venture_match::FeatureEncoder::seeker();
    assert!(matches!(
        fresh.transform(&common::founder(1.0, "AI/ML", "Seed")),
        Err(EncoderError::NotFitted(_))
    ));
}

fn app_state() -> AppState {
    AppState { matcher: Matcher::new(common::trained_artifact()) }
}

#[actix_web::test]
async fn test_http_predict_legacy_path() {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = actix_test::TestRequest::post()
        .uri("/predict/")
        .set_json(json!({
            "founder": {"fund_required": 500000, "industry": "AI/ML", "funding_stage": "Series A"},
            "investor": {"total_invested": 1000000, "preferred_funding_stage": "Series A", "risk_tolerance": "Moderate"}
        }))
        .to_request();
    let resp: PredictResponse = actix_test::call_and_read_body_json(&app, req).await;

    assert!((0.0..=100.0).contains(&resp.match_probability));
    assert!(has_two_decimals(resp.match_probability));
}

#[actix_web::test]
async fn test_http_predict_rejects_bad_payload() {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/predict")
        .set_json(json!({
            "founder": {"fund_required": 500000, "industry": "AI/ML"},
            "investor": {"total_invested": "lots", "preferred_funding_stage": "Series A", "risk_tolerance": "Moderate"}
        }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = actix_test::read_body_json(resp).await;
    assert_eq!(body["status_code"], 400);
}

#[actix_web::test]
async fn test_http_rank_and_health() {
    let state = app_state();
    let version = state.matcher.model_version().to_string();
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/matches/rank")
        .set_json(json!({
            "founder": {"fund_required": 500000, "industry": "AI/ML", "funding_stage": "Series A"},
            "investors": [
                {"investorId": "a", "attributes": {"total_invested": 1000000, "preferred_funding_stage": "Series A", "risk_tolerance": "Moderate"}},
                {"investorId": "b", "attributes": {"total_invested": 2000000, "preferred_funding_stage": "Seed", "risk_tolerance": "Low"}},
                {"investorId": "c", "attributes": {"total_invested": 3000000, "preferred_funding_stage": "Series B", "risk_tolerance": "High"}}
            ],
            "limit": 2
        }))
        .to_request();
    let resp: RankResponse = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.total_candidates, 3);
    assert_eq!(resp.matches.len(), 2);
    assert_eq!(resp.model_version, version);

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/matches/rank")
        .set_json(json!({
            "founder": {"fund_required": 500000, "industry": "AI/ML", "funding_stage": "Series A"},
            "investors": []
        }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = actix_test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_version"], version.as_str());

    let req = actix_test::TestRequest::get().uri("/api/v1/model").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["version"], version.as_str());
    assert!(body["seeker_features"].as_array().unwrap().len() > 3);
}
