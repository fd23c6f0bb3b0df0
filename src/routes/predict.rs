use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::core::{MatchError, Matcher};
use crate::models::{
    ErrorResponse, HealthResponse, InvestorCandidate, ModelInfoResponse, PredictRequest, PredictResponse,
    RankRequest, RankResponse,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: Matcher,
}

/// Configure all scoring routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/model", web::get().to(model_info))
        .route("/predict", web::post().to(predict))
        .route("/matches/rank", web::post().to(rank_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_version: state.matcher.model_version().to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Describe the loaded model bundle
async fn model_info(state: web::Data<AppState>) -> impl Responder {
    let artifact = state.matcher.artifact();
    let features = artifact
        .seeker_encoder()
        .feature_names()
        .and_then(|s| artifact.provider_encoder().feature_names().map(|p| (s, p)));

    match features {
        Ok((seeker_features, provider_features)) => HttpResponse::Ok().json(ModelInfoResponse {
            version: artifact.version().to_string(),
            created_at: artifact.created_at(),
            seeker_features,
            provider_features,
        }),
        Err(e) => error_response(&MatchError::from(e)),
    }
}

/// Match probability endpoint
///
/// POST /predict/ and POST /api/v1/predict
///
/// Request body:
/// ```json
/// {
///   "founder": {"fund_required": 500000, "industry": "AI/ML", "funding_stage": "Series A"},
///   "investor": {"total_invested": 1000000, "preferred_funding_stage": "Series A", "risk_tolerance": "Moderate"}
/// }
/// ```
pub async fn predict(state: web::Data<AppState>, req: web::Json<PredictRequest>) -> impl Responder {
    match state.matcher.score_json(&req.founder, &req.investor) {
        Ok(match_probability) => {
            tracing::debug!("Scored pair: {}", match_probability);
            HttpResponse::Ok().json(PredictResponse { match_probability })
        }
        Err(e) => error_response(&e),
    }
}

/// Rank several investors for one founder
///
/// POST /api/v1/matches/rank
async fn rank_matches(state: web::Data<AppState>, req: web::Json<RankRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for rank request: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let req = req.into_inner();
    let founder_schema = state.matcher.artifact().seeker_encoder().schema();
    let investor_schema = state.matcher.artifact().provider_encoder().schema();

    let founder = match founder_schema.parse_json(&req.founder) {
        Ok(record) => record,
        Err(e) => return error_response(&MatchError::from(e)),
    };

    let mut candidates = Vec::with_capacity(req.investors.len());
    for candidate in req.investors {
        match investor_schema.parse_json(&candidate.attributes) {
            Ok(attributes) => candidates.push(InvestorCandidate {
                investor_id: candidate.investor_id,
                attributes,
            }),
            Err(e) => return error_response(&MatchError::from(e)),
        }
    }

    match state.matcher.rank(&founder, candidates, req.limit as usize) {
        Ok(result) => {
            tracing::info!(
                "Returning {} ranked investors (from {} candidates)",
                result.matches.len(),
                result.total_candidates
            );
            HttpResponse::Ok().json(RankResponse {
                matches: result.matches,
                total_candidates: result.total_candidates,
                model_version: state.matcher.model_version().to_string(),
            })
        }
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &MatchError) -> HttpResponse {
    if err.is_client_error() {
        tracing::info!("Rejected request: {}", err);
        HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid attributes".to_string(),
            message: err.to_string(),
            status_code: 400,
        })
    } else {
        tracing::error!("Scoring failed: {}", err);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Scoring failed".to_string(),
            message: err.to_string(),
            status_code: 500,
        })
    }
}
