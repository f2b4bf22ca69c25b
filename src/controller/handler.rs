use crate::config::jwt_auth::JwtMiddleware;
use crate::controller::payload::{
    into_predictions, into_results, validate_schema, BulkRetroactivePointsSchema,
    PredictionSchema, RetroactivePointsSchema, ScoreRoundSchema, SubmitBetsQuery,
};
use crate::error::PoolError;
use crate::model::response::{DataResponse, ErrorResponse};
use crate::model::{CompetitionId, RoundId, UserId};
use crate::service::lock_guard::RoundLockGuard;
use crate::service::scorer::RoundScorer;
use crate::service::standings::StandingsAggregator;
use crate::service::submission::BetSubmissionCoordinator;
use crate::service::synthesizer::RetroactivePointsEngine;
use crate::AppState;
use actix_web::error::InternalError;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, web, HttpResponse, Responder};
use log::warn;
use serde_json::json;

type HandlerResult = Result<HttpResponse, PoolError>;

async fn invalidate_standings(data: &AppState, competition_id: CompetitionId) {
    if let Some(cache) = &data.cache {
        if let Err(e) = cache.invalidate(competition_id).await {
            warn!("could not invalidate cached standings for competition {competition_id}: {e}");
        }
    }
}

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "Success",
        "message": "Everything is working as expected"
    }))
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::failed("Resource not found"))
}

#[post("/bets")]
async fn submit_bets_handler(
    auth: JwtMiddleware,
    data: Data<AppState>,
    query: Query<SubmitBetsQuery>,
    body: Json<Vec<PredictionSchema>>,
) -> HandlerResult {
    let predictions = into_predictions(&body)?;
    let receipt = BetSubmissionCoordinator::new(data.gateway.clone(), data.clock.clone())
        .submit(auth.user_id, query.round_id, &predictions)
        .await?;
    Ok(HttpResponse::Ok().json(DataResponse::success(receipt)))
}

#[get("/rounds/{round_id}/lock")]
async fn round_lock_handler(data: Data<AppState>, round_id: Path<RoundId>) -> HandlerResult {
    let guard = RoundLockGuard::new(data.gateway.clone(), data.clock.clone());
    let round = guard.load_round(round_id.into_inner()).await?;
    let deadline = guard.deadline(&round).await?;
    let locked = guard.is_locked(&round).await?;
    Ok(HttpResponse::Ok().json(DataResponse::success(json!({
        "round_id": round.id,
        "status": round.status,
        "locked": locked,
        "deadline": deadline,
    }))))
}

#[post("/rounds/{round_id}/score")]
async fn score_round_handler(
    auth: JwtMiddleware,
    data: Data<AppState>,
    round_id: Path<RoundId>,
    body: Json<ScoreRoundSchema>,
) -> HandlerResult {
    auth.require_admin()?;
    let results = into_results(&body)?;
    let summary = RoundScorer::new(data.gateway.clone(), data.clock.clone())
        .score_round(round_id.into_inner(), &results)
        .await?;
    invalidate_standings(&data, summary.competition_id).await;
    Ok(HttpResponse::Ok().json(DataResponse::success(summary)))
}

#[post("/users/{user_id}/retroactive-points")]
async fn retroactive_points_handler(
    auth: JwtMiddleware,
    data: Data<AppState>,
    user_id: Path<UserId>,
    body: Json<RetroactivePointsSchema>,
) -> HandlerResult {
    auth.require_admin()?;
    validate_schema(&*body)?;
    let result = RetroactivePointsEngine::new(data.gateway.clone(), data.clock.clone())
        .apply_retroactive_points(
            user_id.into_inner(),
            body.competition_id,
            body.from_round_id,
            body.dry_run,
        )
        .await?;
    if !body.dry_run && result.rounds_processed > 0 {
        invalidate_standings(&data, body.competition_id).await;
    }
    Ok(HttpResponse::Ok().json(DataResponse::success(result)))
}

#[post("/retroactive-points/bulk")]
async fn bulk_retroactive_points_handler(
    auth: JwtMiddleware,
    data: Data<AppState>,
    body: Json<BulkRetroactivePointsSchema>,
) -> HandlerResult {
    auth.require_admin()?;
    validate_schema(&*body)?;
    let result = RetroactivePointsEngine::new(data.gateway.clone(), data.clock.clone())
        .apply_bulk(body.competition_id, body.created_after, body.dry_run)
        .await?;
    if !body.dry_run && result.rounds_processed > 0 {
        invalidate_standings(&data, body.competition_id).await;
    }
    Ok(HttpResponse::Ok().json(DataResponse::success(result)))
}

#[get("/competitions/{competition_id}/standings")]
async fn standings_handler(
    data: Data<AppState>,
    competition_id: Path<CompetitionId>,
) -> HandlerResult {
    let competition_id = competition_id.into_inner();
    if let Some(cache) = &data.cache {
        match cache.get(competition_id).await {
            Ok(Some(standings)) => {
                return Ok(HttpResponse::Ok().json(DataResponse::success(json!({
                    "competition_id": competition_id,
                    "standings": standings,
                }))))
            }
            Ok(None) => {}
            Err(e) => warn!("standings cache read failed for competition {competition_id}: {e}"),
        }
    }

    let standings = StandingsAggregator::new(data.gateway.clone())
        .standings(competition_id)
        .await?;
    if let Some(cache) = &data.cache {
        if let Err(e) = cache.put(competition_id, &standings).await {
            warn!("standings cache write failed for competition {competition_id}: {e}");
        }
    }
    Ok(HttpResponse::Ok().json(DataResponse::success(json!({
        "competition_id": competition_id,
        "standings": standings,
    }))))
}

fn bad_request<E>(err: E) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let response = HttpResponse::BadRequest().json(ErrorResponse::failed(err.to_string()));
    InternalError::from_response(err, response).into()
}

pub fn config(conf: &mut web::ServiceConfig) {
    let scope = web::scope("/api/v1")
        .app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err)))
        .service(submit_bets_handler)
        .service(round_lock_handler)
        .service(score_round_handler)
        .service(retroactive_points_handler)
        .service(bulk_retroactive_points_handler)
        .service(standings_handler);

    conf.service(health_check).service(scope);
}
