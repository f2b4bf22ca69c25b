use crate::error::PoolError;
use crate::model::fixture::Outcome;
use crate::model::{FixtureId, RoundId};
use crate::service::submission::Prediction;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

lazy_static! {
    static ref OUTCOME_RE: Regex = Regex::new(r"^[1Xx2]$").unwrap();
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictionSchema {
    #[validate(range(min = 1, message = "fixture_id must be a positive integer"))]
    pub fixture_id: i32, // FixtureId; validator derive needs the primitive name
    #[validate(regex(path = "OUTCOME_RE", message = "prediction must be one of 1, X, 2"))]
    pub prediction: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBetsQuery {
    pub round_id: Option<RoundId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FixtureResultSchema {
    #[validate(range(min = 1, message = "fixture_id must be a positive integer"))]
    pub fixture_id: i32, // FixtureId; validator derive needs the primitive name
    #[validate(regex(path = "OUTCOME_RE", message = "result must be one of 1, X, 2"))]
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRoundSchema {
    pub results: Vec<FixtureResultSchema>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RetroactivePointsSchema {
    #[validate(range(min = 1, message = "competition_id must be a positive integer"))]
    pub competition_id: i32, // CompetitionId; validator derive needs the primitive name
    #[validate(range(min = 1, message = "from_round_id must be a positive integer"))]
    pub from_round_id: Option<i32>, // RoundId; validator derive needs the primitive name
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkRetroactivePointsSchema {
    #[validate(range(min = 1, message = "competition_id must be a positive integer"))]
    pub competition_id: i32, // CompetitionId; validator derive needs the primitive name
    pub created_after: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
}

pub fn validate_schema<T: Validate>(schema: &T) -> Result<(), PoolError> {
    schema
        .validate()
        .map_err(|e| PoolError::Validation(e.to_string()))
}

fn parse_outcome(raw: &str) -> Result<Outcome, PoolError> {
    raw.parse::<Outcome>().map_err(PoolError::Validation)
}

pub fn into_predictions(body: &[PredictionSchema]) -> Result<Vec<Prediction>, PoolError> {
    body.iter()
        .map(|item| {
            validate_schema(item)?;
            Ok(Prediction {
                fixture_id: item.fixture_id,
                outcome: parse_outcome(&item.prediction)?,
            })
        })
        .collect()
}

pub fn into_results(body: &ScoreRoundSchema) -> Result<HashMap<FixtureId, Outcome>, PoolError> {
    let mut results = HashMap::with_capacity(body.results.len());
    for item in &body.results {
        validate_schema(item)?;
        let outcome = parse_outcome(&item.result)?;
        if results.insert(item.fixture_id, outcome).is_some() {
            return Err(PoolError::Validation(format!(
                "Fixture {} has more than one result",
                item.fixture_id
            )));
        }
    }
    Ok(results)
}
