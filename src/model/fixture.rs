use crate::model::{FixtureId, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A "1/X/2" match outcome. Used both for final results and for predictions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "X",
            Outcome::Away => "2",
        }
    }

    /// Any outcome other than `self`.
    pub fn other(&self) -> Outcome {
        match self {
            Outcome::Home => Outcome::Away,
            Outcome::Draw => Outcome::Home,
            Outcome::Away => Outcome::Home,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Outcome::Home),
            "X" | "x" => Ok(Outcome::Draw),
            "2" => Ok(Outcome::Away),
            other => Err(format!("`{other}` is not one of 1, X, 2")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: FixtureId,
    #[serde(rename = "roundId")]
    pub round_id: RoundId,
    #[serde(rename = "homeTeam")]
    pub home_team: String,
    #[serde(rename = "awayTeam")]
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub result: Option<Outcome>,
}
