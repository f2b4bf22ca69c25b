use crate::model::{CompetitionId, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a betting round. Transitions only move forward and `Scored` is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Open,
    Closed,
    Scoring,
    Scored,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Open => "open",
            RoundStatus::Closed => "closed",
            RoundStatus::Scoring => "scoring",
            RoundStatus::Scored => "scored",
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RoundStatus::Open),
            "closed" => Ok(RoundStatus::Closed),
            "scoring" => Ok(RoundStatus::Scoring),
            "scored" => Ok(RoundStatus::Scored),
            other => Err(format!("unknown round status `{other}`")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BettingRound {
    pub id: RoundId,
    #[serde(rename = "competitionId")]
    pub competition_id: CompetitionId,
    pub name: String,
    pub status: RoundStatus,
    #[serde(rename = "earliestFixtureKickoff")]
    pub earliest_fixture_kickoff: Option<DateTime<Utc>>,
    #[serde(rename = "latestFixtureKickoff")]
    pub latest_fixture_kickoff: Option<DateTime<Utc>>,
    #[serde(rename = "scoredAt")]
    pub scored_at: Option<DateTime<Utc>>,
}

impl BettingRound {
    pub fn is_scored(&self) -> bool {
        self.status == RoundStatus::Scored
    }
}
