pub mod bet;
pub mod fixture;
pub mod response;
pub mod round;
pub mod schema;
pub mod standing;
pub mod token_claims;
pub mod user;

pub type RoundId = i32;
pub type FixtureId = i32;
pub type CompetitionId = i32;
pub type UserId = uuid::Uuid;
