use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::election::ElectionStatus,
    db::election::{Candidate, Election, NewElection},
};

/// A candidate in an election creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A request to create an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<CandidateSpec>,
    pub contract_address: String,
}

impl TryFrom<ElectionSpec> for NewElection {
    type Error = Error;

    fn try_from(spec: ElectionSpec) -> Result<Self, Self::Error> {
        if spec.title.trim().is_empty() {
            return Err(Error::BadRequest("Title is required".to_string()));
        }
        if spec.start_date >= spec.end_date {
            return Err(Error::BadRequest(
                "End date must be after start date".to_string(),
            ));
        }
        if spec.candidates.is_empty() {
            return Err(Error::BadRequest(
                "An election needs at least one candidate".to_string(),
            ));
        }
        let contract_address = spec
            .contract_address
            .parse()
            .map_err(|err: crate::model::common::address::InvalidAddress| {
                Error::BadRequest(err.to_string())
            })?;

        Ok(Self {
            title: spec.title.trim().to_string(),
            description: spec.description,
            start_date: spec.start_date,
            end_date: spec.end_date,
            candidates: spec
                .candidates
                .into_iter()
                .map(|candidate| Candidate {
                    name: candidate.name,
                    description: candidate.description,
                    votes: 0,
                })
                .collect(),
            contract_address,
            finalized: false,
            created_at: Utc::now(),
        })
    }
}

/// The public view of an election. Tallies are only exposed through the
/// results view, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionStatus,
    pub contract_address: String,
    pub candidates: Vec<CandidateSpec>,
}

impl ElectionDescription {
    pub fn new(election: &Election, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.to_hex(),
            title: election.title.clone(),
            description: election.description.clone(),
            start_date: election.start_date,
            end_date: election.end_date,
            status: election.status_at(now),
            contract_address: election.contract_address.as_str().to_string(),
            candidates: election
                .candidates
                .iter()
                .map(|candidate| CandidateSpec {
                    name: candidate.name.clone(),
                    description: candidate.description.clone(),
                })
                .collect(),
        }
    }
}

/// The full election list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionListResponse {
    pub success: bool,
    pub elections: Vec<ElectionDescription>,
}

impl ElectionListResponse {
    pub fn new(elections: Vec<ElectionDescription>) -> Self {
        Self {
            success: true,
            elections,
        }
    }
}

/// A single election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResponse {
    pub success: bool,
    pub election: ElectionDescription,
}

impl ElectionResponse {
    pub fn new(election: ElectionDescription) -> Self {
        Self {
            success: true,
            election,
        }
    }
}

/// Confirmation of a created election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionCreatedResponse {
    pub message: String,
    pub election: ElectionDescription,
}

impl ElectionCreatedResponse {
    pub fn new(election: ElectionDescription) -> Self {
        Self {
            message: "Election created".to_string(),
            election,
        }
    }
}

/// A candidate's share of the vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub name: String,
    pub votes: u64,
    /// Share of the total, as a percentage rounded to two decimal places.
    pub percentage: f64,
}

/// The tallies of an election at the time of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub success: bool,
    pub election: ElectionDescription,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

impl ElectionResults {
    pub fn new(election: &Election, now: DateTime<Utc>) -> Self {
        let total = election.total_votes();
        Self {
            success: true,
            election: ElectionDescription::new(election, now),
            total_votes: total,
            candidates: election
                .candidates
                .iter()
                .map(|candidate| CandidateResult {
                    name: candidate.name.clone(),
                    votes: candidate.votes,
                    percentage: percentage(candidate.votes, total),
                })
                .collect(),
        }
    }
}

/// Vote share as a percentage with two decimal places; zero ballots means
/// every candidate is at zero rather than a division by zero.
pub(crate) fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_round_to_two_decimal_places() {
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(1, 2), 50.0);
    }

    #[test]
    fn zero_total_gives_zero_percentages() {
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn rejects_inverted_date_windows() {
        let mut spec = ElectionSpec::example();
        std::mem::swap(&mut spec.start_date, &mut spec.end_date);
        assert!(NewElection::try_from(spec).is_err());
    }

    #[test]
    fn rejects_empty_candidate_lists() {
        let mut spec = ElectionSpec::example();
        spec.candidates.clear();
        assert!(NewElection::try_from(spec).is_err());
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::db::election::ElectionCore;

    impl ElectionSpec {
        /// A creation request matching `ElectionCore::example`.
        pub fn example() -> Self {
            let election = ElectionCore::example();
            Self {
                title: election.title.clone(),
                description: election.description.clone(),
                start_date: election.start_date,
                end_date: election.end_date,
                candidates: election
                    .candidates
                    .iter()
                    .map(|candidate| CandidateSpec {
                        name: candidate.name.clone(),
                        description: candidate.description.clone(),
                    })
                    .collect(),
                contract_address: election.contract_address.as_str().to_string(),
            }
        }
    }
}
