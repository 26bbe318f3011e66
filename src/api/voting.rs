use chrono::Utc;
use mongodb::{bson::doc, Client};
use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::vote::{VoteDescription, VoteReceipt, VoteSpec},
        auth::VoterIdentity,
        common::election::ElectionStatus,
        db::{
            election::Election,
            vote::NewVote,
            voter::Voter,
        },
        mongodb::{is_duplicate_key_error, is_transient_transaction_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

/// How many times to re-run the ballot transaction after a write conflict.
const MAX_CAST_ATTEMPTS: u32 = 3;

/// Cast a ballot in an election.
///
/// The ballot insert, the tally increment, and the roster flag all land in
/// one transaction; a failure anywhere leaves no trace of the attempt. The
/// unique index on `(election_id, voter_id)` catches concurrent duplicates
/// that the roster pre-check cannot see.
#[post("/elections/<election_id>/vote", data = "<spec>", format = "json")]
async fn cast_vote(
    voter: VoterIdentity,
    election_id: Id,
    spec: Json<VoteSpec>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    new_votes: Coll<NewVote>,
    db_client: &State<Client>,
) -> Result<Created<Json<VoteReceipt>>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    if election.status_at(Utc::now()) != ElectionStatus::Active {
        return Err(Error::BadRequest("Election is not active".to_string()));
    }
    if spec.candidate_id as usize >= election.candidates.len() {
        return Err(Error::BadRequest("Invalid candidate".to_string()));
    }

    let roster_filter = doc! {
        "election_id": election_id,
        "address": voter.address.as_str(),
    };
    let entry = voters
        .find_one(roster_filter, None)
        .await?
        .ok_or_else(|| {
            Error::Forbidden("You are not registered for this election".to_string())
        })?;
    if entry.has_voted {
        return Err(Error::BadRequest(
            "You have already voted in this election".to_string(),
        ));
    }

    let vote = NewVote::new(election_id, entry.id, spec.candidate_id, spec.signature.clone());

    // Simultaneous casts by the same voter conflict inside the transaction
    // before either reaches the unique index; re-running the transaction
    // lets the loser hit the committed ballot and report a duplicate rather
    // than a server error.
    let mut attempts = 0;
    let vote_id = loop {
        attempts += 1;
        match record_ballot(db_client, &elections, &voters, &new_votes, &vote).await {
            Ok(vote_id) => break vote_id,
            Err(Error::Db(err))
                if attempts < MAX_CAST_ATTEMPTS && is_transient_transaction_error(&err) =>
            {
                info!("Retrying conflicted ballot transaction for election {election_id}");
            }
            Err(err) => return Err(err),
        }
    };

    info!("Ballot accepted for election {election_id}");
    let receipt = VoteReceipt::new(VoteDescription::new(vote_id, &vote));
    Ok(Created::new(format!("/api/elections/{election_id}/results")).body(Json(receipt)))
}

/// Apply the three ballot effects in one transaction: insert the vote, bump
/// the tally, set the roster flag. Dropping the session on any early return
/// aborts the transaction.
async fn record_ballot(
    db_client: &Client,
    elections: &Coll<Election>,
    voters: &Coll<Voter>,
    new_votes: &Coll<NewVote>,
    vote: &NewVote,
) -> Result<Id> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    // Record the ballot; a duplicate key here means another request for
    // the same voter won the race.
    let vote_id: Id = new_votes
        .insert_one_with_session(vote, None, &mut session)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::BadRequest("You have already voted in this election".to_string())
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    // Bump the candidate's tally, re-checking that the election was not
    // finalized since the pre-check.
    let tally_field = format!("candidates.{}.votes", vote.candidate);
    let filter = doc! {
        "_id": vote.election_id,
        "finalized": false,
    };
    let update = doc! {
        "$inc": {
            &tally_field: 1,
        }
    };
    let result = elections
        .update_one_with_session(filter, update, None, &mut session)
        .await?;
    if result.modified_count != 1 {
        return Err(Error::BadRequest("Election is not active".to_string()));
    }

    // Mark the roster entry.
    let update = doc! {
        "$set": {
            "has_voted": true,
        }
    };
    voters
        .update_one_with_session(vote.voter_id.as_doc(), update, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    Ok(vote_id)
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::model::{
        auth::{testing, AUTH_TOKEN_HEADER},
        db::{
            election::{ElectionCore, NewElection},
            vote::Vote,
            voter::NewVoter,
        },
    };

    use super::*;

    #[backend_test(voter)]
    async fn accepted_ballot_has_all_three_effects(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example()).await;
        add_to_roster(&db, election.id).await;

        let response = cast(&client, &token, election.id, 0).await;
        assert_eq!(Status::Created, response);

        // The tally, the ballot, and the roster flag all changed together.
        let election = get_election(&db, election.id).await;
        assert_eq!(election.candidates[0].votes, 1);
        assert_eq!(election.candidates[1].votes, 0);
        let vote_count = Coll::<Vote>::from_db(&db)
            .count_documents(doc! {"election_id": election.id}, None)
            .await
            .unwrap();
        assert_eq!(vote_count, election.total_votes());
        let entry = get_roster_entry(&db, election.id).await;
        assert!(entry.has_voted);
    }

    #[backend_test(voter)]
    async fn duplicate_ballots_are_rejected(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example()).await;
        add_to_roster(&db, election.id).await;

        assert_eq!(Status::Created, cast(&client, &token, election.id, 0).await);
        assert_eq!(Status::BadRequest, cast(&client, &token, election.id, 1).await);

        // Only the first ballot counted.
        let election = get_election(&db, election.id).await;
        assert_eq!(election.total_votes(), 1);
        assert_eq!(election.candidates[0].votes, 1);
    }

    #[backend_test(voter)]
    async fn simultaneous_ballots_count_exactly_once(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example()).await;
        add_to_roster(&db, election.id).await;

        // Dispatch both casts at once so they race past the roster pre-check
        // and collide inside the transaction.
        let (first, second) = rocket::tokio::join!(
            cast(&client, &token, election.id, 0),
            cast(&client, &token, election.id, 1),
        );
        assert!(
            (first == Status::Created && second == Status::BadRequest)
                || (first == Status::BadRequest && second == Status::Created),
            "got {first} and {second}"
        );

        let election = get_election(&db, election.id).await;
        assert_eq!(election.total_votes(), 1);
        let vote_count = Coll::<Vote>::from_db(&db)
            .count_documents(doc! {"election_id": election.id}, None)
            .await
            .unwrap();
        assert_eq!(vote_count, 1);
    }

    #[backend_test(voter)]
    async fn stale_roster_flags_do_not_allow_double_voting(
        client: Client,
        db: Database,
        token: String,
    ) {
        let election = insert_election(&db, ElectionCore::example()).await;
        add_to_roster(&db, election.id).await;
        let entry = get_roster_entry(&db, election.id).await;

        // A ballot already exists for this voter but the roster flag was
        // never set, as after an interrupted cast. The unique index still
        // blocks a second ballot.
        let existing = NewVote::new(election.id, entry.id, 1, "0xffff".to_string());
        Coll::<NewVote>::from_db(&db)
            .insert_one(&existing, None)
            .await
            .unwrap();

        assert_eq!(Status::BadRequest, cast(&client, &token, election.id, 0).await);

        // The original ballot is untouched and no new one appeared.
        let vote_count = Coll::<Vote>::from_db(&db)
            .count_documents(doc! {"election_id": election.id}, None)
            .await
            .unwrap();
        assert_eq!(vote_count, 1);
        let election = get_election(&db, election.id).await;
        assert_eq!(election.total_votes(), 0);
    }

    #[backend_test(voter)]
    async fn rejected_ballots_leave_no_trace(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example_ended()).await;
        add_to_roster(&db, election.id).await;

        assert_eq!(Status::BadRequest, cast(&client, &token, election.id, 0).await);

        let election = get_election(&db, election.id).await;
        assert_eq!(election.total_votes(), 0);
        let entry = get_roster_entry(&db, election.id).await;
        assert!(!entry.has_voted);
        let vote_count = Coll::<Vote>::from_db(&db)
            .count_documents(doc! {"election_id": election.id}, None)
            .await
            .unwrap();
        assert_eq!(vote_count, 0);
    }

    #[backend_test(voter)]
    async fn out_of_range_candidates_are_rejected(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example()).await;
        add_to_roster(&db, election.id).await;

        assert_eq!(Status::BadRequest, cast(&client, &token, election.id, 2).await);
        let election = get_election(&db, election.id).await;
        assert_eq!(election.total_votes(), 0);
    }

    #[backend_test(voter)]
    async fn unregistered_voters_are_rejected(client: Client, db: Database, token: String) {
        let election = insert_election(&db, ElectionCore::example()).await;

        assert_eq!(Status::Forbidden, cast(&client, &token, election.id, 0).await);
    }

    #[backend_test(voter)]
    async fn missing_elections_are_404(client: Client, token: String) {
        assert_eq!(Status::NotFound, cast(&client, &token, Id::new(), 0).await);
    }

    #[backend_test]
    async fn voting_requires_a_token(client: Client, db: Database) {
        let election = insert_election(&db, ElectionCore::example()).await;
        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&VoteSpec {
                    candidate_id: 0,
                    signature: "0x00".to_string(),
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    async fn cast(client: &Client, token: &str, election_id: Id, candidate: u32) -> Status {
        let response = client
            .post(uri!(cast_vote(election_id)))
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, token.to_string()))
            .body(
                serde_json::to_string(&VoteSpec {
                    candidate_id: candidate,
                    signature: "0xdeadbeef".to_string(),
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        response.status()
    }

    async fn insert_election(db: &Database, election: NewElection) -> Election {
        let id = Coll::<NewElection>::from_db(db)
            .insert_one(&election, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap();
        Coll::<Election>::from_db(db)
            .find_one(doc! {"_id": id}, None)
            .await
            .unwrap()
            .unwrap()
    }

    async fn get_election(db: &Database, id: Id) -> Election {
        Coll::<Election>::from_db(db)
            .find_one(id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
    }

    /// Put the test wallet on the election's roster.
    async fn add_to_roster(db: &Database, election_id: Id) {
        let voter = NewVoter::new(
            election_id,
            testing::address(&testing::TEST_KEY),
            Some("Test Voter".to_string()),
        );
        Coll::<NewVoter>::from_db(db)
            .insert_one(&voter, None)
            .await
            .unwrap();
    }

    async fn get_roster_entry(db: &Database, election_id: Id) -> Voter {
        Coll::<Voter>::from_db(db)
            .find_one(doc! {"election_id": election_id}, None)
            .await
            .unwrap()
            .unwrap()
    }
}
