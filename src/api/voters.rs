use chrono::Utc;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::InsertManyOptions,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::voter::{
            AddVoterRequest, BulkAddRequest, BulkAddResponse, RosterResponse, VoterDescription,
        },
        auth::AdminSession,
        common::{
            address::{InvalidAddress, WalletAddress},
            election::ElectionStatus,
            permissions::Permission,
        },
        db::{
            election::Election,
            voter::{NewVoter, Voter},
        },
        mongodb::{is_duplicate_key_error, Coll, Id, DUPLICATE_KEY},
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_roster, add_voter, bulk_add_voters, remove_voter]
}

/// List an election's roster.
#[get("/elections/<election_id>/voters")]
async fn get_roster(
    session: AdminSession,
    election_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<Json<RosterResponse>> {
    session.require(Permission::ManageVoters)?;
    require_election(&elections, election_id).await?;

    let filter = doc! {
        "election_id": election_id,
    };
    let roster: Vec<Voter> = voters.find(filter, None).await?.try_collect().await?;
    Ok(Json(RosterResponse::new(
        roster.iter().map(Into::into).collect(),
    )))
}

/// Add a single wallet to an election's roster.
#[post("/elections/<election_id>/voters", data = "<request>", format = "json")]
async fn add_voter(
    session: AdminSession,
    election_id: Id,
    request: Json<AddVoterRequest>,
    elections: Coll<Election>,
    new_voters: Coll<NewVoter>,
) -> Result<Json<VoterDescription>> {
    session.require(Permission::ManageVoters)?;
    let election = require_election(&elections, election_id).await?;
    require_roster_open(&election)?;

    let address: WalletAddress = request
        .voter_address
        .parse()
        .map_err(|err: InvalidAddress| Error::BadRequest(err.to_string()))?;

    let voter = NewVoter::new(election_id, address, request.name.clone());
    let new_id: Id = new_voters
        .insert_one(&voter, None)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::BadRequest("Voter is already on the roster".to_string())
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    Ok(Json((&Voter { id: new_id, voter }).into()))
}

/// Add many wallets at once. Validation is all-or-nothing: one malformed
/// address rejects the whole batch. Addresses already on the roster are
/// skipped, so re-submitting a batch is harmless.
#[post(
    "/elections/<election_id>/voters/bulk",
    data = "<request>",
    format = "json"
)]
async fn bulk_add_voters(
    session: AdminSession,
    election_id: Id,
    request: Json<BulkAddRequest>,
    elections: Coll<Election>,
    new_voters: Coll<NewVoter>,
) -> Result<Json<BulkAddResponse>> {
    session.require(Permission::ManageVoters)?;
    let election = require_election(&elections, election_id).await?;
    require_roster_open(&election)?;

    let mut addresses = Vec::new();
    for raw in request
        .addresses
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let address: WalletAddress = raw
            .parse()
            .map_err(|err: InvalidAddress| Error::BadRequest(format!("{err}: {raw}")))?;
        addresses.push(address);
    }
    if addresses.is_empty() {
        return Err(Error::BadRequest("No addresses given".to_string()));
    }

    let total = addresses.len() as u64;
    let entries: Vec<NewVoter> = addresses
        .into_iter()
        .map(|address| NewVoter::new(election_id, address, None))
        .collect();

    // Unordered insert so duplicates are skipped rather than aborting the
    // batch part-way through.
    let options = InsertManyOptions::builder().ordered(false).build();
    let (added, skipped) = match new_voters.insert_many(&entries, options).await {
        Ok(result) => (result.inserted_ids.len() as u64, 0),
        Err(err) => match *err.kind {
            ErrorKind::BulkWrite(ref failure)
                if failure.write_errors.as_ref().is_some_and(|write_errors| {
                    write_errors
                        .iter()
                        .all(|write_error| write_error.code == DUPLICATE_KEY)
                }) =>
            {
                // Unwrap safe because the guard checked for `Some`.
                let skipped = failure.write_errors.as_ref().unwrap().len() as u64;
                (total - skipped, skipped)
            }
            ErrorKind::Write(WriteFailure::WriteError(ref write_error))
                if write_error.code == DUPLICATE_KEY =>
            {
                (total - 1, 1)
            }
            _ => return Err(err.into()),
        },
    };

    Ok(Json(BulkAddResponse {
        success: true,
        added,
        skipped,
    }))
}

/// Remove a wallet from an election's roster.
#[delete("/elections/<election_id>/voters/<address>")]
async fn remove_voter(
    session: AdminSession,
    election_id: Id,
    address: WalletAddress,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<()> {
    session.require(Permission::ManageVoters)?;
    let election = require_election(&elections, election_id).await?;

    let filter = doc! {
        "election_id": election_id,
        "address": address.as_str(),
    };
    let entry = voters
        .find_one(filter.clone(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {address}")))?;
    // Checked before the roster lock so the caller learns the stronger reason.
    if entry.has_voted {
        return Err(Error::BadRequest(
            "Cannot remove a voter who has already voted".to_string(),
        ));
    }
    require_roster_open(&election)?;

    voters.delete_one(filter, None).await?;
    Ok(())
}

async fn require_election(elections: &Coll<Election>, election_id: Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// The roster can only be edited before the election opens.
fn require_roster_open(election: &Election) -> Result<()> {
    match election.status_at(Utc::now()) {
        ElectionStatus::Pending => Ok(()),
        ElectionStatus::Active | ElectionStatus::Ended | ElectionStatus::Finalized => {
            Err(Error::BadRequest(
                "Roster is locked once the election has started".to_string(),
            ))
        }
    }
}
