use chrono::Utc;
use mongodb::bson::doc;
use rocket::{response::status::Created, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::election::{
            ElectionCreatedResponse, ElectionDescription, ElectionResponse, ElectionSpec,
        },
        auth::AdminSession,
        common::{election::ElectionStatus, permissions::Permission},
        db::election::{Election, NewElection},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_election, end_election, finalize_election]
}

/// Create an election from a spec.
#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    session: AdminSession,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Created<Json<ElectionCreatedResponse>>> {
    session.require(Permission::CreateElections)?;

    let election: NewElection = spec.0.try_into()?;
    let new_id: Id = new_elections
        .insert_one(&election, None)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::BadRequest("An election already exists for this contract".to_string())
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    // Retrieve the full election information including ID.
    let election = elections
        .find_one(new_id.as_doc(), None)
        .await?
        .unwrap(); // Present because we just inserted it.

    let description = ElectionDescription::new(&election, Utc::now());
    Ok(Created::new(format!("/api/elections/{new_id}"))
        .body(Json(ElectionCreatedResponse::new(description))))
}

/// End an active election immediately by truncating its voting window.
#[post("/elections/<election_id>/end")]
async fn end_election(
    session: AdminSession,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionResponse>> {
    session.require(Permission::ManageElections)?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let now = Utc::now();
    match election.status_at(now) {
        ElectionStatus::Active => {}
        ElectionStatus::Pending => {
            return Err(Error::BadRequest("Election has not started".to_string()));
        }
        ElectionStatus::Ended | ElectionStatus::Finalized => {
            return Err(Error::BadRequest("Election has already ended".to_string()));
        }
    }

    let update = doc! {
        "$set": {
            "end_date": mongodb::bson::DateTime::from_chrono(now),
        }
    };
    elections
        .update_one(election_id.as_doc(), update, None)
        .await?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(ElectionResponse::new(ElectionDescription::new(
        &election, now,
    ))))
}

/// Seal the results of an ended election. Irreversible.
#[post("/elections/<election_id>/finalize")]
async fn finalize_election(
    session: AdminSession,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionResponse>> {
    session.require(Permission::FinalizeResults)?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let now = Utc::now();
    match election.status_at(now) {
        ElectionStatus::Ended => {}
        ElectionStatus::Pending | ElectionStatus::Active => {
            return Err(Error::BadRequest(
                "Election has not ended yet".to_string(),
            ));
        }
        ElectionStatus::Finalized => {
            return Err(Error::BadRequest(
                "Election is already finalized".to_string(),
            ));
        }
    }

    // Filter on the flag so two racing finalizes cannot both succeed.
    let filter = doc! {
        "_id": election_id,
        "finalized": false,
    };
    let update = doc! {
        "$set": {
            "finalized": true,
        }
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::BadRequest(
            "Election is already finalized".to_string(),
        ));
    }

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(ElectionResponse::new(ElectionDescription::new(
        &election, now,
    ))))
}
