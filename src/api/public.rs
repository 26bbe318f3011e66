use chrono::Utc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::election::{
            ElectionDescription, ElectionListResponse, ElectionResponse, ElectionResults,
        },
        db::election::Election,
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_elections, get_election, get_results]
}

/// List all elections, with their status at the time of the request.
#[get("/elections")]
async fn get_elections(elections: Coll<Election>) -> Result<Json<ElectionListResponse>> {
    let now = Utc::now();
    let elections: Vec<Election> = elections.find(None, None).await?.try_collect().await?;
    let descriptions = elections
        .iter()
        .map(|election| ElectionDescription::new(election, now))
        .collect();
    Ok(Json(ElectionListResponse::new(descriptions)))
}

/// A single election.
#[get("/elections/<election_id>")]
async fn get_election(
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionResponse>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(ElectionResponse::new(ElectionDescription::new(
        &election,
        Utc::now(),
    ))))
}

/// The tallies of an election, computed from the stored counters at read
/// time. Available while the election runs as well as after.
#[get("/elections/<election_id>/results")]
async fn get_results(
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionResults>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(ElectionResults::new(&election, Utc::now())))
}
