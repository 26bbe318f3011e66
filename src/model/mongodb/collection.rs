use std::ops::Deref;
use std::time::Duration;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    challenge::Challenge,
    election::{Election, NewElection},
    vote::{NewVote, Vote},
    voter::{NewVoter, Voter},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collection
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Election collection
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Voter roster collection
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Vote collection
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Login challenge collection
const CHALLENGES: &str = "challenges";
impl MongoCollection for Challenge {
    const NAME: &'static str = CHALLENGES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique index on `(election_id, voter_id)` in the vote collection is the
/// authoritative one-vote-per-voter guard; the `has_voted` flag on a roster
/// entry is only a read optimisation.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_sparse = IndexOptions::builder().unique(true).sparse(true).build();

    // Admin collection: unique usernames, unique wallet bindings where present.
    let username_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    let wallet_index = IndexModel::builder()
        .keys(doc! {"wallet_address": 1})
        .options(unique_sparse)
        .build();
    Coll::<Admin>::from_db(db)
        .create_indexes([username_index, wallet_index], None)
        .await?;

    // Election collection: one election per deployed contract.
    let contract_index = IndexModel::builder()
        .keys(doc! {"contract_address": 1})
        .options(unique.clone())
        .build();
    Coll::<Election>::from_db(db)
        .create_index(contract_index, None)
        .await?;

    // Roster collection: an address appears at most once per election.
    let roster_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "address": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(roster_index, None)
        .await?;

    // Vote collection: at most one vote per (election, voter).
    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Challenge collection: unique nonces, expired by the server.
    let nonce_index = IndexModel::builder()
        .keys(doc! {"nonce": 1})
        .options(unique)
        .build();
    let expiry_index = IndexModel::builder()
        .keys(doc! {"expire_at": 1})
        .options(
            IndexOptions::builder()
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build();
    Coll::<Challenge>::from_db(db)
        .create_indexes([nonce_index, expiry_index], None)
        .await?;

    Ok(())
}
