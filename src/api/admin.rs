use chrono::Utc;
use mongodb::bson::{doc, to_bson};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{
                AdminListResponse, AdminProfile, DashboardSummary, ElectionReport,
                NewAdminRequest, ReportsResponse,
            },
            election::percentage,
        },
        auth::AdminSession,
        common::{election::ElectionStatus, permissions::{Permission, Permissions}},
        db::{
            admin::{Admin, NewAdmin},
            election::Election,
            vote::Vote,
            voter::Voter,
        },
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        set_permissions,
        dashboard,
        reports,
    ]
}

/// List all admin accounts.
#[get("/admin/admins")]
async fn get_admins(session: AdminSession, admins: Coll<Admin>) -> Result<Json<AdminListResponse>> {
    session.require(Permission::ManageAdmins)?;

    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    Ok(Json(AdminListResponse::new(
        admin_list.iter().map(Into::into).collect(),
    )))
}

/// Provision a new admin account.
#[post("/admin/admins", data = "<request>", format = "json")]
async fn create_admin(
    session: AdminSession,
    request: Json<NewAdminRequest>,
    new_admins: Coll<NewAdmin>,
    admins: Coll<Admin>,
) -> Result<Json<AdminProfile>> {
    session.require(Permission::ManageAdmins)?;

    let admin: NewAdmin = request.0.try_into()?;
    let new_id: Id = new_admins
        .insert_one(&admin, None)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::BadRequest("Username or wallet already in use".to_string())
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    let admin = admins
        .find_one(new_id.as_doc(), None)
        .await?
        .unwrap(); // Present because we just inserted it.
    Ok(Json((&admin).into()))
}

/// Replace an admin's permission record. Takes effect on their very next
/// request, since permissions are re-read from the database every time.
#[put("/admin/admins/<admin_id>/permissions", data = "<permissions>", format = "json")]
async fn set_permissions(
    session: AdminSession,
    admin_id: Id,
    permissions: Json<Permissions>,
    admins: Coll<Admin>,
) -> Result<Json<AdminProfile>> {
    session.require(Permission::ManageAdmins)?;

    let update = doc! {
        "$set": {
            "permissions": to_bson(&permissions.0)?,
        }
    };
    let result = admins.update_one(admin_id.as_doc(), update, None).await?;
    if result.matched_count != 1 {
        return Err(Error::not_found(format!("Admin {admin_id}")));
    }

    let admin = admins
        .find_one(admin_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Admin {admin_id}")))?;
    Ok(Json((&admin).into()))
}

/// Platform-wide counts.
#[get("/admin/dashboard")]
async fn dashboard(
    session: AdminSession,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
) -> Result<Json<DashboardSummary>> {
    session.require(Permission::ViewDashboard)?;

    // Status is derived, so active elections are counted in memory rather
    // than with a date-range filter.
    let now = Utc::now();
    let all_elections: Vec<Election> = elections.find(None, None).await?.try_collect().await?;
    let active = all_elections
        .iter()
        .filter(|election| election.status_at(now) == ElectionStatus::Active)
        .count() as u64;

    Ok(Json(DashboardSummary {
        success: true,
        elections: all_elections.len() as u64,
        active_elections: active,
        registered_voters: voters.count_documents(None, None).await?,
        votes_cast: votes.count_documents(None, None).await?,
    }))
}

/// Per-election turnout report.
#[get("/admin/reports")]
async fn reports(
    session: AdminSession,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
) -> Result<Json<ReportsResponse>> {
    session.require(Permission::ViewReports)?;

    let now = Utc::now();
    let all_elections: Vec<Election> = elections.find(None, None).await?.try_collect().await?;

    let mut report = Vec::with_capacity(all_elections.len());
    for election in &all_elections {
        let filter = doc! {
            "election_id": election.id,
        };
        let roster_size = voters.count_documents(filter.clone(), None).await?;
        let votes_cast = votes.count_documents(filter, None).await?;
        report.push(ElectionReport {
            id: election.id.to_hex(),
            title: election.title.clone(),
            status: election.status_at(now),
            roster_size,
            votes_cast,
            turnout: percentage(votes_cast, roster_size),
        });
    }

    Ok(Json(ReportsResponse::new(report)))
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
        api::{admin::AdminCredentials, auth::AdminLoginResponse, election::ElectionSpec},
        auth::AUTH_TOKEN_HEADER,
        db::admin::DEFAULT_ADMIN_USERNAME,
    };

    use super::*;

    #[backend_test(admin)]
    async fn create_and_list_admins(client: Client, token: String) {
        create_test_admin(&client, &token).await;

        let response = client
            .get(uri!(get_admins))
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: AdminListResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(body.success);
        let mut usernames: Vec<&str> = body.admins.iter().map(|a| a.username.as_str()).collect();
        usernames.sort_unstable();
        assert_eq!(
            usernames,
            vec![
                DEFAULT_ADMIN_USERNAME,
                AdminCredentials::example().username.as_str(),
                AdminCredentials::example2().username.as_str(),
            ]
        );
    }

    #[backend_test(admin)]
    async fn duplicate_usernames_are_rejected(client: Client, token: String) {
        create_test_admin(&client, &token).await;

        let response = client
            .post(uri!(create_admin))
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .body(serde_json::to_string(&observer_request()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(admin)]
    async fn permission_changes_apply_to_live_tokens(client: Client, token: String) {
        // Provision a read-only admin and log them in.
        let observer = create_test_admin(&client, &token).await;
        let response = client
            .post("/api/admin/login")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&AdminCredentials::example2()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let login: AdminLoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        // Read-only admins cannot create elections.
        let response = client
            .post("/api/elections")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, login.token.clone()))
            .body(serde_json::to_string(&ElectionSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        // Grant them everything.
        let observer_id: Id = observer.id.parse().unwrap();
        let response = client
            .put(uri!(set_permissions(observer_id)))
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .body(serde_json::to_string(&Permissions::all()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: AdminProfile =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.permissions, Permissions::all());

        // The same token now passes: permissions are fetched fresh.
        let response = client
            .post("/api/elections")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, login.token))
            .body(serde_json::to_string(&ElectionSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
    }

    #[backend_test(admin)]
    async fn missing_admins_are_404(client: Client, token: String) {
        let response = client
            .put(uri!(set_permissions(Id::new())))
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .body(serde_json::to_string(&Permissions::none()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn dashboard_reports_counts(client: Client, db: Database, token: String) {
        use crate::model::db::election::{ElectionCore, NewElection};

        Coll::<NewElection>::from_db(&db)
            .insert_one(&ElectionCore::example(), None)
            .await
            .unwrap();
        Coll::<NewElection>::from_db(&db)
            .insert_one(&ElectionCore::example_pending(), None)
            .await
            .unwrap();

        let response = client
            .get(uri!(dashboard))
            .header(Header::new(AUTH_TOKEN_HEADER, token.clone()))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: DashboardSummary =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(summary.elections, 2);
        assert_eq!(summary.active_elections, 1);
        assert_eq!(summary.registered_voters, 0);
        assert_eq!(summary.votes_cast, 0);

        let response = client
            .get(uri!(reports))
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: ReportsResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(body.success);
        assert_eq!(body.reports.len(), 2);
        assert!(body.reports.iter().all(|entry| entry.turnout == 0.0));
    }

    fn observer_request() -> NewAdminRequest {
        NewAdminRequest {
            name: "Election Observer".to_string(),
            username: AdminCredentials::example2().username,
            password: AdminCredentials::example2().password,
            wallet_address: None,
            permissions: Permissions::read_only(),
        }
    }

    async fn create_test_admin(client: &Client, token: &str) -> AdminProfile {
        let response = client
            .post(uri!(create_admin))
            .header(ContentType::JSON)
            .header(Header::new(AUTH_TOKEN_HEADER, token.to_string()))
            .body(serde_json::to_string(&observer_request()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }
}
