use chrono::Utc;
use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminCredentials, AdminProfileResponse},
            auth::{
                AdminLoginResponse, ChallengeRequest, ChallengeResponse, SignatureLoginRequest,
                VoterLoginResponse,
            },
        },
        auth::{recover_address, AuthToken, Rights, VoterIdentity},
        common::{
            address::{InvalidAddress, WalletAddress},
            cedula::{Cedula, InvalidCedula},
        },
        db::{admin::Admin, challenge::Challenge},
        mongodb::{Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        voter_challenge,
        voter_verify,
        admin_login,
        admin_nonce,
        admin_verify_signature,
        admin_profile,
    ]
}

/// Issue a login challenge to a voter, gated on a valid cédula.
#[post("/auth/challenge", data = "<request>", format = "json")]
async fn voter_challenge(
    request: Json<ChallengeRequest>,
    challenges: Coll<Challenge>,
    config: &State<Config>,
) -> Result<Json<ChallengeResponse>> {
    let cedula: Cedula = request
        .cedula
        .parse()
        .map_err(|err: InvalidCedula| Error::BadRequest(err.to_string()))?;

    let challenge = Challenge::for_voter(cedula, config);
    let message = challenge.message();
    challenges.insert_one(&challenge, None).await?;

    Ok(Json(ChallengeResponse::new(message)))
}

/// Verify a signed voter challenge and issue a token.
#[post("/auth/verify", data = "<request>", format = "json")]
async fn voter_verify(
    request: Json<SignatureLoginRequest>,
    challenges: Coll<Challenge>,
    config: &State<Config>,
) -> Result<Json<VoterLoginResponse>> {
    let claimed: WalletAddress = request
        .address
        .parse()
        .map_err(|err: InvalidAddress| Error::BadRequest(err.to_string()))?;

    let challenge = consume_challenge(&challenges, &request.message, Rights::Voter).await?;
    verify_signature(&request.message, &request.signature, &claimed)?;

    // Voter challenges always carry the cédula that passed the ID gate.
    let cedula = challenge
        .cedula
        .ok_or_else(|| Error::Unauthorized("Challenge is not a voter challenge".to_string()))?;

    let voter = VoterIdentity {
        address: claimed,
        cedula,
    };
    let token = AuthToken::new(&voter).encode(config);
    Ok(Json(VoterLoginResponse::new(
        token,
        voter.address.as_str().to_string(),
    )))
}

/// Username/password admin login.
#[post("/admin/login", data = "<credentials>", format = "json")]
async fn admin_login(
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<Json<AdminLoginResponse>> {
    let filter = doc! {
        "username": credentials.username.trim().to_lowercase(),
    };
    let admin = admins
        .find_one(filter, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| Error::Unauthorized("Invalid username or password".to_string()))?;

    let token = AuthToken::new(&admin).encode(config);
    Ok(Json(AdminLoginResponse::new(token, (&admin).into())))
}

/// Issue a login challenge for an admin signature login.
#[get("/admin/nonce")]
async fn admin_nonce(
    challenges: Coll<Challenge>,
    config: &State<Config>,
) -> Result<Json<ChallengeResponse>> {
    let challenge = Challenge::for_admin(config);
    let message = challenge.message();
    challenges.insert_one(&challenge, None).await?;

    Ok(Json(ChallengeResponse::new(message)))
}

/// Verify a signed admin challenge and issue a token for the admin account
/// bound to the signing wallet.
#[post("/admin/verify-signature", data = "<request>", format = "json")]
async fn admin_verify_signature(
    request: Json<SignatureLoginRequest>,
    challenges: Coll<Challenge>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<Json<AdminLoginResponse>> {
    let claimed: WalletAddress = request
        .address
        .parse()
        .map_err(|err: InvalidAddress| Error::BadRequest(err.to_string()))?;

    consume_challenge(&challenges, &request.message, Rights::Admin).await?;
    verify_signature(&request.message, &request.signature, &claimed)?;

    let filter = doc! {
        "wallet_address": claimed.as_str(),
    };
    let admin = admins
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::Unauthorized("No admin account for this wallet".to_string()))?;

    let token = AuthToken::new(&admin).encode(config);
    Ok(Json(AdminLoginResponse::new(token, (&admin).into())))
}

/// The authenticated admin's own profile, fetched fresh.
#[get("/admin/profile")]
async fn admin_profile(
    token: AuthToken<Admin>,
    admins: Coll<Admin>,
) -> Result<Json<AdminProfileResponse>> {
    let id: Id = token
        .subject()
        .parse()
        .map_err(|_| Error::Unauthorized("Invalid authentication token".to_string()))?;
    let admin = admins
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Admin"))?;

    Ok(Json(AdminProfileResponse::new((&admin).into())))
}

/// Look up and delete the challenge embedded in a signed message.
///
/// Deleting on first sight is what makes challenges single-use; the expiry
/// check backstops the TTL reaper, which only runs periodically.
async fn consume_challenge(
    challenges: &Coll<Challenge>,
    message: &str,
    audience: Rights,
) -> Result<Challenge> {
    let nonce = Challenge::nonce_from_message(message, audience)
        .ok_or_else(|| Error::BadRequest("Malformed challenge message".to_string()))?;

    let filter = doc! {
        "nonce": nonce,
        "audience": audience,
    };
    let challenge = challenges
        .find_one_and_delete(filter, None)
        .await?
        .ok_or_else(|| Error::Unauthorized("Challenge not found or already used".to_string()))?;

    if challenge.expire_at < Utc::now() {
        return Err(Error::Unauthorized("Challenge expired".to_string()));
    }
    Ok(challenge)
}

/// Check that the message was signed by the claimed wallet.
fn verify_signature(message: &str, signature: &str, claimed: &WalletAddress) -> Result<()> {
    let recovered = recover_address(message, signature)
        .map_err(|err| Error::Unauthorized(err.to_string()))?;
    if recovered != *claimed {
        return Err(Error::Unauthorized(
            "Signature does not match address".to_string(),
        ));
    }
    Ok(())
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
        db::admin::NewAdmin,
    };

    use super::*;

    #[backend_test]
    async fn voter_challenge_verify_flow(client: Client) {
        // Request a challenge, separators and all.
        let message = request_challenge(&client, "012-3456789-0").await;
        assert!(message.starts_with("Iniciar sesión como votante: "));

        // Sign it and log in.
        let signature = testing::sign_message(&testing::TEST_KEY, &message);
        let address = testing::address(&testing::TEST_KEY);
        let response = client
            .post(uri!(voter_verify))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&SignatureLoginRequest {
                    address: address.as_str().to_string(),
                    signature: signature.clone(),
                    message: message.clone(),
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let login: VoterLoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(login.success);
        assert!(!login.token.is_empty());
        assert_eq!(login.address, address.as_str());

        // The same challenge cannot be used twice.
        let response = client
            .post(uri!(voter_verify))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&SignatureLoginRequest {
                    address: address.as_str().to_string(),
                    signature,
                    message,
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn challenge_rejects_invalid_cedulas(client: Client, db: Database) {
        for bad in ["99912345678", "0123456789", "not a cedula"] {
            let response = client
                .post(uri!(voter_challenge))
                .header(ContentType::JSON)
                .body(
                    serde_json::to_string(&ChallengeRequest {
                        cedula: bad.to_string(),
                    })
                    .unwrap(),
                )
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status(), "{bad}");
        }

        // No challenges were stored for the rejected requests.
        let count = Coll::<Challenge>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[backend_test]
    async fn mismatched_signature_gets_no_token(client: Client) {
        let message = request_challenge(&client, "01234567890").await;

        // Sign with one key but claim a different wallet.
        let other_key = [0x24; 32];
        let signature = testing::sign_message(&other_key, &message);
        let response = client
            .post(uri!(voter_verify))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&SignatureLoginRequest {
                    address: testing::address(&testing::TEST_KEY).as_str().to_string(),
                    signature,
                    message,
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn password_login_rejects_wrong_password(client: Client) {
        let response = client
            .post(uri!(admin_login))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&AdminCredentials::example_wrong()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn profile_returns_the_logged_in_admin(client: Client, token: String) {
        let response = client
            .get(uri!(admin_profile))
            .header(Header::new(AUTH_TOKEN_HEADER, token))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: AdminProfileResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(profile.admin.username, AdminCredentials::example().username);
    }

    #[backend_test]
    async fn profile_requires_a_token(client: Client) {
        let response = client.get(uri!(admin_profile)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn admin_signature_login(client: Client, db: Database) {
        // Bind an admin account to the test wallet.
        let admin = NewAdmin {
            wallet_address: Some(testing::address(&testing::TEST_KEY)),
            ..NewAdmin::example()
        };
        Coll::<NewAdmin>::from_db(&db)
            .insert_one(&admin, None)
            .await
            .unwrap();

        // Fetch a nonce.
        let response = client.get(uri!(admin_nonce)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let challenge: ChallengeResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(challenge
            .message
            .starts_with("Iniciar sesión como administrador: "));

        // Sign and verify.
        let signature = testing::sign_message(&testing::TEST_KEY, &challenge.message);
        let response = client
            .post(uri!(admin_verify_signature))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&SignatureLoginRequest {
                    address: testing::address(&testing::TEST_KEY).as_str().to_string(),
                    signature,
                    message: challenge.message,
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let login: AdminLoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(login.admin.username, admin.username);
    }

    async fn request_challenge(client: &Client, cedula: &str) -> String {
        let response = client
            .post(uri!(voter_challenge))
            .header(ContentType::JSON)
            .body(
                serde_json::to_string(&ChallengeRequest {
                    cedula: cedula.to_string(),
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let challenge: ChallengeResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(challenge.success);
        challenge.message
    }
}
