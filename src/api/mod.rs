use rocket::Route;

mod admin;
mod auth;
mod elections;
mod public;
mod voters;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(admin::routes());
    routes.extend(elections::routes());
    routes.extend(public::routes());
    routes.extend(voters::routes());
    routes.extend(voting::routes());
    routes
}
