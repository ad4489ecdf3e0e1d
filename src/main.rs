use rocket::{Build, Rocket};

#[rocket::launch]
fn launch() -> Rocket<Build> {
    let rocket = agora_api::rocket();
    log::info!("Starting Agora API Server");
    rocket
}
