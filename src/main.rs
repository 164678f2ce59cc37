#[macro_use]
extern crate rocket;

use std::sync::Arc;
use std::time::Duration;

use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::{Request, Response};

use uptime_chopper::config::AppConfig;
use uptime_chopper::container::{self, ContainerClient};
use uptime_chopper::engine::Engine;
use uptime_chopper::notifier::Notifier;
use uptime_chopper::store::{SqliteStore, Store};
use uptime_chopper::{catchers, routes};

/// Sets `Access-Control-Allow-Origin` on every response. No `rocket_cors`
/// dependency: this is the whole CORS surface the HTTP API needs, so a
/// one-header fairing keeps the dependency list honest.
struct Cors(String);

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info { name: "CORS", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_raw_header("Access-Control-Allow-Origin", self.0.clone());
        response.set_raw_header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS");
        response.set_raw_header("Access-Control-Allow-Headers", "Content-Type");
    }
}

#[launch]
async fn rocket() -> _ {
    dotenvy::dotenv().ok();

    let config = AppConfig::load();

    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::new(&config.database_path).expect("failed to initialize database"));

    let container: Arc<dyn ContainerClient> = Arc::from(container::connect().await);

    let notifier = Arc::new(Notifier::new(config.legacy_webhooks.clone()));

    let engine = Arc::new(Engine::new(
        store.clone(),
        container.clone(),
        notifier,
        config.max_docker_log_bytes,
        Duration::from_secs(config.default_docker_log_since_secs),
    ));
    engine.start();

    let cors_origin = config.cors_origin.clone();
    let shutdown_engine = engine.clone();

    let (address, port) = config.listen_socket_addr();
    let figment = rocket::Config::figment()
        .merge(("address", address))
        .merge(("port", port));

    rocket::custom(figment)
        .manage(store)
        .manage(container)
        .manage(engine)
        .manage(config)
        .attach(Cors(cors_origin))
        .register(
            "/",
            catchers![
                catchers::bad_request,
                catchers::not_found,
                catchers::unprocessable_entity,
                catchers::internal_error,
                catchers::service_unavailable,
            ],
        )
        .mount(
            "/api",
            routes![
                routes::health,
                routes::list_monitors,
                routes::get_monitor,
                routes::create_monitor,
                routes::update_monitor,
                routes::delete_monitor,
                routes::pause_monitor,
                routes::resume_monitor,
                routes::get_history,
                routes::status_snapshot,
                routes::list_notifications,
                routes::get_notification,
                routes::create_notification,
                routes::update_notification,
                routes::delete_notification,
                routes::list_containers,
                routes::container_logs,
                routes::start_container,
                routes::stop_container,
                routes::restart_container,
                routes::update_restart_policy,
            ],
        )
        .attach(AdHoc::on_shutdown("Engine shutdown", move |_rocket| {
            Box::pin(async move {
                shutdown_engine.stop().await;
            })
        }))
}
