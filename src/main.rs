use linkpulse::{config, logging, server};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    config::init_config();

    // Guard must outlive the server so buffered log lines flush on exit.
    let _log_guard = logging::init_logging(&config::get_config().logging);

    server::run_server().await
}
