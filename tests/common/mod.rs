use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use farepass::{
    ledger::default_fleet,
    notify::Notifier,
    page::MemoryPage,
    routes::router,
    state::AppState,
    submit::{FareDesk, FareSubmitter},
};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Serves `app` on an ephemeral local port and returns its base URL.
pub fn serve(app: Router) -> String {
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();

    tokio::spawn(server);

    format!("http://{addr}")
}

/// Starts the real fare server with the default fleet.
pub fn spawn_fare_server() -> String {
    std::env::set_var("JWT_SECRET", JWT_SECRET);

    serve(router(AppState::new(default_fleet()).shared()))
}

/// A base URL nothing listens on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind a free port");
    let addr = listener.local_addr().expect("free port address");
    drop(listener);

    format!("http://{addr}")
}

pub fn desk(base_url: &str, token: Option<String>) -> (Arc<MemoryPage>, FareDesk) {
    let page = Arc::new(MemoryPage::new());
    let submitter = FareSubmitter::new(reqwest::Client::new(), base_url).with_token(token);
    let desk = FareDesk::new(submitter, Notifier::new(page.clone()));

    (page, desk)
}
