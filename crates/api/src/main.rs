use std::sync::Arc;

#[tokio::main]
async fn main() {
    tally_observability::init();

    let services = tally_api::app::build_services().await;
    let app = tally_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
