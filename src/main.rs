use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classlive::config::ServerConfig;
use classlive::room::handlers;
use classlive::shared::AppState;
use classlive::websockets::{student_websocket, teacher_websocket};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classlive=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting classlive classroom monitoring server");

    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr();
    let cors = build_cors(&config);

    let app_state = AppState::new(config);

    let app = Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route("/room/:room_id/exists", get(handlers::room_exists))
        .route("/ws/teacher", get(teacher_websocket))
        .route("/ws/student/:room_id/:student_id", get(student_websocket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await.unwrap();
}

fn build_cors(config: &ServerConfig) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = Vec::new();
    for origin in &config.allowed_origins {
        match origin.parse() {
            Ok(value) => origins.push(value),
            Err(_) => warn!(origin = %origin, "Ignoring unparseable CORS origin"),
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
