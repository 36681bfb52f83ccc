use anyhow::Result;
use tracing::{info, warn};

use study_companion::{
    ai_gateway::{AIGateway, RemoteAvailability},
    api::{AppState, create_app},
    config::Config,
    log_system_event,
    logging::init_tracing,
    store::EventStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = init_tracing(&config.logging)?;

    log_system_event!(startup, component = "server", "Starting Study Companion server");
    config.log_configuration_summary();
    config.validate()?;

    // Decide once whether the completion service may be used at all
    let provider = config.llm.build_provider();
    let availability = RemoteAvailability::detect(provider.as_ref()).await;
    match &availability {
        RemoteAvailability::Available => info!(
            provider = ?config.llm.provider,
            "AI responses enabled"
        ),
        RemoteAvailability::Unavailable { reason } => warn!(
            reason = %reason,
            "AI responses disabled for this process - serving offline placeholders"
        ),
    }

    let gateway = AIGateway::new(provider, availability)
        .with_models(config.llm.chat_model.clone(), config.llm.quiz_model.clone());

    let store = EventStore::new(&config.storage.data_dir);
    store.ensure_initialized().await?;
    info!(path = %store.path().display(), "Event log ready");

    let state = AppState {
        gateway,
        store,
        debug: config.server.debug,
    };
    let app = create_app(state);

    let addr = config.server.address();
    log_system_event!(startup, component = "server", format!("listening on {}", addr));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
