pub mod ai_gateway;
pub mod api;
pub mod config;
pub mod errors;
pub mod llm_providers;
pub mod logging;
pub mod models;
pub mod store;

pub use ai_gateway::{AIGateway, RemoteAvailability};
pub use api::{AppState, create_app, create_router};
pub use config::Config;
pub use errors::*;
pub use llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType, JsonResponseParser};
pub use models::*;
pub use store::EventStore;
