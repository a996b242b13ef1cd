use std::sync::Arc;

use parley::providers::openai::OpenAiProvider;
use parley::session::InMemorySessionStore;
use parley::tools::ToolRegistry;
use parley::ChatAgent;
use parley_server::configuration::Settings;
use parley_server::logging::setup_logging;
use parley_server::routes;
use parley_server::state::AppState;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    let _guard = setup_logging(settings.logging.dir.as_deref())?;

    let addr = settings.server.socket_addr()?;
    let provider_config = settings.provider.into_config();
    let default_model = provider_config.model.model_name.clone();
    let provider = OpenAiProvider::from_config(provider_config)?;

    let tools = ToolRegistry::with_builtin_tools();
    info!(model = %default_model, tools = tools.len(), "starting parleyd");

    let agent = ChatAgent::new(Arc::new(provider), tools)
        .with_config(settings.agent.agent_config());
    let sessions = InMemorySessionStore::new(default_model, settings.agent.system_prompt);
    let app = routes::configure(AppState::new(agent, sessions));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
