use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::agent::image_gen::{HttpImageEndpoint, ImageEndpoint};
use crate::agent::Assistant;
use crate::config::AssistantConfig;
use crate::database::ProjectDatabase;
use crate::llm_client::{ChatProvider, LlmClient};
use crate::memory::MemoryStore;
use crate::personality::{spawn_decay_task, DECAY_INTERVAL};

pub struct BackendRuntime {
    pub config: AssistantConfig,
    pub assistant: Assistant,
    pub memory_store: MemoryStore,
    llm: Option<Arc<LlmClient>>,
}

pub struct BackendRuntimeBuilder {
    config: AssistantConfig,
    provider: Option<Arc<dyn ChatProvider>>,
    image_endpoint: Option<Arc<dyn ImageEndpoint>>,
}

impl BackendRuntimeBuilder {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            provider: None,
            image_endpoint: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_image_endpoint(mut self, endpoint: Arc<dyn ImageEndpoint>) -> Self {
        self.image_endpoint = Some(endpoint);
        self
    }

    /// Opens the project store and restores the last snapshot. A store that
    /// cannot be opened is the only fatal startup error.
    pub fn build(self) -> Result<BackendRuntime> {
        let config = self.config;

        let database = ProjectDatabase::new(&config.database_path).with_context(|| {
            format!("Failed to open project database at {}", config.database_path)
        })?;
        tracing::info!("Project database ready: {}", config.database_path);

        let memory_store = MemoryStore::new(&config.memory_path);
        let snapshot = memory_store.load();

        let (provider, llm): (Arc<dyn ChatProvider>, Option<Arc<LlmClient>>) =
            match self.provider {
                Some(provider) => (provider, None),
                None => {
                    let client = Arc::new(LlmClient::new(
                        config.llm_api_url.clone(),
                        config.llm_api_key.clone().unwrap_or_default(),
                        config.llm_model.clone(),
                        Duration::from_secs(config.llm_timeout_secs),
                    ));
                    (client.clone(), Some(client))
                }
            };

        let image_endpoint = self.image_endpoint.unwrap_or_else(|| {
            Arc::new(HttpImageEndpoint::new(Duration::from_secs(
                config.image.timeout_secs,
            )))
        });

        let assistant = Assistant::new(
            config.clone(),
            Arc::new(database),
            provider,
            image_endpoint,
            snapshot,
        );

        Ok(BackendRuntime {
            config,
            assistant,
            memory_store,
            llm,
        })
    }
}

impl BackendRuntime {
    pub fn bootstrap(config: AssistantConfig) -> Result<Self> {
        BackendRuntimeBuilder::new(config).build()
    }

    /// Logs whether the chat provider answers. The session runs either way.
    pub async fn probe_llm(&self) {
        let Some(client) = &self.llm else {
            return;
        };
        match client.ping().await {
            Ok(()) => tracing::info!(
                "LLM reachable at {} (model {})",
                self.config.llm_api_url,
                client.model()
            ),
            Err(e) => tracing::warn!(
                "LLM not reachable at {}: {:#}. Chat will use fallback replies.",
                self.config.llm_api_url,
                e
            ),
        }
    }

    pub fn spawn_decay(&self) -> JoinHandle<()> {
        spawn_decay_task(
            self.assistant.personality(),
            self.assistant.stop_flag(),
            DECAY_INTERVAL,
        )
    }

    /// Writes the session snapshot. Errors are logged, not returned.
    pub async fn persist(&self) {
        let snapshot = self.assistant.snapshot().await;
        match self.memory_store.save(&snapshot) {
            Ok(()) => tracing::info!("Session saved to {:?}", self.memory_store.path()),
            Err(e) => tracing::error!("Failed to save session: {:#}", e),
        }
    }
}
