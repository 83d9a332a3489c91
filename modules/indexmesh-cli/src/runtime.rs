//! Wires C0 (config) into concrete C1/C2/C3 singletons (§3's control-flow
//! summary: "C10 starts the process, loads C0, constructs C1/C2/C3
//! singletons").

use std::time::Duration;

use indexmesh_common::{AccountState, Config, Source};
use indexmesh_embed::EmbeddingClient;
use indexmesh_sources::{GroupchatAdapter, MicroblogAdapter};
use indexmesh_store::{CollectionSpec, QdrantGateway, QdrantGatewayConfig};

const VECTOR_STORE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Runtime {
    pub gateway: QdrantGateway,
    pub embedder: EmbeddingClient,
    pub microblog_adapter: MicroblogAdapter,
    pub groupchat_adapter: GroupchatAdapter,
}

impl Runtime {
    pub fn bootstrap(config: &Config) -> anyhow::Result<Self> {
        let gateway = QdrantGateway::connect(QdrantGatewayConfig {
            url: config.vector_store_url.clone(),
            api_key: config.vector_store_api_key.clone(),
            timeout: VECTOR_STORE_TIMEOUT,
        })?;

        let embedder = EmbeddingClient::new(
            &config.embedding_api_key,
            &config.embedding_model,
            config.embedding_base_url.as_deref().unwrap_or("https://api.openai.com/v1"),
            config.embedding_dimensions,
            config.embedding_max_batch_size,
        );

        let microblog_adapter = MicroblogAdapter::new(&config.microblog_base_url, &config.microblog_bearer);
        let groupchat_adapter = GroupchatAdapter::new(&config.groupchat_base_url, &config.groupchat_session);

        Ok(Self {
            gateway,
            embedder,
            microblog_adapter,
            groupchat_adapter,
        })
    }

    pub async fn ensure_collection(&self, config: &Config) -> anyhow::Result<()> {
        use indexmesh_store::VectorStoreGateway;
        let spec = CollectionSpec::new(&config.vector_store_collection, config.embedding_dimensions);
        self.gateway.ensure_collection(&spec).await?;
        Ok(())
    }
}

pub fn default_microblog_states(config: &Config) -> Vec<AccountState> {
    config
        .microblog_accounts
        .iter()
        .map(|a| AccountState::new(Source::Microblog, a.handle.clone(), a.priority))
        .collect()
}

pub fn default_groupchat_states(config: &Config) -> Vec<AccountState> {
    config
        .groupchat_channels
        .iter()
        .map(|c| AccountState::new(Source::Groupchat, c.canonical_handle(), c.priority))
        .collect()
}

