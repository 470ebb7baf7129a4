use std::sync::Arc;
use std::time::Duration;

use crate::cache::{RecentQuestionCache, TtlCache};
use crate::config::Config;
use crate::llm::{ChatModel, OpenAiChatClient};
use crate::services::question_bank::QuestionBank;
use crate::services::question_selector::QuestionSelector;
use crate::services::session_service::SessionRegistry;
use crate::storage::HintStore;

pub struct AppState {
    pub config: Config,
    pub bank: Arc<QuestionBank>,
    pub selector: QuestionSelector,
    pub hint_store: Arc<HintStore>,
    /// Primary chat provider (hints, follow-ups).
    pub chat: Arc<dyn ChatModel>,
    /// Evaluation provider: the alternate one when configured, else primary.
    pub eval_chat: Arc<dyn ChatModel>,
    pub follow_up_cache: TtlCache<String>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client_timeout = Duration::from_millis(config.ai.client_timeout_ms);
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChatClient::new(
            config.ai.api_key.clone(),
            config.ai.base_url.clone(),
            client_timeout,
        )?);
        let eval_chat: Arc<dyn ChatModel> = match &config.ai.alt_api_key {
            Some(key) => Arc::new(OpenAiChatClient::new(
                Some(key.clone()),
                config.ai.alt_base_url.clone(),
                client_timeout,
            )?),
            None => chat.clone(),
        };

        Ok(Self::with_chat_models(config, chat, eval_chat))
    }

    /// State with injected chat backends; tests use this to count or stall
    /// upstream calls.
    pub fn with_chat_models(
        config: Config,
        chat: Arc<dyn ChatModel>,
        eval_chat: Arc<dyn ChatModel>,
    ) -> Self {
        let bank = Arc::new(QuestionBank::new(
            &config.bank.csv_path,
            &config.bank.open_ended_path,
            Duration::from_secs(config.cache.questions_ttl_secs),
        ));
        let recent = RecentQuestionCache::new(
            Duration::from_secs(config.cache.questions_ttl_secs),
            config.cache.recent_questions_max,
        );
        let selector = QuestionSelector::new(bank.clone(), recent, config.mix.clone());
        let hint_store = Arc::new(HintStore::new(
            &config.bank.hints_path,
            Duration::from_secs(config.cache.hints_ttl_secs),
        ));
        let follow_up_cache = TtlCache::new(Duration::from_secs(config.cache.follow_up_ttl_secs));

        Self {
            config,
            bank,
            selector,
            hint_store,
            chat,
            eval_chat,
            follow_up_cache,
            sessions: SessionRegistry::new(),
        }
    }
}

pub mod evaluation_service;
pub mod follow_up_service;
pub mod hint_service;
pub mod question_bank;
pub mod question_selector;
pub mod session_service;
