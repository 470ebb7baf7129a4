use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub bank: BankConfig,
    pub ai: AiConfig,
    pub cache: CacheConfig,
    pub mix: MixConfig,
    pub test: TestConfig,
}

/// File locations of the read-only question bank and the persisted hint
/// store.
#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    pub csv_path: String,
    pub open_ended_path: String,
    pub hints_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Primary provider key. Absent means every model call takes its
    /// fallback path.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Alternate provider, preferred for answer evaluation when set.
    pub alt_api_key: Option<String>,
    pub alt_base_url: String,
    pub hints_model: String,
    pub follow_up_model: String,
    pub evaluation_model: String,
    pub hints_temperature: f32,
    pub follow_up_temperature: f32,
    pub evaluation_temperature: f32,
    pub hints_max_tokens: u32,
    pub follow_up_max_tokens: u32,
    pub evaluation_max_tokens: u32,
    pub hints_timeout_ms: u64,
    pub follow_up_timeout_ms: u64,
    pub evaluation_timeout_ms: u64,
    /// Connection-level timeout for the shared HTTP client.
    pub client_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub questions_ttl_secs: u64,
    pub hints_ttl_secs: u64,
    pub follow_up_ttl_secs: u64,
    pub recent_questions_max: usize,
}

/// Open-ended share of a selection, percent, per mode.
#[derive(Debug, Clone, Deserialize)]
pub struct MixConfig {
    pub prep_open_ended_percent: u32,
    pub test_open_ended_percent: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    pub questions_per_test: usize,
    pub time_warning_secs: u64,
    pub max_test_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let get_string = |key: &str, default: &str| {
            settings
                .get_string(key)
                .unwrap_or_else(|_| default.to_string())
        };
        let get_u64 = |key: &str, default: u64| {
            settings
                .get_string(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .or_else(|| settings.get_int(key).ok().map(|v| v as u64))
                .unwrap_or(default)
        };
        let get_f32 = |key: &str, default: f32| {
            settings
                .get_float(key)
                .map(|v| v as f32)
                .unwrap_or(default)
        };

        let port = settings
            .get_int("server.port")
            .ok()
            .map(|v| v as u16)
            .or_else(|| env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(8080);

        let bank = BankConfig {
            csv_path: get_string("bank.csv_path", "question_bank/qa_bank.csv"),
            open_ended_path: get_string("bank.open_ended_path", "question_bank/open_ended.json"),
            hints_path: get_string("bank.hints_path", "data/hints.json"),
        };

        let api_key = settings
            .get_string("ai.api_key")
            .ok()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            eprintln!("WARNING: no model provider API key configured; hint and follow-up generation will serve fallbacks");
        }
        let alt_api_key = settings
            .get_string("ai.alt_api_key")
            .ok()
            .or_else(|| env::var("DEEPSEEK_API_KEY").ok())
            .filter(|key| !key.is_empty());

        let ai = AiConfig {
            api_key,
            base_url: get_string("ai.base_url", "https://api.openai.com/v1"),
            alt_api_key,
            alt_base_url: get_string("ai.alt_base_url", "https://api.deepseek.com/v1"),
            hints_model: get_string("ai.hints_model", "gpt-3.5-turbo"),
            follow_up_model: get_string("ai.follow_up_model", "gpt-3.5-turbo"),
            evaluation_model: get_string("ai.evaluation_model", "gpt-3.5-turbo"),
            hints_temperature: get_f32("ai.hints_temperature", 0.2),
            follow_up_temperature: get_f32("ai.follow_up_temperature", 0.3),
            evaluation_temperature: get_f32("ai.evaluation_temperature", 0.2),
            hints_max_tokens: get_u64("ai.hints_max_tokens", 800) as u32,
            follow_up_max_tokens: get_u64("ai.follow_up_max_tokens", 400) as u32,
            evaluation_max_tokens: get_u64("ai.evaluation_max_tokens", 800) as u32,
            hints_timeout_ms: get_u64("ai.hints_timeout_ms", 20_000),
            follow_up_timeout_ms: get_u64("ai.follow_up_timeout_ms", 15_000),
            evaluation_timeout_ms: get_u64("ai.evaluation_timeout_ms", 20_000),
            client_timeout_ms: get_u64("ai.client_timeout_ms", 30_000),
        };

        let cache = CacheConfig {
            questions_ttl_secs: get_u64("cache.questions_ttl_secs", 300),
            hints_ttl_secs: get_u64("cache.hints_ttl_secs", 600),
            follow_up_ttl_secs: get_u64("cache.follow_up_ttl_secs", 1800),
            recent_questions_max: get_u64("cache.recent_questions_max", 20) as usize,
        };

        let mix = MixConfig {
            prep_open_ended_percent: get_u64("mix.prep_open_ended_percent", 20) as u32,
            test_open_ended_percent: get_u64("mix.test_open_ended_percent", 30) as u32,
        };

        let test = TestConfig {
            questions_per_test: get_u64("test.questions_per_test", 10) as usize,
            time_warning_secs: get_u64("test.time_warning_secs", 900),
            max_test_secs: get_u64("test.max_test_secs", 1200),
        };

        Ok(Config {
            port,
            bank,
            ai,
            cache,
            mix,
            test,
        })
    }
}
