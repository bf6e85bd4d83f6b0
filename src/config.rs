//! Process configuration, constructed once at startup and passed by
//! reference into every component.
//!
//! Values come from environment variables with sensible defaults; the
//! monitored-sites and search-query lists carry built-in defaults that
//! can be overridden from a YAML file (`--sources`). There is no ambient
//! global settings object: `main` builds one [`Config`] and injects it.

use serde::Deserialize;
use std::env;
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;

/// One monitored source site.
#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    pub name: String,
    pub url: String,
    /// "generalist" or "specialized"; used for attribution and summaries.
    pub category: String,
}

/// All pipeline configuration, read-only after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub text_model: String,
    pub image_model: String,

    /// Recency window for news search, in days.
    pub days_back: u32,
    /// Soft cap on results per search query, advisory for the oracle.
    pub search_result_limit: usize,
    pub max_concurrent_searches: usize,
    pub max_concurrent_scrapes: usize,
    pub max_concurrent_generations: usize,
    pub max_articles_per_run: usize,
    pub scrape_timeout: Duration,
    pub generation_timeout: Duration,
    pub daily_execution_hour: u32,

    pub article_min_words: usize,
    pub article_max_words: usize,
    pub image_aspect_ratio: String,
    pub image_size: String,

    pub sites: Vec<Site>,
    pub queries: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gemini_api_key: String::new(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            days_back: 7,
            search_result_limit: 20,
            max_concurrent_searches: 3,
            max_concurrent_scrapes: 5,
            max_concurrent_generations: 3,
            max_articles_per_run: 5,
            scrape_timeout: Duration::from_secs(60),
            generation_timeout: Duration::from_secs(60),
            daily_execution_hour: 9,
            article_min_words: 500,
            article_max_words: 800,
            image_aspect_ratio: "16:9".to_string(),
            image_size: "2K".to_string(),
            sites: default_sites(),
            queries: default_queries(),
        }
    }
}

impl Config {
    /// Build a configuration from environment variables over the defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            telegram_bot_token: env_string("TELEGRAM_BOT_TOKEN", ""),
            telegram_chat_id: env_string("TELEGRAM_CHAT_ID", ""),
            text_model: env_string("GEMINI_TEXT_MODEL", &defaults.text_model),
            image_model: env_string("GEMINI_IMAGE_MODEL", &defaults.image_model),
            days_back: env_parse("DAYS_BACK", defaults.days_back),
            search_result_limit: env_parse("SEARCH_RESULT_LIMIT", defaults.search_result_limit),
            max_concurrent_searches: env_parse(
                "MAX_CONCURRENT_SEARCHES",
                defaults.max_concurrent_searches,
            ),
            max_concurrent_scrapes: env_parse(
                "MAX_CONCURRENT_SCRAPES",
                defaults.max_concurrent_scrapes,
            ),
            max_concurrent_generations: env_parse(
                "MAX_CONCURRENT_GENERATIONS",
                defaults.max_concurrent_generations,
            ),
            max_articles_per_run: env_parse("MAX_ARTICLES_PER_RUN", defaults.max_articles_per_run),
            scrape_timeout: Duration::from_secs(env_parse("SCRAPE_TIMEOUT_SECS", 60u64)),
            generation_timeout: Duration::from_secs(env_parse("GENERATION_TIMEOUT_SECS", 60u64)),
            daily_execution_hour: env_parse("DAILY_EXECUTION_HOUR", defaults.daily_execution_hour),
            ..defaults
        }
    }

    /// Override the monitored sites and/or search queries from a YAML file.
    ///
    /// Either key may be omitted; the built-in defaults stay in place.
    pub fn apply_sources_file(&mut self, path: &str) -> Result<(), Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let file: SourcesFile = serde_yaml::from_str(&raw)?;
        if let Some(sites) = file.sites {
            for site in &sites {
                url::Url::parse(&site.url)
                    .map_err(|e| format!("invalid url for site '{}': {e}", site.name))?;
            }
            self.sites = sites;
        }
        if let Some(queries) = file.queries {
            self.queries = queries;
        }
        Ok(())
    }

    /// Names of required settings that are missing, empty if complete.
    pub fn validate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_empty() {
            missing.push("GEMINI_API_KEY");
        }
        if self.telegram_bot_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.telegram_chat_id.is_empty() {
            missing.push("TELEGRAM_CHAT_ID");
        }
        missing
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sites: Option<Vec<Site>>,
    queries: Option<Vec<String>>,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Sicilian food-news sites monitored by the scrape stage.
pub fn default_sites() -> Vec<Site> {
    let sites = [
        ("Giornale di Sicilia", "https://gds.it/food", "generalist"),
        (
            "LiveSicilia",
            "https://livesicilia.it/food-beverage",
            "generalist",
        ),
        ("Balarm", "https://balarm.it/food", "generalist"),
        ("BlogSicilia", "https://blogsicilia.it", "generalist"),
        (
            "Cronache di Gusto",
            "https://cronachedigusto.it",
            "specialized",
        ),
        (
            "Sicilia da Gustare",
            "https://siciliadagustare.com",
            "specialized",
        ),
        (
            "Culture & Terroir",
            "https://cultureandterroir.com/food",
            "specialized",
        ),
        (
            "Sapori e Saperi di Sicilia",
            "https://saporiesaperidisicilia.it/notizie",
            "specialized",
        ),
    ];
    sites
        .into_iter()
        .map(|(name, url, category)| Site {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
        })
        .collect()
}

/// Search queries issued by the research stage, in execution order.
pub fn default_queries() -> Vec<String> {
    [
        "novità food sicilia",
        "ristoranti sicilia",
        "gastronomia siciliana",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_editorial_settings() {
        let config = Config::default();
        assert_eq!(config.days_back, 7);
        assert_eq!(config.max_concurrent_scrapes, 5);
        assert_eq!(config.max_concurrent_generations, 3);
        assert_eq!(config.max_articles_per_run, 5);
        assert_eq!(config.scrape_timeout, Duration::from_secs(60));
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.sites.len(), 8);
        assert_eq!(config.queries.len(), 3);
    }

    #[test]
    fn validate_reports_missing_keys() {
        let config = Config::default();
        let missing = config.validate();
        assert!(missing.contains(&"GEMINI_API_KEY"));
        assert!(missing.contains(&"TELEGRAM_BOT_TOKEN"));
        assert!(missing.contains(&"TELEGRAM_CHAT_ID"));
    }

    #[test]
    fn validate_passes_when_complete() {
        let config = Config {
            gemini_api_key: "key".to_string(),
            telegram_bot_token: "token".to_string(),
            telegram_chat_id: "42".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn sources_file_overrides_sites_only() {
        let yaml = r#"
sites:
  - name: Test Site
    url: https://example.com
    category: generalist
"#;
        let dir = std::env::temp_dir().join("allfood_sicily_test_sources.yaml");
        std::fs::write(&dir, yaml).unwrap();

        let mut config = Config::default();
        config.apply_sources_file(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].name, "Test Site");
        // Queries keep their defaults.
        assert_eq!(config.queries.len(), 3);

        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn sources_file_rejects_invalid_site_url() {
        let yaml = r#"
sites:
  - name: Rotto
    url: "not a url"
    category: generalist
"#;
        let dir = std::env::temp_dir().join("allfood_sicily_test_bad_sources.yaml");
        std::fs::write(&dir, yaml).unwrap();

        let mut config = Config::default();
        assert!(config.apply_sources_file(dir.to_str().unwrap()).is_err());
        // Defaults stay untouched on failure.
        assert_eq!(config.sites.len(), 8);

        let _ = std::fs::remove_file(&dir);
    }
}
