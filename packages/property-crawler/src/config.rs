use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CrawlerError, Result};
use crate::types::Tier;

const HOUR: u64 = 60 * 60;

/// Session-level crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Hard depth limit per seed
    pub max_depth: usize,
    /// Concurrent fetches allowed per domain
    pub parallelism: usize,
    /// Total visit tasks in flight across all domains
    pub workers: usize,
    /// Minimum delay between two requests to the same domain
    pub request_delay: Duration,
    pub fetch_timeout: Duration,
    pub max_age: Duration,
    pub ai_cooldown: Duration,
    pub enable_fingerprinting: bool,
    /// Tier used to gate persistence of property records
    pub strictness: Tier,
    /// Prior property count above which an unchanged page is still enriched
    pub busy_page_threshold: u32,
    pub user_agent: String,
    pub links: LinkPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            parallelism: 2,
            workers: 8,
            request_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(20),
            max_age: Duration::from_secs(24 * HOUR),
            ai_cooldown: Duration::from_secs(6 * HOUR),
            enable_fingerprinting: true,
            strictness: Tier::Strict,
            busy_page_threshold: 5,
            user_agent: "PropertyCrawler/1.0".to_string(),
            links: LinkPolicy::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `CRAWLER_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("CRAWLER_MAX_DEPTH")? {
            config.max_depth = v;
        }
        if let Some(v) = env_parse::<usize>("CRAWLER_PARALLELISM")? {
            config.parallelism = v;
        }
        if let Some(v) = env_parse::<usize>("CRAWLER_WORKERS")? {
            config.workers = v;
        }
        if let Some(v) = env_parse::<u64>("CRAWLER_REQUEST_DELAY_MS")? {
            config.request_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("CRAWLER_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("CRAWLER_MAX_AGE_HOURS")? {
            config.max_age = hours("CRAWLER_MAX_AGE_HOURS", v)?;
        }
        if let Some(v) = env_parse::<u64>("CRAWLER_AI_COOLDOWN_HOURS")? {
            config.ai_cooldown = hours("CRAWLER_AI_COOLDOWN_HOURS", v)?;
        }
        if let Some(v) = env_parse::<bool>("CRAWLER_ENABLE_FINGERPRINTING")? {
            config.enable_fingerprinting = v;
        }
        if let Some(v) = env_parse::<Tier>("CRAWLER_STRICTNESS")? {
            config.strictness = v;
        }
        if let Some(v) = env_parse::<u32>("CRAWLER_BUSY_PAGE_THRESHOLD")? {
            config.busy_page_threshold = v;
        }
        if let Ok(v) = std::env::var("CRAWLER_USER_AGENT") {
            config.user_agent = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(CrawlerError::Config("parallelism must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(CrawlerError::Config("workers must be > 0".into()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(CrawlerError::Config("fetch_timeout must be > 0".into()));
        }
        if self.links.budgets.is_empty() {
            return Err(CrawlerError::Config("link budgets must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_ai_cooldown(mut self, cooldown: Duration) -> Self {
        self.ai_cooldown = cooldown;
        self
    }

    pub fn with_fingerprinting(mut self, enabled: bool) -> Self {
        self.enable_fingerprinting = enabled;
        self
    }

    pub fn with_strictness(mut self, tier: Tier) -> Self {
        self.strictness = tier;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CrawlerError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn hours(key: &str, value: u64) -> Result<Duration> {
    value
        .checked_mul(HOUR)
        .map(Duration::from_secs)
        .ok_or_else(|| CrawlerError::Config(format!("{key} is too large: {value}")))
}

/// Link filtering and prioritization rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPolicy {
    /// Path keywords marking transactional/category links
    pub high_priority_keywords: Vec<String>,
    /// Path keywords marking institutional/navigational links
    pub low_priority_keywords: Vec<String>,
    /// Pages at or beyond this depth drop their low-priority links
    pub low_priority_drop_depth: usize,
    /// `(min_depth, budget)` pairs, ascending by depth
    pub budgets: Vec<(usize, usize)>,
    pub skip_extensions: Vec<String>,
    pub skip_schemes: Vec<String>,
    /// Hosts treated as social networks (never followed)
    pub social_hosts: Vec<String>,
    /// Upper bound on the session visited-set
    pub visited_capacity: usize,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            high_priority_keywords: strings(&[
                "venda", "aluguel", "alugar", "comprar", "imovel", "imoveis", "busca",
                "detalhes", "apartamento", "casa", "terreno", "lancamento",
            ]),
            low_priority_keywords: strings(&[
                "contato", "sobre", "quem-somos", "termos", "privacidade", "politica",
                "login", "cadastro", "blog", "noticias", "trabalhe-conosco", "faq",
            ]),
            low_priority_drop_depth: 4,
            budgets: vec![(0, 50), (2, 30), (4, 20), (6, 15), (8, 10)],
            skip_extensions: strings(&[
                "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "pdf", "doc", "docx",
                "xls", "xlsx", "zip", "rar", "mp4", "mp3", "css", "js", "json", "xml",
                "woff", "woff2", "ttf",
            ]),
            skip_schemes: strings(&["mailto", "tel", "javascript", "whatsapp", "sms", "ftp", "data"]),
            social_hosts: strings(&[
                "facebook.com", "instagram.com", "twitter.com", "x.com", "linkedin.com",
                "youtube.com", "wa.me", "api.whatsapp.com", "tiktok.com", "pinterest.com",
            ]),
            visited_capacity: 100_000,
        }
    }
}

impl LinkPolicy {
    /// Per-page link budget for a page at `depth`.
    pub fn budget_for_depth(&self, depth: usize) -> usize {
        self.budgets
            .iter()
            .rev()
            .find(|(min_depth, _)| depth >= *min_depth)
            .or_else(|| self.budgets.first())
            .map(|(_, budget)| *budget)
            .unwrap_or(0)
    }
}

/// Thresholds that differ between the permissive and strict tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Price mentions above which a page is a catalog
    pub price_catalog_threshold: usize,
    /// Room keyword repetitions above which a page is a catalog
    pub room_catalog_threshold: usize,
    /// Minimum blended score for a pattern-table verdict
    pub pattern_min_score: f32,
    /// Required score margin for a structural verdict
    pub structural_margin: f32,
    /// Property phrase matches required for a lexical property verdict
    pub min_property_phrases: usize,
}

impl TierThresholds {
    pub fn permissive() -> Self {
        Self {
            price_catalog_threshold: 5,
            room_catalog_threshold: 8,
            pattern_min_score: 0.1,
            structural_margin: 0.15,
            min_property_phrases: 1,
        }
    }

    pub fn strict() -> Self {
        Self {
            price_catalog_threshold: 3,
            room_catalog_threshold: 5,
            pattern_min_score: 0.25,
            structural_margin: 0.3,
            min_property_phrases: 2,
        }
    }
}

/// Phrase lists, selectors and thresholds for the page classifier.
///
/// Defaults encode Brazilian real-estate markup conventions. Load a JSON
/// file with [`ClassifierConfig::from_file`] to tune them per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub catalog_phrases: Vec<String>,
    pub property_phrases: Vec<String>,
    pub room_keywords: Vec<String>,
    pub detail_keywords: Vec<String>,
    pub price_pattern: String,
    pub address_patterns: Vec<String>,
    pub card_selectors: Vec<String>,
    pub gallery_selectors: Vec<String>,
    pub detail_selectors: Vec<String>,
    pub pagination_selectors: Vec<String>,
    pub filter_selectors: Vec<String>,
    pub lexical_confidence: f32,
    pub lexical_confidence_strong: f32,
    /// Gallery images needed before a gallery counts as a property signal
    pub min_gallery_images: usize,
    /// Repeated containers needed before they count as catalog cards
    pub min_repeated_cards: usize,
    pub permissive: TierThresholds,
    pub strict: TierThresholds,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            catalog_phrases: strings(&[
                "resultados encontrados",
                "imóveis encontrados",
                "ordenar por",
                "refine sua busca",
                "refinar busca",
                "filtrar resultados",
                "resultados da busca",
                "exibindo resultados",
                "nenhum resultado encontrado",
            ]),
            property_phrases: strings(&[
                "agendar visita",
                "código do imóvel",
                "cód. do imóvel",
                "referência do imóvel",
                "ficha do imóvel",
                "detalhes do imóvel",
                "características do imóvel",
                "quero visitar",
                "fale com o corretor",
                "compartilhar este imóvel",
                "simular financiamento",
            ]),
            room_keywords: strings(&["quarto", "quartos", "dormitório", "dormitórios", "suíte", "suítes"]),
            detail_keywords: strings(&[
                "área útil",
                "área total",
                "área construída",
                "condomínio",
                "iptu",
                "banheiro",
                "banheiros",
                "vaga",
                "vagas",
                "suíte",
                "m²",
                "andar",
                "mobiliado",
                "varanda",
            ]),
            price_pattern: r"r\$\s*\d{1,3}(?:\.\d{3})*(?:,\d{2})?".to_string(),
            address_patterns: strings(&[
                r"\b(?:rua|avenida|av\.|alameda|travessa|estrada|rodovia|praca)\s+[a-z0-9]",
                r"\b\d{5}-\d{3}\b",
            ]),
            card_selectors: strings(&[
                r#"[class*="card"]"#,
                r#"[class*="listing-item"]"#,
                r#"[class*="property-item"]"#,
                r#"[class*="imovel-item"]"#,
                r#"[class*="resultado"]"#,
                "article",
            ]),
            gallery_selectors: strings(&[
                r#"[class*="gallery"]"#,
                r#"[class*="galeria"]"#,
                r#"[class*="carousel"]"#,
                r#"[class*="slider"]"#,
                r#"[class*="swiper"]"#,
                r#"[class*="fotos"]"#,
            ]),
            detail_selectors: strings(&[
                r#"[class*="detail"]"#,
                r#"[class*="detalhe"]"#,
                r#"[class*="caracteristica"]"#,
                r#"[class*="ficha"]"#,
                "dl",
            ]),
            pagination_selectors: strings(&[
                r#"[class*="pagination"]"#,
                r#"[class*="paginacao"]"#,
                r#"[class*="pager"]"#,
                r#"a[rel="next"]"#,
                r#"link[rel="next"]"#,
            ]),
            filter_selectors: strings(&[
                r#"[class*="filter"]"#,
                r#"[class*="filtro"]"#,
                r#"select[name*="ordem"]"#,
                r#"select[name*="order"]"#,
            ]),
            lexical_confidence: 0.9,
            lexical_confidence_strong: 0.95,
            min_gallery_images: 3,
            min_repeated_cards: 3,
            permissive: TierThresholds::permissive(),
            strict: TierThresholds::strict(),
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self::permissive()
    }
}

impl ClassifierConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn thresholds(&self, tier: Tier) -> &TierThresholds {
        match tier {
            Tier::Permissive => &self.permissive,
            Tier::Strict => &self.strict,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
