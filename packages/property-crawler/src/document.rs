//! Parsed page representation and content feature extraction.
//!
//! A [`RawPage`] is parsed once into a [`PageDocument`]: visible text, outbound
//! links and the [`ContentFeatures`] that the classifier and the pattern
//! learner score against. `scraper::Html` never leaves this module.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::config::ClassifierConfig;
use crate::error::{CrawlerError, Result};
use crate::text::{count_phrase, count_words, fold, squash_whitespace};
use crate::types::RawPage;

/// Count- and structure-based signals for one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFeatures {
    pub price_count: usize,
    pub room_keyword_count: usize,
    pub detail_keyword_count: usize,
    /// Detail keyword hits per 100 words
    pub detail_density: f32,
    pub word_count: usize,
    pub link_count: usize,
    pub image_count: usize,
    pub has_pagination: bool,
    pub has_filters: bool,
    /// Size of the largest group of repeated link-bearing containers
    pub card_count: usize,
    pub gallery_images: usize,
    pub has_detail_block: bool,
    pub has_address: bool,
}

/// A fetched page after parsing
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub url: Url,
    pub final_url: Url,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    /// First paragraph long enough to describe the page
    pub lead_paragraph: Option<String>,
    /// Visible text, whitespace squashed, original case
    pub text: String,
    /// Visible text folded for matching (lowercase, no diacritics)
    pub folded_text: String,
    /// Absolute outbound links in document order, deduplicated
    pub links: Vec<Url>,
    pub features: ContentFeatures,
}

struct CompiledSelectors {
    body: Selector,
    title: Selector,
    meta_description: Selector,
    paragraph: Selector,
    anchor: Selector,
    image: Selector,
    cards: Vec<Selector>,
    galleries: Vec<Selector>,
    details: Vec<Selector>,
    pagination: Vec<Selector>,
    filters: Vec<Selector>,
}

/// Turns raw pages into [`PageDocument`]s using the classifier's vocabulary.
pub struct FeatureExtractor {
    selectors: CompiledSelectors,
    price: Regex,
    addresses: Vec<Regex>,
    href: Regex,
    room_keywords: Vec<String>,
    detail_keywords: Vec<String>,
    min_lead_paragraph: usize,
}

impl FeatureExtractor {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let selectors = CompiledSelectors {
            body: selector("body")?,
            title: selector("title")?,
            meta_description: selector(r#"meta[name="description"], meta[property="og:description"]"#)?,
            paragraph: selector("p")?,
            anchor: selector("a[href]")?,
            image: selector("img")?,
            cards: selectors(&config.card_selectors)?,
            galleries: selectors(&config.gallery_selectors)?,
            details: selectors(&config.detail_selectors)?,
            pagination: selectors(&config.pagination_selectors)?,
            filters: selectors(&config.filter_selectors)?,
        };

        // Patterns run against folded text, so configured casing must not matter
        let price = Regex::new(&format!("(?i){}", config.price_pattern))
            .map_err(|e| CrawlerError::Config(format!("invalid price pattern: {e}")))?;
        let addresses = config
            .address_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){p}"))
                    .map_err(|e| CrawlerError::Config(format!("invalid address pattern: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let href = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#)
            .map_err(|e| CrawlerError::Config(format!("invalid href pattern: {e}")))?;

        Ok(Self {
            selectors,
            price,
            addresses,
            href,
            room_keywords: config.room_keywords.iter().map(|k| fold(k)).collect(),
            detail_keywords: config.detail_keywords.iter().map(|k| fold(k)).collect(),
            min_lead_paragraph: 80,
        })
    }

    /// Parse a fetched page. Fails with [`CrawlerError::Parse`] when the body
    /// is empty or clearly not HTML.
    pub fn parse(&self, raw: &RawPage) -> Result<PageDocument> {
        check_parseable(raw)?;

        let html = Html::parse_document(&raw.body);
        let base = &raw.final_url;

        let text = match html.select(&self.selectors.body).next() {
            Some(body) => visible_text(body),
            None => visible_text(html.root_element()),
        };
        let folded_text = fold(&text);

        let title = html
            .select(&self.selectors.title)
            .next()
            .map(|t| squash_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let meta_description = html
            .select(&self.selectors.meta_description)
            .filter_map(|m| m.value().attr("content"))
            .map(squash_whitespace)
            .find(|d| !d.is_empty());

        let lead_paragraph = html
            .select(&self.selectors.paragraph)
            .map(|p| squash_whitespace(&p.text().collect::<String>()))
            .find(|p| p.chars().count() >= self.min_lead_paragraph);

        let mut seen = HashSet::new();
        let links: Vec<Url> = html
            .select(&self.selectors.anchor)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_href(base, href))
            .filter(|url| seen.insert(url.to_string()))
            .collect();

        let image_count = html.select(&self.selectors.image).count();
        let features = self.compute_features(&html, &folded_text, &links, image_count);

        Ok(PageDocument {
            url: raw.url.clone(),
            final_url: raw.final_url.clone(),
            title,
            meta_description,
            lead_paragraph,
            text,
            folded_text,
            links,
            features,
        })
    }

    /// Best-effort href scan for pages that failed to parse.
    pub fn lenient_links(&self, base: &Url, body: &str) -> Vec<Url> {
        let mut seen = HashSet::new();
        self.href
            .captures_iter(body)
            .filter_map(|cap| cap.get(1))
            .filter_map(|href| resolve_href(base, href.as_str()))
            .filter(|url| seen.insert(url.to_string()))
            .collect()
    }

    fn compute_features(
        &self,
        html: &Html,
        folded: &str,
        links: &[Url],
        image_count: usize,
    ) -> ContentFeatures {
        let word_count = folded.split_whitespace().count();
        let price_count = self.price.find_iter(folded).count();
        let room_keyword_count = self
            .room_keywords
            .iter()
            .map(|k| count_words(folded, k))
            .sum();
        let detail_keyword_count: usize = self
            .detail_keywords
            .iter()
            .map(|k| count_phrase(folded, k))
            .sum();
        let detail_density = if word_count == 0 {
            0.0
        } else {
            detail_keyword_count as f32 * 100.0 / word_count as f32
        };

        let has_pagination = any_match(html, &self.selectors.pagination)
            || links.iter().any(|l| looks_like_pagination(l));
        let has_filters = any_match(html, &self.selectors.filters);
        let has_detail_block = html_has_text_match(html, &self.selectors.details)
            || detail_keyword_count >= 3;
        let has_address = self.addresses.iter().any(|re| re.is_match(folded));

        ContentFeatures {
            price_count,
            room_keyword_count,
            detail_keyword_count,
            detail_density,
            word_count,
            link_count: links.len(),
            image_count,
            has_pagination,
            has_filters,
            card_count: self.repeated_cards(html),
            gallery_images: self.gallery_images(html),
            has_detail_block,
            has_address,
        }
    }

    /// Largest group of link-bearing containers sharing a class attribute.
    fn repeated_cards(&self, html: &Html) -> usize {
        let mut seen = HashSet::new();
        let mut groups: HashMap<String, usize> = HashMap::new();

        for sel in &self.selectors.cards {
            for el in html.select(sel) {
                if !seen.insert(el.id()) {
                    continue;
                }
                if el.select(&self.selectors.anchor).next().is_none() {
                    continue;
                }
                let key = el
                    .value()
                    .attr("class")
                    .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_else(|| el.value().name().to_string());
                *groups.entry(key).or_default() += 1;
            }
        }

        groups.values().copied().max().unwrap_or(0)
    }

    fn gallery_images(&self, html: &Html) -> usize {
        self.selectors
            .galleries
            .iter()
            .flat_map(|sel| html.select(sel))
            .map(|g| g.select(&self.selectors.image).count())
            .max()
            .unwrap_or(0)
    }
}

fn check_parseable(raw: &RawPage) -> Result<()> {
    let body = raw.body.trim_start();
    if body.is_empty() {
        return Err(CrawlerError::Parse {
            url: raw.url.to_string(),
            reason: "empty body".to_string(),
        });
    }
    if let Some(ct) = &raw.content_type {
        let ct = ct.to_ascii_lowercase();
        if !ct.contains("html") && !ct.contains("xml") && !body.starts_with('<') {
            return Err(CrawlerError::Parse {
                url: raw.url.to_string(),
                reason: format!("unsupported content type: {ct}"),
            });
        }
    }
    if !body.contains('<') {
        return Err(CrawlerError::Parse {
            url: raw.url.to_string(),
            reason: "no markup found".to_string(),
        });
    }
    Ok(())
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    base.join(href).ok()
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
                .map(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false);
            if !hidden {
                parts.push(text.to_string());
            }
        }
    }
    squash_whitespace(&parts.join(" "))
}

fn any_match(html: &Html, selectors: &[Selector]) -> bool {
    selectors.iter().any(|sel| html.select(sel).next().is_some())
}

fn html_has_text_match(html: &Html, selectors: &[Selector]) -> bool {
    selectors.iter().any(|sel| {
        html.select(sel)
            .any(|el| el.text().any(|t| !t.trim().is_empty()))
    })
}

fn looks_like_pagination(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.contains("/pagina/")
        || path.contains("/page/")
        || url
            .query_pairs()
            .any(|(k, _)| matches!(k.as_ref(), "page" | "pagina" | "pag" | "p"))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlerError::Config(format!("invalid selector {css}: {e:?}")))
}

fn selectors(css: &[String]) -> Result<Vec<Selector>> {
    css.iter().map(|s| selector(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&ClassifierConfig::default()).unwrap()
    }

    fn raw(url: &str, body: &str) -> RawPage {
        RawPage::new(Url::parse(url).unwrap(), body)
    }

    #[test]
    fn test_counts_prices_and_cards() {
        let cards: String = (0..4)
            .map(|i| {
                format!(
                    r#"<div class="card imovel"><a href="/imovel/{i}">Apto {i}</a> R$ {i}50.000 2 quartos</div>"#
                )
            })
            .collect();
        let body = format!(
            r#"<html><body><ul class="pagination"><li>1</li></ul>{cards}<a href="?pagina=2">2</a></body></html>"#
        );

        let doc = extractor().parse(&raw("https://imob.com.br/venda", &body)).unwrap();

        assert_eq!(doc.features.price_count, 4);
        assert_eq!(doc.features.card_count, 4);
        assert_eq!(doc.features.room_keyword_count, 4);
        assert!(doc.features.has_pagination);
        assert_eq!(doc.links.len(), 5);
    }

    #[test]
    fn test_ignores_script_text() {
        let body = r#"<html><body><script>var x = "R$ 1.000";</script><p>Casa</p></body></html>"#;
        let doc = extractor().parse(&raw("https://imob.com.br/casa", body)).unwrap();
        assert_eq!(doc.features.price_count, 0);
        assert_eq!(doc.text, "Casa");
    }

    #[test]
    fn test_gallery_and_details() {
        let body = r#"<html><body>
            <div class="galeria-fotos"><img src="1.jpg"><img src="2.jpg"><img src="3.jpg"><img src="4.jpg"></div>
            <ul class="detalhes"><li>Área útil 80 m²</li><li>Condomínio R$ 500</li></ul>
            <p>Rua das Flores, 120 - Centro</p>
        </body></html>"#;
        let doc = extractor().parse(&raw("https://imob.com.br/imovel/1", body)).unwrap();

        assert_eq!(doc.features.gallery_images, 4);
        assert!(doc.features.has_detail_block);
        assert!(doc.features.has_address);
    }

    #[test]
    fn test_parse_error_on_non_html() {
        let mut page = raw("https://imob.com.br/file", "%PDF-1.4 binary");
        page.content_type = Some("application/pdf".to_string());
        assert!(matches!(
            extractor().parse(&page),
            Err(CrawlerError::Parse { .. })
        ));
    }

    #[test]
    fn test_lenient_links() {
        let base = Url::parse("https://imob.com.br/lista").unwrap();
        let links = extractor().lenient_links(&base, r#"<a href="/a"><a href='#top'><a href="/a">"#);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "https://imob.com.br/a");
    }

    #[test]
    fn test_configured_price_pattern_ignores_case() {
        let config = ClassifierConfig {
            price_pattern: r"R\$\s*\d+".to_string(),
            address_patterns: vec![r"\bRua\s+\w".to_string()],
            ..ClassifierConfig::default()
        };
        let doc = FeatureExtractor::new(&config)
            .unwrap()
            .parse(&raw(
                "https://imob.com.br/imovel/9",
                "<html><body><p>R$ 510.000</p><p>Rua Harmonia, 9</p></body></html>",
            ))
            .unwrap();

        assert_eq!(doc.features.price_count, 1);
        assert!(doc.features.has_address);
    }
}
