//! Regex-based salient field extraction.

use regex::Regex;

use crate::document::PageDocument;
use crate::error::{CrawlerError, Result};
use crate::text::{fold, squash_whitespace};
use crate::traits::FieldExtractor;
use crate::types::SalientFields;

const PRICE_PATTERN: &str = r"(?i)R\$\s*\d{1,3}(?:\.\d{3})*(?:,\d{2})?";
const ADDRESS_PATTERN: &str =
    r"(?i)\b(?:rua|avenida|av\.|alameda|travessa|estrada|rodovia|praça|praca)\s+[^,;|\n]{2,60}(?:,\s*\d+)?";

/// Prices preceded by one of these are fees, not the asking price.
const FEE_MARKERS: &[&str] = &["condominio", "iptu", "taxa"];

/// Extracts price, address and description from visible text and meta tags.
pub struct RegexFieldExtractor {
    price: Regex,
    address: Regex,
}

impl RegexFieldExtractor {
    pub fn new() -> Result<Self> {
        let price = Regex::new(PRICE_PATTERN)
            .map_err(|e| CrawlerError::Config(format!("invalid price pattern: {e}")))?;
        let address = Regex::new(ADDRESS_PATTERN)
            .map_err(|e| CrawlerError::Config(format!("invalid address pattern: {e}")))?;
        Ok(Self { price, address })
    }

    fn asking_price(&self, text: &str) -> Option<String> {
        let mut first = None;
        let mut last_end = 0;
        for m in self.price.find_iter(text) {
            // Only look back to the previous price
            let gap = &text[last_end..m.start()];
            let skip = gap.chars().count().saturating_sub(24);
            let before = fold(&gap.chars().skip(skip).collect::<String>());
            last_end = m.end();

            if FEE_MARKERS.iter().any(|marker| before.contains(marker)) {
                first.get_or_insert_with(|| m.as_str().to_string());
                continue;
            }
            return Some(m.as_str().to_string());
        }
        first
    }
}

impl FieldExtractor for RegexFieldExtractor {
    fn extract(&self, document: &PageDocument) -> SalientFields {
        let text = &document.text;

        let address = self
            .address
            .find(text)
            .map(|m| squash_whitespace(m.as_str().trim_end_matches(['-', ' '])));

        let description = document
            .meta_description
            .clone()
            .or_else(|| document.lead_paragraph.clone());

        SalientFields {
            title: document.title.clone(),
            price: self.asking_price(text),
            address,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::document::FeatureExtractor;
    use crate::types::RawPage;
    use url::Url;

    fn document(body: &str) -> PageDocument {
        let raw = RawPage::new(Url::parse("https://imob.com.br/imovel/1").unwrap(), body);
        FeatureExtractor::new(&ClassifierConfig::default())
            .unwrap()
            .parse(&raw)
            .unwrap()
    }

    #[test]
    fn test_extracts_salient_fields() {
        let doc = document(
            r#"<html><head><title>Apartamento 3 quartos</title>
            <meta name="description" content="Apartamento com vista para o mar"></head>
            <body><p>Condomínio R$ 800</p><h2>R$ 450.000,00</h2>
            <p>Avenida Atlântica, 1500 - Copacabana</p></body></html>"#,
        );
        let fields = RegexFieldExtractor::new().unwrap().extract(&doc);

        assert_eq!(fields.title.as_deref(), Some("Apartamento 3 quartos"));
        assert_eq!(fields.price.as_deref(), Some("R$ 450.000,00"));
        assert_eq!(fields.address.as_deref(), Some("Avenida Atlântica, 1500"));
        assert_eq!(
            fields.description.as_deref(),
            Some("Apartamento com vista para o mar")
        );
    }

    #[test]
    fn test_fee_only_price_is_kept_as_fallback() {
        let doc = document("<html><body><p>IPTU R$ 120</p></body></html>");
        let fields = RegexFieldExtractor::new().unwrap().extract(&doc);
        assert_eq!(fields.price.as_deref(), Some("R$ 120"));
    }

    #[test]
    fn test_empty_page_yields_empty_fields() {
        let doc = document("<html><body><p>Bem-vindo</p></body></html>");
        let fields = RegexFieldExtractor::new().unwrap().extract(&doc);
        assert!(fields.is_empty());
    }
}
