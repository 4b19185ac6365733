use sha2::{Digest, Sha256};

use crate::text::fold;
use crate::types::SalientFields;

/// Content hash for change detection.
///
/// Only price, address and description contribute, each normalized first, so
/// markup, layout, tracking pixels and title tweaks never change the hash.
/// Normalization rules:
/// - price is reduced to whole currency units ("R$ 450.000,00" → "450000")
/// - text fields are folded (lowercase, no diacritics)
/// - punctuation is dropped and whitespace collapsed
pub fn content_hash(fields: &SalientFields) -> String {
    let price = fields.price.as_deref().map(normalize_price).unwrap_or_default();
    let address = fields.address.as_deref().map(normalize_text).unwrap_or_default();
    let description = fields
        .description
        .as_deref()
        .map(normalize_text)
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    for part in [price, address, description] {
        hasher.update(part.as_bytes());
        // Field separator so ("ab", "") and ("a", "b") differ
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

fn normalize_text(text: &str) -> String {
    fold(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Brazilian formatting: `.` groups thousands, `,` starts the cents.
fn normalize_price(price: &str) -> String {
    let whole = price.split(',').next().unwrap_or(price);
    let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(price: &str, address: &str, description: &str) -> SalientFields {
        SalientFields {
            title: None,
            price: Some(price.to_string()),
            address: Some(address.to_string()),
            description: Some(description.to_string()),
        }
    }

    #[test]
    fn test_price_formatting_ignored() {
        let a = fields("R$ 450.000,00", "Rua das Flores, 120", "Apartamento amplo");
        let b = fields("R$450.000", "Rua das Flores, 120", "Apartamento amplo");
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_case_accents_and_spacing_ignored() {
        let a = fields("R$ 450.000", "Praça da Sé, 10", "Ótimo  apartamento!");
        let b = fields("R$ 450.000", "praca da se 10", "otimo apartamento");
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_title_does_not_contribute() {
        let a = fields("R$ 450.000", "Rua A, 1", "Casa");
        let mut b = a.clone();
        b.title = Some("OFERTA RELÂMPAGO".to_string());
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_price_change_changes_hash() {
        let a = fields("R$ 450.000", "Rua A, 1", "Casa");
        let b = fields("R$ 430.000", "Rua A, 1", "Casa");
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_address_change_changes_hash() {
        let a = fields("R$ 450.000", "Rua A, 1", "Casa");
        let b = fields("R$ 450.000", "Rua B, 1", "Casa");
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_fields_do_not_bleed() {
        let a = SalientFields {
            address: Some("rua a".to_string()),
            description: None,
            ..Default::default()
        };
        let b = SalientFields {
            address: None,
            description: Some("rua a".to_string()),
            ..Default::default()
        };
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
