//! URL path generalization.
//!
//! `/imovel/apartamento-3-quartos-copacabana-48213` and
//! `/imovel/casa-2-quartos-tijuca-50112` both become `/imovel/{slug}-{id}`.

use url::Url;

const ID: &str = "{id}";
const CODE: &str = "{code}";
const HASH: &str = "{hash}";
const SLUG: &str = "{slug}";

/// Generalized template for a URL's path and query keys.
pub fn path_template(url: &Url) -> String {
    let segments: Vec<String> = url
        .path_segments()
        .map(|s| {
            s.filter(|seg| !seg.is_empty())
                .map(generalize_segment)
                .collect()
        })
        .unwrap_or_default();

    let mut template = format!("/{}", segments.join("/"));

    let mut keys: Vec<String> = url
        .query_pairs()
        .map(|(k, _)| k.to_ascii_lowercase())
        .collect();
    keys.sort();
    keys.dedup();
    if !keys.is_empty() {
        template.push('?');
        template.push_str(&keys.join("&"));
    }

    template
}

fn generalize_segment(segment: &str) -> String {
    let lower = segment.to_ascii_lowercase();
    let (stem, ext) = match lower.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && matches!(ext, "html" | "htm" | "php" | "asp" | "aspx") =>
        {
            (stem.to_string(), format!(".{ext}"))
        }
        _ => (lower, String::new()),
    };

    format!("{}{}", generalize_stem(&stem), ext)
}

fn generalize_stem(stem: &str) -> String {
    if let Some(token) = generalize_token(stem) {
        return token.to_string();
    }

    let parts: Vec<&str> = stem.split(['-', '_']).filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return stem.to_string();
    }

    // Trailing identifier on a slug: "apartamento-3-quartos-48213"
    let last = parts[parts.len() - 1];
    if let Some(token) = generalize_token(last) {
        if parts.len() >= 3 || parts[..parts.len() - 1].iter().any(|p| p.len() > 3) {
            return format!("{SLUG}-{token}");
        }
    }

    if parts.len() >= 3 {
        return SLUG.to_string();
    }

    stem.to_string()
}

/// Placeholder for a single token, if it looks like an identifier.
fn generalize_token(token: &str) -> Option<&'static str> {
    if token.is_empty() {
        return None;
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return Some(ID);
    }
    if is_hash_like(token) {
        return Some(HASH);
    }

    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let has_alpha = token.chars().any(|c| c.is_ascii_alphabetic());
    if has_digit && has_alpha && token.len() <= 16 && token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(CODE);
    }

    None
}

fn is_hash_like(token: &str) -> bool {
    let stripped: String = token.chars().filter(|c| *c != '-').collect();
    stripped.len() >= 12
        && stripped.chars().all(|c| c.is_ascii_hexdigit())
        && stripped.chars().any(|c| c.is_ascii_digit())
        && stripped.chars().any(|c| c.is_ascii_alphabetic())
}

/// Similarity of two templates in `[0, 1]`.
///
/// Identical templates score 1.0. Otherwise templates must have the same
/// number of segments; the score is the share of equal segments, halved when
/// the query keys differ.
pub fn template_similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }

    let (a_path, a_query) = a.split_once('?').unwrap_or((a, ""));
    let (b_path, b_query) = b.split_once('?').unwrap_or((b, ""));

    let a_segments: Vec<&str> = a_path.split('/').filter(|s| !s.is_empty()).collect();
    let b_segments: Vec<&str> = b_path.split('/').filter(|s| !s.is_empty()).collect();
    if a_segments.len() != b_segments.len() || a_segments.is_empty() {
        return 0.0;
    }

    let equal = a_segments
        .iter()
        .zip(&b_segments)
        .filter(|(x, y)| x == y)
        .count();
    let mut score = equal as f32 / a_segments.len() as f32;
    if a_query != b_query {
        score *= 0.5;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(raw: &str) -> String {
        path_template(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_numeric_ids() {
        assert_eq!(template("https://imob.com.br/imovel/48213"), "/imovel/{id}");
    }

    #[test]
    fn test_slug_with_trailing_id() {
        assert_eq!(
            template("https://imob.com.br/imovel/apartamento-3-quartos-copacabana-48213"),
            "/imovel/{slug}-{id}"
        );
        assert_eq!(
            template("https://imob.com.br/imovel/casa-2-quartos-tijuca-50112"),
            "/imovel/{slug}-{id}"
        );
    }

    #[test]
    fn test_codes_and_hashes() {
        assert_eq!(template("https://imob.com.br/detalhes/AP1234"), "/detalhes/{code}");
        assert_eq!(
            template("https://imob.com.br/anuncio/3f2a9c1e-7b4d-4e8a-9f10-2c3d4e5f6a7b"),
            "/anuncio/{hash}"
        );
    }

    #[test]
    fn test_keeps_literal_segments_and_query_keys() {
        assert_eq!(
            template("https://imob.com.br/venda/detalhes.php?codigo=123&tipo=casa"),
            "/venda/detalhes.php?codigo&tipo"
        );
        assert_eq!(template("https://imob.com.br/"), "/");
    }

    #[test]
    fn test_template_similarity() {
        assert_eq!(template_similarity("/imovel/{id}", "/imovel/{id}"), 1.0);
        assert_eq!(template_similarity("/imovel/{id}", "/venda/{id}"), 0.5);
        assert_eq!(template_similarity("/imovel/{id}", "/imovel/{id}/fotos"), 0.0);
        assert_eq!(template_similarity("/imovel/{id}?a", "/imovel/{id}?b"), 0.5);
    }
}
