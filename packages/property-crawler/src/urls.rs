//! URL normalization and host helpers.
//!
//! The normalized form is the key for the ledger, fingerprints and the
//! session visited-set.

use url::Url;

use crate::error::{CrawlerError, Result};

/// Two-label public suffixes under which the registrable domain has three labels.
const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "com.br", "net.br", "org.br", "imb.br", "adv.br", "blog.br", "eng.br", "gov.br",
    "co.uk", "org.uk", "com.ar", "com.mx", "com.pt", "com.au", "co.jp",
];

/// Parse and normalize a URL string.
pub fn normalize(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| CrawlerError::InvalidUrl {
        url: raw.to_string(),
    })?;
    normalize_url(&url)
}

/// Normalize a parsed URL: http(s) only, no fragment, no tracking params,
/// sorted query, no duplicate or trailing slashes, no index documents.
pub fn normalize_url(url: &Url) -> Result<Url> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(CrawlerError::InvalidUrl {
            url: url.to_string(),
        });
    }
    if url.host_str().is_none() {
        return Err(CrawlerError::InvalidUrl {
            url: url.to_string(),
        });
    }

    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let mut kept_params = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_query_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect::<Vec<_>>();
    kept_params.sort();

    if kept_params.is_empty() {
        normalized.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in kept_params {
            serializer.append_pair(&k, &v);
        }
        normalized.set_query(Some(&serializer.finish()));
    }

    normalized.set_path(&normalize_path(url.path()));
    Ok(normalized)
}

/// String form of [`normalize`], used as a storage key.
pub fn normalize_key(raw: &str) -> Result<String> {
    normalize(raw).map(|u| u.to_string())
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    while let Some(last) = segments.last() {
        let lower = last.to_ascii_lowercase();
        if !matches!(
            lower.as_str(),
            "index.html" | "index.htm" | "index.php" | "default.aspx"
        ) {
            break;
        }
        segments.pop();
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn is_tracking_query_param(param: &str) -> bool {
    let name = param.to_ascii_lowercase();
    if name.starts_with("utm_") || name.starts_with("gad_") {
        return true;
    }
    matches!(
        name.as_str(),
        "gclid"
            | "fbclid"
            | "gbraid"
            | "wbraid"
            | "_gl"
            | "mc_cid"
            | "mc_eid"
            | "ref"
            | "origem"
            | "source"
            | "sessionid"
            | "jsessionid"
            | "phpsessid"
    )
}

/// Host without a leading `www.`.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Registrable domain, e.g. `sp.imobiliaria.com.br` → `imobiliaria.com.br`.
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if SECOND_LEVEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// Same site, ignoring a `www.` prefix.
pub fn same_host(a: &Url, b: &Url) -> bool {
    host_key(a) == host_key(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_tracking_and_fragment() {
        let url = normalize("https://Imob.com.br/imovel/123/?utm_source=x&fbclid=y#fotos").unwrap();
        assert_eq!(url.as_str(), "https://imob.com.br/imovel/123");
    }

    #[test]
    fn test_sorts_query_params() {
        let a = normalize_key("https://imob.com.br/busca?tipo=casa&cidade=sp").unwrap();
        let b = normalize_key("https://imob.com.br/busca?cidade=sp&tipo=casa&utm_medium=z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_collapses_redundant_segments() {
        let a = normalize_key("https://imob.com.br//venda///apto-1/index.html").unwrap();
        assert_eq!(a, "https://imob.com.br/venda/apto-1");
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(normalize("mailto:corretor@imob.com.br").is_err());
        assert!(normalize("not a url").is_err());
    }

    #[test]
    fn test_base_domain() {
        assert_eq!(base_domain("sp.imobiliaria.com.br"), "imobiliaria.com.br");
        assert_eq!(base_domain("www.example.com"), "example.com");
        assert_eq!(base_domain("imobiliaria.com.br"), "imobiliaria.com.br");
    }

    #[test]
    fn test_same_host_ignores_www() {
        let a = Url::parse("https://www.imob.com.br/a").unwrap();
        let b = Url::parse("https://imob.com.br/b").unwrap();
        let c = Url::parse("https://outra.com.br/b").unwrap();
        assert!(same_host(&a, &b));
        assert!(!same_host(&a, &c));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            path in "(/[a-zA-Z0-9_.-]{0,8}){0,5}/?",
            query in proptest::option::of("[a-z]{1,5}=[a-zA-Z0-9 %+]{0,6}(&(utm_[a-z]{1,4}|[a-z]{1,5})=[a-z0-9]{0,4}){0,3}"),
            fragment in proptest::option::of("[a-z0-9]{0,6}"),
        ) {
            let mut raw = format!("https://Imob.Example.com.br{path}");
            if let Some(q) = query {
                raw.push('?');
                raw.push_str(&q);
            }
            if let Some(f) = fragment {
                raw.push('#');
                raw.push_str(&f);
            }

            if let Ok(once) = normalize(&raw) {
                let twice = normalize_url(&once).unwrap();
                prop_assert_eq!(once.as_str(), twice.as_str());
            }
        }
    }
}
