//! Content fingerprints computed from fetched pages.

use property_crawler::{
    content_hash, ClassifierConfig, FeatureExtractor, FieldExtractor, RawPage,
    RegexFieldExtractor, SalientFields,
};
use url::Url;

fn fields(html: &str) -> SalientFields {
    let raw = RawPage::new(Url::parse("https://imob.com.br/imovel/casa-551").unwrap(), html);
    let document = FeatureExtractor::new(&ClassifierConfig::default())
        .unwrap()
        .parse(&raw)
        .unwrap();
    RegexFieldExtractor::new().unwrap().extract(&document)
}

const LAYOUT_A: &str = r#"<html><head><title>Casa 3 quartos</title>
    <meta name="description" content="Casa térrea com quintal amplo e churrasqueira."></head>
    <body>
    <div class="price">R$ 720.000</div>
    <p class="endereco">Rua Augusta, 551 - Consolação</p>
    </body></html>"#;

const LAYOUT_B: &str = r#"<!doctype html><html><head>
    <title>Casa à venda | Imobiliária Exemplo</title>
    <meta name="description" content="Casa  térrea com quintal amplo e churrasqueira.">
    <script>window.__ts = 1718000000;</script></head>
    <body><nav><a href="/">Início</a><a href="/venda">Comprar</a></nav>
    <section class="hero"><span class="badge">Atualizado hoje</span>
    <h2 class="valor">R$ 720.000,00</h2></section>
    <div class="info"><p>Rua Augusta, 551 - Consolação</p></div>
    <footer>© 2026 Imobiliária Exemplo</footer>
    </body></html>"#;

#[test]
fn test_same_listing_in_different_markup_hashes_equal() {
    let a = fields(LAYOUT_A);
    let b = fields(LAYOUT_B);

    assert_ne!(a.title, b.title);
    assert_eq!(content_hash(&a), content_hash(&b));
}

#[test]
fn test_price_change_is_detected() {
    let changed = LAYOUT_A.replace("R$ 720.000", "R$ 699.000");
    assert_ne!(content_hash(&fields(LAYOUT_A)), content_hash(&fields(&changed)));
}

#[test]
fn test_address_change_is_detected() {
    let changed = LAYOUT_A.replace("Rua Augusta, 551", "Rua Augusta, 1551");
    assert_ne!(content_hash(&fields(LAYOUT_A)), content_hash(&fields(&changed)));
}
