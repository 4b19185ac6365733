//! Text folding helpers shared by the feature extractor and the classifier.

/// Lowercase and strip Portuguese diacritics so that "Código do Imóvel" and
/// "codigo do imovel" compare equal.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count whole-word occurrences of `word` in already folded text.
pub fn count_words(folded: &str, word: &str) -> usize {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| *token == word)
        .count()
}

/// Count substring occurrences of `needle` in already folded text.
pub fn count_phrase(folded: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    folded.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents() {
        assert_eq!(fold("Código do Imóvel"), "codigo do imovel");
        assert_eq!(fold("AÇÃO"), "acao");
    }

    #[test]
    fn test_count_words_is_whole_word() {
        let text = fold("3 quartos, 1 quarto de serviço, quartoss");
        assert_eq!(count_words(&text, "quartos"), 1);
        assert_eq!(count_words(&text, "quarto"), 1);
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n\t b  "), "a b");
    }
}
