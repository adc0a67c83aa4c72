use bannerscope_core::fold_case;

/// Trigger phrases per language, as they appear on consent banners.
const BUILTIN: &[(&str, &[&str])] = &[
    ("fi", &["eväste", "salli", "kiellä", "hyväksy", "tunniste"]),
    ("en", &["cookie", "Accept", "Decline"]),
    ("es", &["cookie", "Aceptar", "Rechazar"]),
    ("fr", &["cookie", "Accepter", "Refuser"]),
    ("sv", &["cookie", "Godkänn", "Avvisa", "Neka", "Hantera", "kakor", "samtyck", "personuppgift"]),
];

#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<(String, Vec<String>)>,
}

impl Lexicon {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(lang, phrases)| (lang.to_string(), phrases.iter().map(|p| p.to_string()).collect()))
            .collect();
        Self { entries }
    }

    /// Adds phrases under a pseudo-language `extra`. Blank phrases are dropped.
    pub fn with_extra<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra: Vec<String> = phrases
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.trim().is_empty())
            .collect();
        if !extra.is_empty() {
            self.entries.push(("extra".to_string(), extra));
        }
        self
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(lang, _)| lang.as_str())
    }

    pub fn phrases_for(&self, language: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(lang, _)| lang == language)
            .map(|(_, phrases)| phrases.as_slice())
    }

    /// All phrases, case-folded and deduplicated, first occurrence first.
    pub fn folded_phrases(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for phrase in self.entries.iter().flat_map(|(_, phrases)| phrases) {
            let folded = fold_case(phrase.trim());
            if !out.contains(&folded) {
                out.push(folded);
            }
        }
        out
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_phrases_are_unique_and_folded() {
        let phrases = Lexicon::builtin().folded_phrases();
        assert_eq!(phrases.iter().filter(|p| *p == "cookie").count(), 1);
        assert!(phrases.contains(&"godkänn".to_string()));
        assert!(phrases.contains(&"accept".to_string()));
        assert!(phrases.iter().all(|p| *p == fold_case(p)));
        assert_eq!(phrases[0], "eväste");
    }

    #[test]
    fn extra_phrases_join_the_pool() {
        let lexicon = Lexicon::builtin().with_extra(["Zustimmen", "  ", "COOKIE"]);
        let phrases = lexicon.folded_phrases();
        assert!(phrases.contains(&"zustimmen".to_string()));
        assert_eq!(phrases.iter().filter(|p| *p == "cookie").count(), 1);
        assert_eq!(lexicon.phrases_for("extra").map(|p| p.len()), Some(2));
    }

    #[test]
    fn languages_are_listed() {
        let lexicon = Lexicon::builtin();
        let langs: Vec<&str> = lexicon.languages().collect();
        assert_eq!(langs, ["fi", "en", "es", "fr", "sv"]);
        assert!(lexicon.phrases_for("de").is_none());
    }
}
