//! Fake-data catalog over the `fake` crate.

mod catalog;
mod locales;

use rand::RngCore;
use regex::Regex;

use crate::errors::GenerationError;

pub use locales::LocaleKey;

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

/// Locale-bound fake-data generator with `{{id}}` template expansion.
#[derive(Debug, Clone)]
pub struct Faker {
    locale: LocaleKey,
    placeholder: Regex,
}

impl Faker {
    pub fn new(locale: LocaleKey) -> Result<Self, GenerationError> {
        let placeholder = Regex::new(PLACEHOLDER_PATTERN).map_err(|err| {
            GenerationError::InvalidParams(format!("invalid placeholder pattern: {err}"))
        })?;
        Ok(Self {
            locale,
            placeholder,
        })
    }

    pub fn locale(&self) -> LocaleKey {
        self.locale
    }

    pub fn list_ids() -> &'static [&'static str] {
        catalog::ALL_IDS
    }

    pub fn supports(id: &str) -> bool {
        catalog::ALL_IDS.contains(&id)
    }

    pub fn generate(&self, id: &str, rng: &mut dyn RngCore) -> Result<String, GenerationError> {
        catalog::generate_value(id, self.locale, rng).ok_or_else(|| {
            GenerationError::InvalidParams(format!(
                "unsupported faker id '{}' for locale '{}'",
                id,
                self.locale.as_str()
            ))
        })
    }

    /// Replace every `{{id}}` placeholder with a fake value.
    pub fn expand(&self, template: &str, rng: &mut dyn RngCore) -> Result<String, GenerationError> {
        self.expand_with(template, rng, |_| None)
    }

    /// Like [`Faker::expand`], but `resolve` gets the first chance at each id.
    pub fn expand_with(
        &self,
        template: &str,
        rng: &mut dyn RngCore,
        mut resolve: impl FnMut(&str) -> Option<String>,
    ) -> Result<String, GenerationError> {
        let mut output = String::with_capacity(template.len());
        let mut last = 0;
        for captures in self.placeholder.captures_iter(template) {
            let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            output.push_str(&template[last..whole.start()]);
            match resolve(id.as_str()) {
                Some(value) => output.push_str(&value),
                None => output.push_str(&self.generate(id.as_str(), rng)?),
            }
            last = whole.end();
        }
        output.push_str(&template[last..]);
        Ok(output)
    }

    /// Placeholder ids in `template` that the catalog does not know.
    pub fn unknown_ids<'t>(&self, template: &'t str) -> Vec<&'t str> {
        self.placeholder
            .captures_iter(template)
            .filter_map(|captures| captures.get(1))
            .map(|id| id.as_str())
            .filter(|id| !Self::supports(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn every_catalog_id_generates_in_both_locales() {
        for locale in [LocaleKey::EnUs, LocaleKey::PtBr] {
            let faker = Faker::new(locale).expect("faker");
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            for id in Faker::list_ids() {
                let value = faker.generate(id, &mut rng).expect("value");
                assert!(!value.is_empty(), "{id} produced an empty value");
            }
        }
    }

    #[test]
    fn expand_fills_placeholders_and_keeps_literal_text() {
        let faker = Faker::new(LocaleKey::EnUs).expect("faker");
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let value = faker
            .expand("<{{ name.first_name }}> at {{address.city}}!", &mut rng)
            .expect("expand");
        assert!(value.starts_with('<'));
        assert!(value.ends_with('!'));
        assert!(!value.contains("{{"));
        assert!(value.contains("> at "));
    }

    #[test]
    fn expansion_is_reproducible_for_a_seed() {
        let faker = Faker::new(LocaleKey::PtBr).expect("faker");
        let template = "{{name.name}} <{{internet.email}}>";
        let first = faker
            .expand(template, &mut ChaCha8Rng::seed_from_u64(42))
            .expect("expand");
        let second = faker
            .expand(template, &mut ChaCha8Rng::seed_from_u64(42))
            .expect("expand");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let faker = Faker::new(LocaleKey::EnUs).expect("faker");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(faker.expand("{{nope.nothing}}", &mut rng).is_err());
        assert_eq!(faker.unknown_ids("{{nope.nothing}} {{lorem.word}}"), vec!["nope.nothing"]);
    }

    #[test]
    fn resolver_wins_over_catalog() {
        let faker = Faker::new(LocaleKey::EnUs).expect("faker");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let value = faker
            .expand_with("#{{index}}", &mut rng, |id| (id == "index").then(|| "3".to_string()))
            .expect("expand");
        assert_eq!(value, "#3");
    }
}
