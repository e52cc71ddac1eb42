//! Keyword category tagging and gazetteer geo tagging.
//!
//! All matchers are compiled once from configuration into a [`Classifier`]
//! and reused for every entry in the run. Matching is whole-word and
//! case-insensitive over the concatenation of title and description.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use crate::models::{Gazetteer, GeoKind, GeoTag};
use crate::utils::registrable_domain;

/// Fallback region when neither the source nor the domain map supplies one.
const NATIONAL_REGION: &str = "Nasjonalt";

/// Compiled keyword and place-name matchers.
pub struct Classifier {
    categories: Vec<(String, Vec<Regex>)>,
    kommunar: Vec<(String, Regex)>,
    fylke: Vec<(String, Regex)>,
    domain_regions: HashMap<String, String>,
}

/// Whole-word, case-insensitive matcher for a single trigger word or phrase.
/// Words that fail to compile (pathological config input) are dropped with a
/// warning rather than failing the run.
fn word_matcher(word: &str) -> Option<Regex> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(word, error = %e, "Skipping unmatchable trigger word");
            None
        }
    }
}

impl Classifier {
    /// Compile matchers from the three classification configs.
    ///
    /// `keywords` maps category name to its trigger words; `gazetteer` holds
    /// municipality and county names; `domain_regions` maps registrable
    /// domain to a region name.
    pub fn new(
        keywords: BTreeMap<String, Vec<String>>,
        gazetteer: Gazetteer,
        domain_regions: HashMap<String, String>,
    ) -> Self {
        let categories = keywords
            .into_iter()
            .map(|(category, words)| {
                let matchers = words.iter().filter_map(|w| word_matcher(w)).collect();
                (category, matchers)
            })
            .collect();
        let compile_places = |names: Vec<String>| -> Vec<(String, Regex)> {
            names
                .into_iter()
                .filter_map(|name| word_matcher(&name).map(|re| (name, re)))
                .collect()
        };
        Classifier {
            categories,
            kommunar: compile_places(gazetteer.kommunar),
            fylke: compile_places(gazetteer.fylke),
            domain_regions,
        }
    }

    /// Categories whose trigger words match the text, sorted. A category is
    /// assigned on its first matching word; the rest are not evaluated.
    pub fn categories(&self, text: &str) -> Vec<String> {
        let matched: BTreeSet<&str> = self
            .categories
            .iter()
            .filter(|(_, matchers)| matchers.iter().any(|re| re.is_match(text)))
            .map(|(category, _)| category.as_str())
            .collect();
        matched.into_iter().map(str::to_string).collect()
    }

    /// Geographic tags for the text.
    ///
    /// Municipality and county hits are collected together; an entry may
    /// match several places. When the gazetteer matches nothing, exactly one
    /// `region` tag is emitted: the domain map's entry for the link's
    /// registrable domain, else the source default, else national.
    pub fn geo(&self, text: &str, link: &str, default_region: Option<&str>) -> Vec<GeoTag> {
        let mut hits: Vec<GeoTag> = Vec::new();
        for (name, re) in &self.kommunar {
            if re.is_match(text) {
                hits.push(GeoTag {
                    kind: GeoKind::Kommune,
                    name: name.clone(),
                });
            }
        }
        for (name, re) in &self.fylke {
            if re.is_match(text) {
                hits.push(GeoTag {
                    kind: GeoKind::Fylke,
                    name: name.clone(),
                });
            }
        }
        if !hits.is_empty() {
            return hits;
        }

        let region = self
            .domain_regions
            .get(&registrable_domain(link))
            .map(String::as_str)
            .or(default_region)
            .unwrap_or(NATIONAL_REGION);
        vec![GeoTag::region(region)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        let keywords = BTreeMap::from([
            (
                "samferdsle".to_string(),
                vec!["bru".to_string(), "veg".to_string(), "ferje".to_string()],
            ),
            (
                "skule".to_string(),
                vec!["skule".to_string(), "barnehage".to_string()],
            ),
        ]);
        let gazetteer = Gazetteer {
            kommunar: vec!["Voss".to_string(), "Kvam".to_string()],
            fylke: vec!["Vestland".to_string()],
        };
        let domain_regions = HashMap::from([(
            "avisa.no".to_string(),
            "Hardanger".to_string(),
        )]);
        Classifier::new(keywords, gazetteer, domain_regions)
    }

    #[test]
    fn test_categories_whole_word_only() {
        let c = classifier();
        assert_eq!(c.categories("Ny bru over fjorden"), vec!["samferdsle"]);
        // "brua" must not match the trigger "bru" as a substring.
        assert!(c.categories("Brua vart stengd").is_empty());
    }

    #[test]
    fn test_categories_case_insensitive_and_sorted() {
        let c = classifier();
        assert_eq!(
            c.categories("SKULE og VEG i same sak"),
            vec!["samferdsle", "skule"]
        );
    }

    #[test]
    fn test_categories_empty_on_no_match() {
        let c = classifier();
        assert!(c.categories("heilt urelatert tekst").is_empty());
    }

    #[test]
    fn test_geo_collects_kommune_and_fylke_hits() {
        let c = classifier();
        let tags = c.geo("Voss og Kvam i Vestland", "https://ukjent.no/sak", None);
        assert_eq!(tags.len(), 3);
        assert!(tags.contains(&GeoTag {
            kind: GeoKind::Kommune,
            name: "Voss".to_string()
        }));
        assert!(tags.contains(&GeoTag {
            kind: GeoKind::Fylke,
            name: "Vestland".to_string()
        }));
    }

    #[test]
    fn test_geo_gazetteer_suppresses_fallback() {
        let c = classifier();
        // avisa.no is in the domain map, but the gazetteer hit wins outright.
        let tags = c.geo("Nyhende frå Voss", "https://avisa.no/sak", Some("Indre"));
        assert_eq!(
            tags,
            vec![GeoTag {
                kind: GeoKind::Kommune,
                name: "Voss".to_string()
            }]
        );
    }

    #[test]
    fn test_geo_domain_fallback() {
        let c = classifier();
        let tags = c.geo("ingen stadnamn her", "https://www.avisa.no/sak", Some("Indre"));
        assert_eq!(tags, vec![GeoTag::region("Hardanger")]);
    }

    #[test]
    fn test_geo_source_default_then_national() {
        let c = classifier();
        let tags = c.geo("ingen stadnamn her", "https://ukjent.no/sak", Some("Indre"));
        assert_eq!(tags, vec![GeoTag::region("Indre")]);

        let tags = c.geo("ingen stadnamn her", "https://ukjent.no/sak", None);
        assert_eq!(tags, vec![GeoTag::region("Nasjonalt")]);
    }
}
