use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::backend::{GroundingChunk, GroundingSource};

pub const GROUNDING_OPEN: &str = ":::GROUNDING=";
pub const GROUNDING_CLOSE: &str = ":::";

const WEB_DEFAULT_TITLE: &str = "Web Source";
const MAP_DEFAULT_TITLE: &str = "Map Location";

/// One deduplicated evidence reference, as embedded in the citation block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn citation_from(source: &GroundingSource, kind: &str, default_title: &str) -> Citation {
    Citation {
        title: source
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title.to_string()),
        uri: source.uri.clone(),
        kind: kind.to_string(),
    }
}

/// Flatten grounding chunks into citations, deduplicated by `uri` with
/// first occurrence winning and insertion order preserved.
pub fn collect_citations(chunks: &[GroundingChunk]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();

    for chunk in chunks {
        if let Some(web) = &chunk.web {
            let citation = citation_from(web, "web", WEB_DEFAULT_TITLE);
            if !citations.iter().any(|c| c.uri == citation.uri) {
                citations.push(citation);
            }
        }
        if let Some(maps) = &chunk.maps {
            let citation = citation_from(maps, "map", MAP_DEFAULT_TITLE);
            if !citations.iter().any(|c| c.uri == citation.uri) {
                citations.push(citation);
            }
        }
    }

    citations
}

/// Append the machine-delimited citation block to reply text. The block is
/// display-only; the history normalizer strips it before any replay.
pub fn append_grounding_block(text: &str, citations: &[Citation]) -> String {
    if citations.is_empty() {
        return text.to_string();
    }

    match serde_json::to_string(citations) {
        Ok(json) => format!("{text}\n\n{GROUNDING_OPEN}{json}{GROUNDING_CLOSE}"),
        Err(err) => {
            warn!(error = %err, "failed to serialize citations; dropping block");
            text.to_string()
        }
    }
}

/// Recover citations from stored reply text, for display layers that need
/// them back out of the suffix block.
pub fn parse_grounding_block(text: &str) -> Option<Vec<Citation>> {
    let re = Regex::new(r"(?s):::GROUNDING=(.*?):::").unwrap();
    let json = re.captures(text)?.get(1)?.as_str();
    serde_json::from_str(json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web(title: Option<&str>, uri: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(GroundingSource {
                title: title.map(str::to_string),
                uri: uri.to_string(),
            }),
            maps: None,
        }
    }

    fn map(title: Option<&str>, uri: &str) -> GroundingChunk {
        GroundingChunk {
            web: None,
            maps: Some(GroundingSource {
                title: title.map(str::to_string),
                uri: uri.to_string(),
            }),
        }
    }

    #[test]
    fn dedups_by_uri_keeping_first_seen_order() {
        let chunks = vec![
            web(Some("A"), "https://a"),
            web(Some("B"), "https://b"),
            web(Some("A again"), "https://a"),
            map(Some("Cafe"), "https://maps/cafe"),
            web(Some("B again"), "https://b"),
        ];

        let citations = collect_citations(&chunks);
        let uris: Vec<&str> = citations.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(uris, vec!["https://a", "https://b", "https://maps/cafe"]);
        assert_eq!(citations[0].title, "A");
    }

    #[test]
    fn missing_titles_get_per_type_defaults() {
        let citations = collect_citations(&[web(None, "https://a"), map(Some("  "), "https://m")]);
        assert_eq!(citations[0].title, "Web Source");
        assert_eq!(citations[0].kind, "web");
        assert_eq!(citations[1].title, "Map Location");
        assert_eq!(citations[1].kind, "map");
    }

    #[test]
    fn block_round_trips_through_text() {
        let citations = collect_citations(&[web(Some("Doc"), "https://a")]);
        let annotated = append_grounding_block("The answer.", &citations);

        assert!(annotated.starts_with("The answer."));
        assert!(annotated.contains(GROUNDING_OPEN));

        let recovered = parse_grounding_block(&annotated).unwrap();
        assert_eq!(recovered, citations);
    }

    #[test]
    fn empty_set_appends_nothing() {
        assert_eq!(append_grounding_block("reply", &[]), "reply");
        assert!(parse_grounding_block("reply").is_none());
    }
}
