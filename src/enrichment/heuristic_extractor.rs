use super::{Extraction, Extractor};
use crate::error::MemoryResult;
use crate::keyword::tokenize;
use async_trait::async_trait;

/// Capitalized-word-run entity recognizer plus adjacent-pair relationships.
/// No NLP model — a cheap heuristic that gives `Search`'s entity sub-score
/// something to work with.
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    fn entities(content: &str) -> Vec<String> {
        let mut entities = Vec::new();
        let mut run: Vec<&str> = Vec::new();

        let flush = |run: &mut Vec<&str>, out: &mut Vec<String>| {
            if !run.is_empty() {
                out.push(run.join(" "));
                run.clear();
            }
        };

        for word in content.split_whitespace() {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            if trimmed.chars().next().is_some_and(|c| c.is_uppercase()) {
                run.push(trimmed);
            } else {
                flush(&mut run, &mut entities);
            }
        }
        flush(&mut run, &mut entities);

        entities.retain(|e| !e.is_empty());
        entities.dedup();
        entities
    }
}

#[async_trait]
impl Extractor for HeuristicExtractor {
    async fn extract(&self, content: &str) -> MemoryResult<Extraction> {
        let entities = Self::entities(content);
        let relationships = entities
            .windows(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        let keywords = tokenize(content);

        Ok(Extraction {
            entities,
            relationships,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_capitalized_runs_as_entities() {
        let extractor = HeuristicExtractor::new();
        let result = extractor
            .extract("Marie Curie met Albert Einstein in Paris")
            .await
            .unwrap();

        assert!(result.entities.contains(&"Marie Curie".to_string()));
        assert!(result.entities.contains(&"Albert Einstein".to_string()));
        assert!(result.entities.contains(&"Paris".to_string()));
    }

    #[tokio::test]
    async fn adjacent_entities_become_relationships() {
        let extractor = HeuristicExtractor::new();
        let result = extractor.extract("Marie Curie Albert Einstein").await.unwrap();
        assert_eq!(
            result.relationships,
            vec![("Marie Curie".to_string(), "Albert Einstein".to_string())]
        );
    }

    #[tokio::test]
    async fn no_capitalized_words_yields_no_entities() {
        let extractor = HeuristicExtractor::new();
        let result = extractor.extract("remember to buy milk tomorrow").await.unwrap();
        assert!(result.entities.is_empty());
        assert!(result.relationships.is_empty());
    }
}
