//! Prompt assembly for retrieval-augmented answers.
//!
//! With retrieved context the prompt reads:
//!
//! ```text
//! <CONTEXT_INSTRUCTIONS>
//!
//! ### Context from Knowledge Base:
//!
//! [Source: a.pdf, Relevance: 91%]
//! chunk text...
//!
//! [Source: b.md, Relevance: 78%]
//! chunk text...
//!
//! ### User Query:
//! <query>
//! ```
//!
//! Without context the `### Context` block is omitted entirely and the
//! query is wrapped in [`NO_CONTEXT_INSTRUCTIONS`].

use crate::models::RetrievalResult;

pub const CONTEXT_HEADER: &str = "### Context from Knowledge Base:";
pub const QUERY_HEADER: &str = "### User Query:";

pub const CONTEXT_INSTRUCTIONS: &str = "Based ONLY on the information provided in the context \
below, answer the user's query. If the context doesn't contain relevant information to answer \
the query, state that clearly. Include references to the source documents where appropriate.";

pub const NO_CONTEXT_INSTRUCTIONS: &str = "No relevant information was found in the knowledge \
base for this query. Answer the user's query from general knowledge and say that no supporting \
documents were found.";

/// Build the prompt sent to the chat model.
///
/// Results are rendered in the order given, each annotated with its source
/// file and relevance as a whole percentage.
pub fn build_prompt(query: &str, results: &[RetrievalResult]) -> String {
    let query = query.trim();
    if results.is_empty() {
        return format!("{}\n\n{}\n{}", NO_CONTEXT_INSTRUCTIONS, QUERY_HEADER, query);
    }

    let context = results
        .iter()
        .map(|r| {
            format!(
                "[Source: {}, Relevance: {}%]\n{}",
                r.chunk.source_file,
                relevance_percent(r.score),
                r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\n{}\n\n{}\n\n{}\n{}",
        CONTEXT_INSTRUCTIONS, CONTEXT_HEADER, context, QUERY_HEADER, query
    )
}

/// A similarity score as a whole percentage in `0..=100`.
pub fn relevance_percent(score: f32) -> i32 {
    ((score * 100.0) as i32).clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentChunk;

    fn result(source: &str, text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: DocumentChunk {
                id: "id".into(),
                text: text.into(),
                source_file: source.into(),
                chunk_index: 0,
                hash: String::new(),
                embedding: None,
            },
            score,
        }
    }

    #[test]
    fn empty_results_give_bare_query_without_context_markers() {
        let prompt = build_prompt("  What is Orinda?  ", &[]);
        assert_eq!(
            prompt,
            format!("{}\n\n### User Query:\nWhat is Orinda?", NO_CONTEXT_INSTRUCTIONS)
        );
        assert!(!prompt.contains(CONTEXT_HEADER));
        assert!(!prompt.contains("[Source:"));
    }

    #[test]
    fn context_block_keeps_retrieval_order_and_sources() {
        let results = vec![
            result("b.pdf", "second best", 0.91),
            result("a.md", "third best", 0.785),
        ];
        let prompt = build_prompt("question", &results);
        let first = prompt.find("[Source: b.pdf, Relevance: 91%]\nsecond best").unwrap();
        let second = prompt.find("[Source: a.md, Relevance: 78%]\nthird best").unwrap();
        assert!(first < second);
        assert!(prompt.starts_with(CONTEXT_INSTRUCTIONS));
        assert!(prompt.ends_with("### User Query:\nquestion"));
        assert!(prompt.find(CONTEXT_HEADER).unwrap() < first);
    }

    #[test]
    fn relevance_is_clamped() {
        assert_eq!(relevance_percent(1.2), 100);
        assert_eq!(relevance_percent(-0.3), 0);
    }
}
