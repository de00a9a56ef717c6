//! Retrieval-augmented answering over indexed course material.
//!
//! Retrieved [`IndexHit`]s are rendered into a numbered context block, each
//! passage labelled with its document and pages so the model can cite them.

use crate::client::OllamaClient;
use crate::error::{OllamaError, OllamaResult};
use crate::types::{GenerateOptions, GenerateRequest};
use lectern_core::{ArtifactKind, Completer, IndexHit, PageRange};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Answer returned when nothing relevant was retrieved.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough information in the provided materials to answer this question.";

const EXCERPT_LEN: usize = 200;

/// A passage the answer was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub source_path: String,
    pub pages: PageRange,
    pub kind: ArtifactKind,
    /// Leading part of the passage text.
    pub excerpt: String,
    /// Cosine similarity to the question.
    pub score: f32,
}

impl SourceReference {
    pub fn from_hit(hit: &IndexHit) -> Self {
        Self {
            source_path: hit.metadata.source_path.clone(),
            pages: hit.metadata.pages,
            kind: hit.metadata.kind,
            excerpt: truncate_content(&hit.metadata.text, EXCERPT_LEN),
            score: hit.score,
        }
    }
}

/// Response from a RAG query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<SourceReference>,
}

/// Keep hits scoring at least `min_similarity`, best first.
pub fn relevant_hits(mut hits: Vec<IndexHit>, min_similarity: f32) -> Vec<IndexHit> {
    hits.retain(|hit| hit.score >= min_similarity);
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}

pub fn sources_for(hits: &[IndexHit]) -> Vec<SourceReference> {
    hits.iter().map(SourceReference::from_hit).collect()
}

/// Render hits as labelled passages separated by rules.
pub fn build_context(hits: &[IndexHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let figure = if hit.metadata.kind.is_image() {
                " (figure description)"
            } else {
                ""
            };
            format!(
                "[Source {}: {}, Page(s): {}{}]\n{}",
                i + 1,
                hit.metadata.source_path,
                hit.metadata.pages,
                figure,
                hit.metadata.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Build the user prompt for a question and its retrieved context.
pub fn build_rag_prompt(question: &str, hits: &[IndexHit]) -> String {
    format!(
        "Based on the following excerpts from my course materials, please answer my question.\n\n\
         CONTEXT FROM COURSE MATERIALS:\n{}\n\n\
         MY QUESTION: {}\n\n\
         Remember: Only use information from the context above. Include citations for all information.",
        build_context(hits),
        question
    )
}

/// Build the system prompt for RAG.
pub fn build_system_prompt() -> String {
    r#"You are a study assistant that answers questions only from the provided excerpts of course materials.

Guidelines:
- Use only information found in the context
- If the context is not enough, say "I don't have enough information in the provided materials to answer this question."
- Cite sources inline as [Source: file, Page(s): X]
- Start with a direct answer, then explain
- End with a short "Sources Used" list"#
        .to_string()
}

/// Answer `question` from `hits` with any answer-synthesis backend.
///
/// With no hits the model is not consulted.
pub async fn answer(
    completer: &dyn Completer,
    question: &str,
    hits: &[IndexHit],
) -> lectern_core::Result<RagResponse> {
    if hits.is_empty() {
        return Ok(RagResponse {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let prompt = build_rag_prompt(question, hits);
    let answer = completer.complete(&prompt, None).await?;

    Ok(RagResponse {
        answer,
        sources: sources_for(hits),
    })
}

impl OllamaClient {
    /// Perform a RAG query with streaming response.
    /// Returns a channel receiver for response chunks and the sources.
    pub async fn rag_query_stream(
        &self,
        question: &str,
        hits: &[IndexHit],
        model: &str,
        temperature: f32,
    ) -> OllamaResult<(mpsc::Receiver<String>, Vec<SourceReference>)> {
        if hits.is_empty() {
            return Err(OllamaError::NoContext);
        }

        let request = GenerateRequest::new(model, build_rag_prompt(question, hits))
            .with_system(build_system_prompt())
            .with_options(GenerateOptions::new().with_temperature(temperature));

        let rx = self.generate_stream(request).await?;
        Ok((rx, sources_for(hits)))
    }
}

/// Truncate content to at most `max_chars` characters, adding an ellipsis if cut.
fn truncate_content(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let truncated: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
