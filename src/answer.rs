//! Prompt assembly and answer post-processing.
//!
//! Builds the generation prompt from retrieved context plus question, calls
//! the generation provider, and strips the prompt echo that naive
//! text-generation models produce. Every failure path degrades to a
//! diagnostic answer string — a provider outage never crashes the service
//! and never touches the vector store.

use crate::error::ProviderError;
use crate::generation::Generator;
use crate::retriever::{RetrievalOutcome, Retriever};

/// Instruction line of the generation prompt. The template wording is a
/// deployment choice; the structure (instruction, context, question, answer
/// cue) is the contract.
const PROMPT_INSTRUCTION: &str =
    "Você é um assistente que responde apenas com base no contexto fornecido.";

pub const EMPTY_KB_ANSWER: &str =
    "A base de conhecimento está vazia. Por favor, insira um contexto primeiro.";
pub const NO_CONTEXT_AVAILABLE: &str = "Sem contexto disponível.";
pub const NO_RELEVANT_CONTEXT: &str = "Nenhum contexto relevante encontrado.";

/// A fully assembled answer, ready for the transport layer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub context: String,
    /// Best similarity score; present only when context was found.
    pub score: Option<f32>,
}

/// Build the generation prompt for a retrieved context and a question.
pub fn assemble_prompt(context: &str, question: &str) -> String {
    format!(
        "{}\n\nContexto: {}\n\nPergunta: {}\n\nResposta:",
        PROMPT_INSTRUCTION, context, question
    )
}

/// Remove a prompt echo from raw generator output.
///
/// Text-generation models frequently return the prompt verbatim followed by
/// the continuation; when `raw` contains `prompt` literally, every
/// occurrence is removed and the remainder trimmed. Idempotent: a second
/// application is a no-op.
pub fn postprocess(raw: &str, prompt: &str) -> String {
    if !prompt.is_empty() && raw.contains(prompt) {
        raw.replace(prompt, "").trim().to_string()
    } else {
        raw.to_string()
    }
}

/// Run the full query path: retrieve, prompt, generate, post-process.
///
/// `Empty` and `BelowThreshold` outcomes map to their informational
/// messages; provider failures (embedding or generation) map to diagnostic
/// answers carrying the provider's error detail. Stateless per call.
pub async fn ask(
    retriever: &Retriever,
    generator: &dyn Generator,
    max_new_tokens: u32,
    temperature: f32,
    question: &str,
) -> Answer {
    let outcome = match retriever.retrieve(question).await {
        Ok(outcome) => outcome,
        Err(e) => return embedding_failure_answer(&e),
    };

    match outcome {
        RetrievalOutcome::Empty => Answer {
            answer: EMPTY_KB_ANSWER.to_string(),
            context: NO_CONTEXT_AVAILABLE.to_string(),
            score: None,
        },
        RetrievalOutcome::BelowThreshold { best_score } => {
            tracing::debug!(best_score = best_score as f64, "no passage cleared the relevance threshold");
            Answer {
                answer: format!(
                    "Desculpe, não encontrei informações suficientemente relevantes sobre \
                     '{}' na minha base de dados.",
                    question
                ),
                context: NO_RELEVANT_CONTEXT.to_string(),
                score: None,
            }
        }
        RetrievalOutcome::Found { context, passages } => {
            let best_score = passages[0].score;
            let prompt = assemble_prompt(&context, question);

            let answer = match generator.generate(&prompt, max_new_tokens, temperature).await {
                Ok(raw) => postprocess(&raw, &prompt),
                Err(e) => {
                    tracing::warn!(error = %e, "generation provider call failed");
                    format!("Erro ao gerar resposta: {}", e.detail)
                }
            };

            Answer {
                answer,
                context,
                score: Some(best_score),
            }
        }
    }
}

fn embedding_failure_answer(e: &ProviderError) -> Answer {
    tracing::warn!(error = %e, "embedding provider call failed");
    Answer {
        answer: format!("Erro ao consultar a base de conhecimento: {}", e.detail),
        context: NO_CONTEXT_AVAILABLE.to_string(),
        score: None,
    }
}
