//! Prompt composition for the answering call.
//!
//! Two templates exist. `Grounded` is used whenever retrieval produced a
//! non-empty context block; `Fallback` answers from the chatbot's directive
//! alone and carries the logic-trigger hints instead.

use super::types::ContextBlock;
use crate::chatbot::ChatbotConfig;
use crate::history::{ConversationTurn, TurnRole};
use crate::llm::ChatMessage;

const EMPTY_HISTORY: &str = "This is the start of the conversation.";

const HTML_INSTRUCTIONS: &str = "Format your answer as simple HTML: wrap paragraphs in <p>, \
use <ul><li> for lists and <strong> for emphasis. Do not use Markdown. \
Do not include source URLs or links in your answer; sources are listed separately.";

const GROUNDED_INSTRUCTIONS: &str = "Answer using the retrieved knowledge below. \
Synthesize information across all relevant chunks rather than relying on a single one. \
If the knowledge only partly covers the question, say what is known and acknowledge what is missing. \
Do not invent facts that the knowledge does not support.";

const FALLBACK_INSTRUCTIONS: &str = "No knowledge base content matched this question. \
Answer helpfully in character, and say so when you do not know something specific.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Grounded,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub template: PromptTemplate,
    pub system: String,
    pub user: String,
}

impl ComposedPrompt {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system), ChatMessage::user(self.user)]
    }
}

pub struct PromptComposer;

impl PromptComposer {
    pub fn compose(
        chatbot: &ChatbotConfig,
        context: &ContextBlock,
        history: &[ConversationTurn],
        hints: &[String],
        question: &str,
    ) -> ComposedPrompt {
        let history_text = format_history(history);
        let question = question.trim();

        if context.is_empty() {
            let mut sections = vec![
                FALLBACK_INSTRUCTIONS.to_string(),
                format!("Conversation so far:\n{}", history_text),
            ];
            if !hints.is_empty() {
                sections.push(format!("Notes for this reply:\n{}", hints.join("\n")));
            }
            sections.push(HTML_INSTRUCTIONS.to_string());
            sections.push(format!("Question: {}", question));

            return ComposedPrompt {
                template: PromptTemplate::Fallback,
                system: system_prompt(chatbot),
                user: sections.join("\n\n"),
            };
        }

        let sections = [
            GROUNDED_INSTRUCTIONS.to_string(),
            context.text.clone(),
            format!("Conversation so far:\n{}", history_text),
            HTML_INSTRUCTIONS.to_string(),
            format!("Question: {}", question),
        ];

        ComposedPrompt {
            template: PromptTemplate::Grounded,
            system: system_prompt(chatbot),
            user: sections.join("\n\n"),
        }
    }
}

fn system_prompt(chatbot: &ChatbotConfig) -> String {
    let directive = chatbot.directive.trim();
    let identity = if chatbot.name.trim().is_empty() {
        "You are a helpful assistant.".to_string()
    } else {
        format!("You are {}, a helpful assistant.", chatbot.name.trim())
    };

    if directive.is_empty() {
        identity
    } else {
        format!("{}\n\n{}", identity, directive)
    }
}

/// Renders history as `User:` / `Assistant:` lines, oldest first.
pub fn format_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    history
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::User => "User",
                TurnRole::Bot => "Assistant",
            };
            format!("{}: {}", speaker, turn.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
