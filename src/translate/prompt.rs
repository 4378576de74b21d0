use crate::config::TranslationConfig;
use crate::inference::{ChatMessage, ChatRequest, GenerationParams};
use super::TranslationRequest;

pub const SYSTEM_INSTRUCTION: &str = "You are a professional translator. Translate the given text accurately \
without adding explanations or answering questions. Only provide the translation.";

/// User instruction for a single translation
pub fn build_user_prompt(request: &TranslationRequest) -> String {
    let source = request.source_language.name();
    let target = request.target_language.name();

    if request.is_single_word {
        format!(
            "Translate the {} word \"{}\" to {}. Provide the translation and an example sentence.\n\
             \n\
             Format:\n\
             Translation: [word]\n\
             Example: [sentence]",
            source, request.source_text, target
        )
    } else {
        format!(
            "Translate this {} text to {}:\n\
             \n\
             \"{}\"\n\
             \n\
             Only provide the translation:",
            source, target, request.source_text
        )
    }
}

pub fn build_chat_request(request: &TranslationRequest, config: &TranslationConfig) -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(build_user_prompt(request)),
        ],
        params: GenerationParams {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: Some(config.top_p),
        },
    }
}
