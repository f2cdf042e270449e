//! Prompt templates for the three remote calls.

use crate::state::StoryRequest;

pub fn story_prompt(request: &StoryRequest) -> String {
    format!(
        "Escreva uma história infantil muito curta, simples e alegre para uma criança de 5 anos. \
         O herói é {}. A história acontece {}. A aventura do herói é {}. \
         A história deve ser mágica e divertida, com um final feliz. \
         Mantenha o texto com menos de 150 palavras.",
        request.hero.prompt, request.world.prompt, request.quest.prompt
    )
}

pub fn illustration_prompt(request: &StoryRequest) -> String {
    format!(
        "Uma ilustração de desenho animado fofa e vibrante para um livro de histórias infantil. \
         {} {} em uma missão para {}. \
         Estilo de arte simples, colorido e chapado, como um adesivo.",
        request.hero.prompt, request.world.prompt, request.quest.prompt
    )
}

/// Wraps the finished story with the narration tone instruction.
pub fn speech_prompt(story: &str) -> String {
    format!("Diga com uma voz amigável e animada: {story}")
}
