//! The fixed option catalogs the child picks from.
//!
//! Three disjoint lists (heroes, worlds, quests) defined at compile time. Each
//! option carries the fragment that gets spliced into the generation prompts.

use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use std::fmt;

/// One selectable card in the catalog.
#[derive(Debug, PartialEq, Eq)]
pub struct StoryOption {
    pub id: &'static str,
    /// Label shown on the card.
    pub name: &'static str,
    /// Fragment spliced into the prompts.
    pub prompt: &'static str,
    pub icon: &'static str,
}

/// The three selection slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Hero,
    World,
    Quest,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Hero, Category::World, Category::Quest];

    /// The options available for this slot.
    pub fn options(self) -> &'static [StoryOption] {
        match self {
            Category::Hero => HEROES,
            Category::World => WORLDS,
            Category::Quest => QUESTS,
        }
    }

    /// Section heading as shown on the selection screen.
    pub fn title(self) -> &'static str {
        match self {
            Category::Hero => "1. Escolha seu Herói",
            Category::World => "2. Escolha um Mundo",
            Category::Quest => "3. Escolha uma Aventura",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Hero => write!(f, "herói"),
            Category::World => write!(f, "mundo"),
            Category::Quest => write!(f, "aventura"),
        }
    }
}

pub static HEROES: &[StoryOption] = &[
    StoryOption { id: "astronauta", name: "Astronauta", prompt: "um astronauta corajoso", icon: "🧑‍🚀" },
    StoryOption { id: "dinossauro", name: "Dinossauro", prompt: "um dinossauro amigável", icon: "🦕" },
    StoryOption { id: "fada", name: "Fada", prompt: "uma fada brilhante", icon: "🧚" },
    StoryOption { id: "cavaleiro", name: "Cavaleiro", prompt: "um cavaleiro valente", icon: "🛡️" },
    StoryOption { id: "pirata", name: "Pirata", prompt: "um pirata aventureiro", icon: "🏴‍☠️" },
    StoryOption { id: "robo", name: "Robô", prompt: "um robô super inteligente", icon: "🤖" },
];

pub static WORLDS: &[StoryOption] = &[
    StoryOption { id: "espaco", name: "Espaço", prompt: "no espaço sideral cheio de estrelas", icon: "🪐" },
    StoryOption { id: "floresta", name: "Floresta", prompt: "numa floresta encantada com árvores falantes", icon: "🌳" },
    StoryOption { id: "castelo", name: "Castelo", prompt: "em um castelo mágico nas nuvens", icon: "🏰" },
    StoryOption { id: "doce", name: "Terra dos Doces", prompt: "na Terra dos Doces, com rios de chocolate", icon: "🍭" },
    StoryOption { id: "subaquatico", name: "Fundo do Mar", prompt: "no fundo do mar, com peixes coloridos", icon: "🐠" },
    StoryOption { id: "vulcao", name: "Ilha do Vulcão", prompt: "numa ilha com um vulcão adormecido", icon: "🌋" },
];

pub static QUESTS: &[StoryOption] = &[
    StoryOption { id: "tesouro", name: "Achar um Tesouro", prompt: "encontrar um tesouro escondido", icon: "💰" },
    StoryOption { id: "amigo", name: "Salvar um Amigo", prompt: "salvar um amigo em perigo", icon: "🤝" },
    StoryOption { id: "estrela", name: "Pegar uma Estrela", prompt: "pegar uma estrela cadente", icon: "🌠" },
    StoryOption { id: "pocao", name: "Fazer uma Poção", prompt: "criar uma poção mágica", icon: "🧪" },
    StoryOption { id: "festa", name: "Organizar uma Festa", prompt: "organizar a melhor festa de aniversário", icon: "🎂" },
    StoryOption { id: "dragao", name: "Fazer amizade com um Dragão", prompt: "fazer amizade com um dragão sonolento", icon: "🐉" },
];

/// Looks up an option by exact id.
pub fn find(category: Category, id: &str) -> Option<&'static StoryOption> {
    category.options().iter().find(|o| o.id == id)
}

/// Resolves what the user typed into an option of `category`.
///
/// Accepts a 1-based position, an exact id, or a fuzzy match against the
/// display name. The best-scoring fuzzy candidate wins.
pub fn resolve(category: Category, query: &str) -> Option<&'static StoryOption> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let options = category.options();

    if let Ok(position) = query.parse::<usize>() {
        return position.checked_sub(1).and_then(|i| options.get(i));
    }
    if let Some(option) = find(category, &query.to_lowercase()) {
        return Some(option);
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    options
        .iter()
        .filter_map(|o| matcher.fuzzy_match(o.name, query).map(|score| (score, o)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, o)| o)
}
