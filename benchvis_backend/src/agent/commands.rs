//! Classification of one utterance into exactly one [`Command`].
//!
//! Matching runs on the trimmed, lowercased text; arguments are sliced from the
//! trimmed original so names keep their case. Groups are tried in a fixed
//! priority order and the first match wins.

use regex_lite::Regex;
use std::sync::OnceLock;

use crate::config::InputMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    ListProfiles,
    SwitchProfile(String),
    /// `perfil` with nothing after it
    MissingProfileName,
    ToggleAi,
    SwitchMode(InputMode),
    NewProject(String),
    /// `projeto novo` with no name
    MissingProjectName,
    ListProjects,
    DeleteProject(i64),
    /// `deletar projeto` without a numeric id
    BadDeleteArgs,
    ListComponents(i64),
    /// `componentes do projeto` without a numeric id
    BadComponentArgs,
    AddComponent {
        project_id: i64,
        quantity: i64,
        name: String,
    },
    BadAddComponentArgs,
    ListSteps(i64),
    /// `etapas do projeto` without a numeric id
    BadStepArgs,
    AddStep {
        project_id: i64,
        description: String,
    },
    BadAddStepArgs,
    SaveCode(i64),
    BadSaveCodeArgs,
    GenerateImage(String),
    MissingImageDescription,
    Fact,
    Advice,
    Joke,
    GenerateCode(String),
    MissingCodeDescription,
    Chat(String),
    /// Blank input
    Empty,
}

impl Command {
    /// Session-control commands are not counted as interactions.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            Command::Quit
                | Command::Help
                | Command::ListProfiles
                | Command::SwitchProfile(_)
                | Command::MissingProfileName
                | Command::ToggleAi
                | Command::SwitchMode(_)
                | Command::Empty
        )
    }
}

const EXIT_PHRASES: &[&str] = &["sair", "tchau", "encerrar", "exit"];
const FACT_WORDS: &[&str] = &["fato", "curiosidade"];

fn first_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Text after `prefix`, taken from the original (case-preserved) input.
///
/// `lowered` and `original` must be the same trimmed string in two cases. When
/// lowercasing changes byte lengths the lowered tail is used instead.
fn tail<'a>(original: &'a str, lowered: &'a str, prefix: &str) -> &'a str {
    let cut = prefix.len();
    if original.len() == lowered.len() && original.is_char_boundary(cut) {
        original[cut..].trim()
    } else {
        lowered[cut..].trim()
    }
}

fn parse_id(token: Option<&str>) -> Option<i64> {
    token
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
}

pub fn parse_command(raw: &str) -> Command {
    let original = raw.trim();
    let lowered = original.to_lowercase();
    let text = lowered.as_str();

    if text.is_empty() {
        return Command::Empty;
    }

    // Exit
    if EXIT_PHRASES.contains(&text) {
        return Command::Quit;
    }

    // Help
    if text == "ajuda" {
        return Command::Help;
    }

    // Profiles
    if text == "perfis" || text == "listar perfis" {
        return Command::ListProfiles;
    }
    if text == "perfil" {
        return Command::MissingProfileName;
    }
    if let Some(rest) = text.strip_prefix("perfil ") {
        let name = rest.trim();
        return if name.is_empty() {
            Command::MissingProfileName
        } else {
            Command::SwitchProfile(name.to_string())
        };
    }

    // AI toggle
    if text == "toggle ia" || text == "alternar ia" {
        return Command::ToggleAi;
    }

    // Input mode
    if let Some(rest) = text.strip_prefix("modo ") {
        if let Some(mode) = InputMode::parse(rest) {
            return Command::SwitchMode(mode);
        }
    }

    // Projects
    if text.starts_with("projeto novo") {
        let name = tail(original, text, "projeto novo");
        return if name.is_empty() {
            Command::MissingProjectName
        } else {
            Command::NewProject(name.to_string())
        };
    }
    if text.starts_with("listar projetos") {
        return Command::ListProjects;
    }
    if text.starts_with("deletar projeto") {
        let parts: Vec<&str> = text.split_whitespace().collect();
        return match parse_id(parts.get(2).copied()) {
            Some(id) => Command::DeleteProject(id),
            None => Command::BadDeleteArgs,
        };
    }
    if text.starts_with("componentes do projeto") || text.starts_with("lista componentes") {
        return match first_number_re()
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
        {
            Some(id) => Command::ListComponents(id),
            None => Command::BadComponentArgs,
        };
    }
    if text.starts_with("adicionar componente") {
        return parse_add_component(tail(original, text, "adicionar componente"));
    }
    if text.starts_with("etapas do projeto") {
        return match first_number_re()
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
        {
            Some(id) => Command::ListSteps(id),
            None => Command::BadStepArgs,
        };
    }
    if text.starts_with("adicionar etapa") {
        return parse_add_step(tail(original, text, "adicionar etapa"));
    }
    if text.starts_with("salvar codigo") || text.starts_with("salvar código") {
        let parts: Vec<&str> = text.split_whitespace().collect();
        return match parse_id(parts.get(2).copied()) {
            Some(id) => Command::SaveCode(id),
            None => Command::BadSaveCodeArgs,
        };
    }

    // Images
    if text.starts_with("gerar imagem") {
        let description = tail(original, text, "gerar imagem");
        return if description.is_empty() {
            Command::MissingImageDescription
        } else {
            Command::GenerateImage(description.to_string())
        };
    }

    // Entertainment
    if FACT_WORDS.contains(&text) {
        return Command::Fact;
    }
    if text == "conselho" {
        return Command::Advice;
    }
    if text == "piada" {
        return Command::Joke;
    }

    // Code generation
    for prefix in ["gerar codigo", "gerar código"] {
        if text.starts_with(prefix) {
            let description = tail(original, text, prefix);
            return if description.is_empty() {
                Command::MissingCodeDescription
            } else {
                Command::GenerateCode(description.to_string())
            };
        }
    }

    Command::Chat(text.to_string())
}

/// `<id> <quantidade> <nome...>`
fn parse_add_component(args: &str) -> Command {
    let mut parts = args.splitn(3, char::is_whitespace);
    let project_id = parse_id(parts.next());
    let quantity = parse_id(parts.next());
    let name = parts.next().map(str::trim).unwrap_or_default();

    match (project_id, quantity) {
        (Some(project_id), Some(quantity)) if quantity > 0 && !name.is_empty() => {
            Command::AddComponent {
                project_id,
                quantity,
                name: name.to_string(),
            }
        }
        _ => Command::BadAddComponentArgs,
    }
}

/// `<id> <descrição...>`
fn parse_add_step(args: &str) -> Command {
    let mut parts = args.splitn(2, char::is_whitespace);
    let project_id = parse_id(parts.next());
    let description = parts.next().map(str::trim).unwrap_or_default();

    match project_id {
        Some(project_id) if !description.is_empty() => Command::AddStep {
            project_id,
            description: description.to_string(),
        },
        _ => Command::BadAddStepArgs,
    }
}
