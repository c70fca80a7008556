pub mod canned;
pub mod chat;
pub mod commands;
pub mod confirm;
pub mod image_gen;

use chrono::{Local, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::{AssistantConfig, InputMode};
use crate::database::ProjectDatabase;
use crate::llm_client::ChatProvider;
use crate::memory::{MemorySnapshot, SnapshotFile};
use crate::personality::{Personality, PersonalityState, Trait};
use crate::profiles::{self, Profile};

use chat::{ChatBridge, PromptInputs};
use commands::{parse_command, Command};
use confirm::{await_confirmation, Confirmation, ReplySource, CONFIRMATION_TIMEOUT};
use image_gen::{ImageBridge, ImageEndpoint, ImageOutcome};

/// Outcome of a call to a remote collaborator. `Fallback` carries the local
/// text used in place of the remote answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Live(T),
    Fallback(T),
}

impl<T> Delivery<T> {
    pub fn into_inner(self) -> T {
        match self {
            Delivery::Live(value) | Delivery::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Delivery::Fallback(_))
    }
}

/// What the front end should render after one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub quit: bool,
}

impl Response {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

const AI_OFF_REPLY: &str = "Modo IA desligado. Use 'toggle ia' para ativar.";
const STORE_ERROR_REPLY: &str = "Tive um problema com o banco de projetos. Tente de novo.";

/// Snapshot preference that overrides the configured code language.
pub const CODE_LANGUAGE_PREFERENCE: &str = "linguagem";

fn not_found(id: i64) -> String {
    format!("Projeto {} não encontrado.", id)
}

/// One interactive session: classifies each utterance and runs its handler.
pub struct Assistant {
    config: AssistantConfig,
    personality: Arc<RwLock<Personality>>,
    profile: &'static Profile,
    memory: MemorySnapshot,
    database: Arc<ProjectDatabase>,
    chat: ChatBridge,
    images: ImageBridge,
    ai_enabled: bool,
    input_mode: InputMode,
    voice_available: bool,
    last_code: Option<String>,
    confirmation_timeout: Duration,
    stop: Arc<AtomicBool>,
}

impl Assistant {
    pub fn new(
        config: AssistantConfig,
        database: Arc<ProjectDatabase>,
        provider: Arc<dyn ChatProvider>,
        image_endpoint: Arc<dyn ImageEndpoint>,
        snapshot: SnapshotFile,
    ) -> Self {
        let (profile, personality) = resume_profile(&config, &snapshot);
        let system_prompt = render_prompt(&config, profile, &personality.state);

        tracing::info!(
            "Session starting with profile '{}' ({} previous interactions)",
            profile.name,
            snapshot.memory.interactions
        );

        Self {
            images: ImageBridge::new(image_endpoint, &config.image),
            chat: ChatBridge::new(provider, system_prompt),
            personality: Arc::new(RwLock::new(personality)),
            profile,
            memory: snapshot.memory,
            database,
            ai_enabled: config.enable_ai,
            input_mode: config.input_mode,
            voice_available: false,
            last_code: None,
            confirmation_timeout: CONFIRMATION_TIMEOUT,
            stop: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn personality(&self) -> Arc<RwLock<Personality>> {
        self.personality.clone()
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn active_profile(&self) -> &'static Profile {
        self.profile
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn memory(&self) -> &MemorySnapshot {
        &self.memory
    }

    pub fn chat(&self) -> &ChatBridge {
        &self.chat
    }

    pub fn set_voice_available(&mut self, available: bool) {
        self.voice_available = available;
        if !available && self.input_mode.uses_voice() {
            self.input_mode = InputMode::Text;
        }
    }

    /// Audio failed mid-session; keep going in text mode.
    pub fn downgrade_to_text(&mut self) {
        if self.input_mode != InputMode::Text {
            tracing::warn!("Audio unavailable, switching input mode to text");
            self.input_mode = InputMode::Text;
        }
    }

    pub async fn speech_rate(&self) -> u32 {
        self.personality.read().await.state.speech_rate()
    }

    pub async fn greeting(&self) -> String {
        let state = self.personality.read().await.state;
        let days_away = self.memory.days_since_last(Utc::now());
        canned::greeting(&state, Local::now(), days_away)
    }

    /// Persistable view of the session.
    pub async fn snapshot(&self) -> SnapshotFile {
        let personality = self.personality.read().await;
        SnapshotFile {
            memory: self.memory.clone(),
            personality: personality.state,
            mood_history: personality.mood_history.clone(),
            active_profile: Some(self.profile.name.to_string()),
        }
    }

    fn system_prompt(&self, state: &PersonalityState) -> String {
        render_prompt(&self.config, self.profile, state)
    }

    /// Resets the live state to the named profile's baseline. `None` when the
    /// name is not in the catalog; nothing changes in that case.
    pub async fn switch_profile(&mut self, name: &str) -> Option<&'static Profile> {
        let profile = profiles::find_profile(name)?;
        let mut personality = self.personality.write().await;
        personality.reset_to(profile.baseline);
        self.profile = profile;
        let prompt = render_prompt(&self.config, profile, &personality.state);
        self.chat.set_system_prompt(prompt);
        tracing::info!("Switched to profile '{}'", profile.name);
        Some(profile)
    }

    /// Runs exactly one handler for `raw`. `replies` is only polled by
    /// commands that need confirmation.
    pub async fn execute(&mut self, raw: &str, replies: &mut dyn ReplySource) -> Response {
        let command = parse_command(raw);
        tracing::debug!("Command: {:?}", command);

        if !command.is_system() {
            self.memory.record_interaction(raw.trim(), Utc::now());
        }

        match command {
            Command::Empty => Response::say(""),
            Command::Quit => {
                self.stop.store(true, Ordering::SeqCst);
                Response {
                    text: canned::pick(canned::FAREWELLS).to_string(),
                    quit: true,
                }
            }
            Command::Help => Response::say(canned::HELP_TEXT.trim()),
            Command::ListProfiles => Response::say(self.list_profiles()),
            Command::SwitchProfile(name) => match self.switch_profile(&name).await {
                Some(profile) => Response::say(format!(
                    "Perfil '{}' ativado! {}",
                    profile.name, profile.description
                )),
                None => Response::say(format!(
                    "O perfil '{}' não existe. Use 'perfis' para ver a lista.",
                    name
                )),
            },
            Command::MissingProfileName => Response::say(
                "Diga o nome do perfil. Ex: perfil professor (use 'perfis' para ver a lista)",
            ),
            Command::ToggleAi => {
                self.ai_enabled = !self.ai_enabled;
                tracing::info!("AI enabled: {}", self.ai_enabled);
                Response::say(if self.ai_enabled {
                    "Modo IA ativado! Agora posso conversar sobre qualquer coisa."
                } else {
                    "Modo IA desativado. Fico só com as respostas da bancada."
                })
            }
            Command::SwitchMode(mode) => Response::say(self.switch_mode(mode)),
            Command::NewProject(name) => Response::say(self.new_project(&name)),
            Command::MissingProjectName => {
                Response::say("Diga o nome do projeto. Ex: projeto novo Fonte 5V")
            }
            Command::ListProjects => Response::say(self.list_projects()),
            Command::DeleteProject(id) => Response::say(self.delete_project(id, replies).await),
            Command::BadDeleteArgs => Response::say("Use: deletar projeto ID (ID numérico)"),
            Command::ListComponents(id) => Response::say(self.list_components(id)),
            Command::BadComponentArgs => {
                Response::say("Use: componentes do projeto ID (ID numérico)")
            }
            Command::AddComponent {
                project_id,
                quantity,
                name,
            } => Response::say(self.add_component(project_id, quantity, &name)),
            Command::BadAddComponentArgs => Response::say(
                "Use: adicionar componente ID QUANTIDADE NOME. Ex: adicionar componente 1 4 LED vermelho",
            ),
            Command::ListSteps(id) => Response::say(self.list_steps(id)),
            Command::BadStepArgs => Response::say("Use: etapas do projeto ID (ID numérico)"),
            Command::AddStep {
                project_id,
                description,
            } => Response::say(self.add_step(project_id, &description)),
            Command::BadAddStepArgs => Response::say(
                "Use: adicionar etapa ID DESCRIÇÃO. Ex: adicionar etapa 1 Soldar os resistores",
            ),
            Command::SaveCode(id) => Response::say(self.save_code(id)),
            Command::BadSaveCodeArgs => Response::say("Use: salvar codigo ID (ID numérico)"),
            Command::GenerateImage(description) => {
                Response::say(self.generate_image(&description).await)
            }
            Command::MissingImageDescription => {
                Response::say("Descreva a imagem. Ex: gerar imagem um robô soldando uma placa")
            }
            Command::Fact => {
                if self.ai_enabled {
                    Response::say(self.chat.random_fact().await.into_inner())
                } else {
                    Response::say(canned::pick(canned::FACTS))
                }
            }
            Command::Advice => {
                let creativity = self.personality.read().await.state.creativity();
                if self.ai_enabled && creativity > 80.0 {
                    Response::say(self.chat.creative_advice().await.into_inner())
                } else {
                    Response::say(canned::pick(canned::ADVICE))
                }
            }
            Command::Joke => Response::say(canned::pick(canned::JOKES)),
            Command::GenerateCode(description) => {
                Response::say(self.generate_code(&description).await)
            }
            Command::MissingCodeDescription => {
                Response::say("Descreva o código. Ex: gerar codigo pisca LED no pino 13")
            }
            Command::Chat(text) => Response::say(self.converse(&text).await),
        }
    }

    fn list_profiles(&self) -> String {
        let mut lines = vec!["Perfis disponíveis:".to_string()];
        for (name, description) in profiles::list_profiles() {
            let marker = if name == self.profile.name {
                " (ativo)"
            } else {
                ""
            };
            lines.push(format!("  • {}{}: {}", name, marker, description));
        }
        lines.join("\n")
    }

    fn switch_mode(&mut self, mode: InputMode) -> String {
        if mode.uses_voice() && !self.voice_available {
            self.input_mode = InputMode::Text;
            return "Voz indisponível neste computador. Continuo em modo texto.".to_string();
        }
        self.input_mode = mode;
        format!("Modo {} ativado.", mode)
    }

    fn new_project(&self, name: &str) -> String {
        match self
            .database
            .create_project(name, "", &self.config.default_code_language)
        {
            Some(id) => format!("Projeto '{}' criado com ID {}!", name, id),
            None => "Não consegui criar o projeto. Tente outro nome.".to_string(),
        }
    }

    fn list_projects(&self) -> String {
        let projects = match self.database.list_projects() {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!("Failed to list projects: {:#}", e);
                return STORE_ERROR_REPLY.to_string();
            }
        };
        if projects.is_empty() {
            return "Nenhum projeto cadastrado ainda. Use 'projeto novo NOME'.".to_string();
        }

        let mut lines = vec![format!("Você tem {} projeto(s):", projects.len())];
        for project in projects {
            lines.push(format!(
                "  #{} {} [{}] ({}) criado em {}",
                project.id,
                project.name,
                project.status,
                project.language,
                project
                    .created_at
                    .with_timezone(&Local)
                    .format("%d/%m/%Y %H:%M")
            ));
        }
        lines.join("\n")
    }

    async fn delete_project(&self, id: i64, replies: &mut dyn ReplySource) -> String {
        let project = match self.database.get_project(id) {
            Ok(Some(project)) => project,
            Ok(None) => return not_found(id),
            Err(e) => {
                tracing::warn!("Failed to look up project {}: {:#}", id, e);
                return STORE_ERROR_REPLY.to_string();
            }
        };

        let question = format!(
            "Tem certeza que quer deletar o projeto '{}' (ID {})? Responda sim ou não.",
            project.name, id
        );
        replies.announce(&question).await;
        if await_confirmation(replies, self.confirmation_timeout).await == Confirmation::Cancelled
        {
            return "Operação cancelada. O projeto continua lá.".to_string();
        }

        let counts = self.database.count_children(id).unwrap_or_default();
        if self.database.delete_project(id) {
            format!(
                "Projeto {} deletado, junto com {} componente(s), {} versão(ões) de código e {} passo(s).",
                id, counts.components, counts.code_versions, counts.steps
            )
        } else {
            not_found(id)
        }
    }

    fn project_exists(&self, id: i64) -> Result<bool, String> {
        match self.database.get_project(id) {
            Ok(found) => Ok(found.is_some()),
            Err(e) => {
                tracing::warn!("Failed to look up project {}: {:#}", id, e);
                Err(STORE_ERROR_REPLY.to_string())
            }
        }
    }

    fn list_components(&self, id: i64) -> String {
        match self.project_exists(id) {
            Ok(true) => {}
            Ok(false) => return not_found(id),
            Err(reply) => return reply,
        }
        let components = match self.database.list_components(id) {
            Ok(components) => components,
            Err(e) => {
                tracing::warn!("Failed to list components of {}: {:#}", id, e);
                return STORE_ERROR_REPLY.to_string();
            }
        };
        if components.is_empty() {
            return format!("O projeto {} ainda não tem componentes.", id);
        }

        let mut lines = vec![format!("Componentes do projeto {}:", id)];
        for component in components {
            let mut line = format!("  • {}x {}", component.quantity, component.name);
            if !component.note.is_empty() {
                line.push_str(&format!(" ({})", component.note));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn add_component(&self, project_id: i64, quantity: i64, name: &str) -> String {
        match self.project_exists(project_id) {
            Ok(true) => {}
            Ok(false) => return not_found(project_id),
            Err(reply) => return reply,
        }
        match self.database.add_component(project_id, name, quantity, "") {
            Ok(_) => format!(
                "Adicionado ao projeto {}: {}x {}.",
                project_id, quantity, name
            ),
            Err(e) => {
                tracing::warn!("{:#}", e);
                STORE_ERROR_REPLY.to_string()
            }
        }
    }

    fn list_steps(&self, id: i64) -> String {
        match self.project_exists(id) {
            Ok(true) => {}
            Ok(false) => return not_found(id),
            Err(reply) => return reply,
        }
        let steps = match self.database.list_steps(id) {
            Ok(steps) => steps,
            Err(e) => {
                tracing::warn!("Failed to list steps of {}: {:#}", id, e);
                return STORE_ERROR_REPLY.to_string();
            }
        };
        if steps.is_empty() {
            return format!("O projeto {} ainda não tem etapas.", id);
        }

        let mut lines = vec![format!("Etapas do projeto {}:", id)];
        for step in steps {
            let mark = if step.done { "x" } else { " " };
            lines.push(format!("  {}. [{}] {}", step.order, mark, step.description));
        }
        lines.join("\n")
    }

    /// Appends after the last existing step.
    fn add_step(&self, project_id: i64, description: &str) -> String {
        match self.project_exists(project_id) {
            Ok(true) => {}
            Ok(false) => return not_found(project_id),
            Err(reply) => return reply,
        }
        let order = match self.database.count_children(project_id) {
            Ok(counts) => counts.steps as i64 + 1,
            Err(e) => {
                tracing::warn!("Failed to count steps of {}: {:#}", project_id, e);
                return STORE_ERROR_REPLY.to_string();
            }
        };
        match self.database.add_step(project_id, order, description) {
            Ok(_) => format!(
                "Etapa {} adicionada ao projeto {}: {}",
                order, project_id, description
            ),
            Err(e) => {
                tracing::warn!("{:#}", e);
                STORE_ERROR_REPLY.to_string()
            }
        }
    }

    fn save_code(&self, project_id: i64) -> String {
        let Some(code) = self.last_code.as_deref() else {
            return "Ainda não gerei nenhum código. Use 'gerar codigo DESCRIÇÃO' primeiro."
                .to_string();
        };
        let project = match self.database.get_project(project_id) {
            Ok(Some(project)) => project,
            Ok(None) => return not_found(project_id),
            Err(e) => {
                tracing::warn!("Failed to look up project {}: {:#}", project_id, e);
                return STORE_ERROR_REPLY.to_string();
            }
        };
        match self
            .database
            .add_code_version(project_id, code, &project.language)
        {
            Ok(version) => format!(
                "Código salvo como versão {} do projeto '{}'.",
                version, project.name
            ),
            Err(e) => {
                tracing::warn!("{:#}", e);
                STORE_ERROR_REPLY.to_string()
            }
        }
    }

    async fn generate_image(&self, description: &str) -> String {
        match self.images.generate(description, &self.chat).await {
            ImageOutcome::Saved { path, from_cache } => {
                let origin = if from_cache { " (veio do cache)" } else { "" };
                format!("Imagem pronta{}! Salva em {}", origin, path.display())
            }
            ImageOutcome::Described(text) => format!(
                "Não consegui gerar a imagem agora, mas imagine assim:\n{}",
                text
            ),
        }
    }

    async fn generate_code(&mut self, description: &str) -> String {
        if !self.ai_enabled {
            return "Preciso da IA ligada para gerar código. Use 'toggle ia'.".to_string();
        }
        let language = self
            .memory
            .preferences
            .get(CODE_LANGUAGE_PREFERENCE)
            .cloned()
            .unwrap_or_else(|| self.config.default_code_language.clone());
        match self.chat.generate_code(description, &language).await {
            Some(code) => {
                let reply = format!(
                    "Código em {}:\n\n{}\n\nUse 'salvar codigo ID' para guardar em um projeto.",
                    language, code
                );
                self.last_code = Some(code);
                reply
            }
            None => chat::CHAT_FALLBACK.to_string(),
        }
    }

    async fn converse(&mut self, text: &str) -> String {
        let personality = self.personality.clone();
        let mut live = personality.write().await;

        if !self.ai_enabled {
            return match canned::local_reply(text, &live.state) {
                Some(reply) => {
                    if !reply.deltas.is_empty() {
                        live.apply_update(&reply.deltas);
                    }
                    reply.text
                }
                None => AI_OFF_REPLY.to_string(),
            };
        }

        let prompt = self.system_prompt(&live.state);
        self.chat.exchange(text, prompt, &mut live).await.into_inner()
    }
}

fn render_prompt(config: &AssistantConfig, profile: &Profile, state: &PersonalityState) -> String {
    chat::build_system_prompt(&PromptInputs {
        name: &config.name,
        nickname: &config.nickname,
        profile,
        state,
    })
}

/// Last-used profile with its saved state; a fresh snapshot starts from the
/// configured profile's baseline.
fn resume_profile(
    config: &AssistantConfig,
    snapshot: &SnapshotFile,
) -> (&'static Profile, Personality) {
    let configured =
        profiles::find_profile(&config.default_profile).unwrap_or_else(profiles::default_profile);

    match snapshot.active_profile.as_deref() {
        Some(name) => {
            let profile = profiles::find_profile(name).unwrap_or_else(|| {
                tracing::warn!("Unknown saved profile '{}', using '{}'", name, configured.name);
                configured
            });
            let personality =
                Personality::new(snapshot.personality, snapshot.mood_history.clone());
            (profile, personality)
        }
        None => {
            let mut personality =
                Personality::new(snapshot.personality, snapshot.mood_history.clone());
            if personality.state != configured.baseline {
                personality.reset_to(configured.baseline);
            }
            (configured, personality)
        }
    }
}

/// Trait values as a short status line.
pub fn describe_state(state: &PersonalityState) -> String {
    Trait::ALL
        .iter()
        .map(|which| format!("{} {:.0}", which.label(), state.get(*which)))
        .collect::<Vec<_>>()
        .join(" | ")
}
