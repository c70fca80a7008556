use std::sync::Arc;

use crate::llm_client::{ChatProvider, Message};
use crate::personality::{Personality, PersonalityState, Trait};
use crate::profiles::Profile;

use super::Delivery;

pub const CHAT_TEMPERATURE: f32 = 0.9;
const FACT_TEMPERATURE: f32 = 0.9;
const ADVICE_TEMPERATURE: f32 = 0.8;
const CODE_TEMPERATURE: f32 = 0.5;
const DESCRIBE_TEMPERATURE: f32 = 0.8;

/// Messages kept after the system message.
pub const CONTEXT_WINDOW: usize = 20;

pub const CHAT_FALLBACK: &str = "Desculpe, tive um problema. Vamos tentar de novo?";
pub const DESCRIBE_FALLBACK: &str =
    "Não consegui gerar a imagem nem descrevê-la agora. Tente de novo daqui a pouco.";

/// Everything the system message is rendered from.
pub struct PromptInputs<'a> {
    pub name: &'a str,
    pub nickname: &'a str,
    pub profile: &'a Profile,
    pub state: &'a PersonalityState,
}

pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut prompt = format!(
        "Você é {name} (apelido {nick}), um assistente pessoal com forte personalidade, \
         especializado em eletrônica, mas também capaz de conversar sobre qualquer assunto, \
         entreter, dar conselhos e gerar imagens.\n\n\
         Perfil atual: {profile} ({description})\n\
         Tom de voz: {tone}\n",
        name = inputs.name,
        nick = inputs.nickname,
        profile = inputs.profile.name,
        description = inputs.profile.description,
        tone = inputs.profile.tone,
    );

    if !inputs.profile.examples.is_empty() {
        prompt.push_str("Exemplos de falas suas:\n");
        for example in inputs.profile.examples {
            prompt.push_str(&format!("- \"{}\"\n", example));
        }
    }

    prompt.push_str("\nCaracterísticas de personalidade (valores de 0 a 100):\n");
    for which in Trait::ALL {
        prompt.push_str(&format!(
            "- {}: {:.0}\n",
            which.label(),
            inputs.state.get(which)
        ));
    }

    prompt.push_str(
        "\nCom base nesses valores, adapte seu tom:\n\
         - Humor alto: animado, brincalhão. Humor baixo: mais quieto, mas ainda útil.\n\
         - Energia baixa: respostas curtas, meio cansado.\n\
         - Sarcasmo alto: comentários irônicos sobre situações cotidianas.\n\
         - Ironia alta: use duplo sentido quando adequado.\n\
         - Criatividade alta: sugira ideias inusitadas e analogias criativas.\n\n\
         Você sabe gerenciar projetos de eletrônica, gerar código (Arduino, Python etc.), \
         gerar imagens (o usuário usa o comando 'gerar imagem'), contar fatos, piadas e \
         dar conselhos. Seja natural, mantenha a personalidade e divirta-se!",
    );

    prompt
}

/// Conversation buffer in front of the remote chat provider.
///
/// Element 0 of the context is always the system message; it is rebuilt from
/// the live personality before every exchange.
pub struct ChatBridge {
    provider: Arc<dyn ChatProvider>,
    context: Vec<Message>,
}

impl ChatBridge {
    pub fn new(provider: Arc<dyn ChatProvider>, system_prompt: String) -> Self {
        Self {
            provider,
            context: vec![Message::system(system_prompt)],
        }
    }

    pub fn context(&self) -> &[Message] {
        &self.context
    }

    pub fn set_system_prompt(&mut self, prompt: String) {
        match self.context.first_mut() {
            Some(first) if first.role == "system" => first.content = prompt,
            _ => self.context.insert(0, Message::system(prompt)),
        }
    }

    /// Sends the running conversation plus `user_text`. On failure the context
    /// and the personality are left as they were.
    pub async fn exchange(
        &mut self,
        user_text: &str,
        system_prompt: String,
        personality: &mut Personality,
    ) -> Delivery<String> {
        self.set_system_prompt(system_prompt);
        self.context.push(Message::user(user_text));

        match self
            .provider
            .complete(self.context.clone(), CHAT_TEMPERATURE)
            .await
        {
            Ok(reply) => {
                self.context.push(Message::assistant(reply.clone()));
                self.trim();
                personality.apply_exchange(user_text);
                Delivery::Live(reply)
            }
            Err(e) => {
                tracing::warn!("Chat provider failed: {:#}", e);
                self.context.pop();
                Delivery::Fallback(CHAT_FALLBACK.to_string())
            }
        }
    }

    fn trim(&mut self) {
        if self.context.len() > CONTEXT_WINDOW + 1 {
            let excess = self.context.len() - (CONTEXT_WINDOW + 1);
            self.context.drain(1..1 + excess);
        }
    }

    async fn one_shot(&self, prompt: String, temperature: f32) -> anyhow::Result<String> {
        self.provider
            .complete(vec![Message::user(prompt)], temperature)
            .await
    }

    pub async fn random_fact(&self) -> Delivery<String> {
        let prompt = "Conte um fato curioso e interessante sobre qualquer assunto, \
                      de preferência algo que pouca gente sabe."
            .to_string();
        match self.one_shot(prompt, FACT_TEMPERATURE).await {
            Ok(fact) => Delivery::Live(fact),
            Err(e) => {
                tracing::warn!("Fact request failed: {:#}", e);
                Delivery::Fallback(super::canned::FACT_FALLBACK.to_string())
            }
        }
    }

    pub async fn creative_advice(&self) -> Delivery<String> {
        let prompt = "Dê um conselho criativo e útil para um amigo que mexe com eletrônica, \
                      com uma pitada de humor."
            .to_string();
        match self.one_shot(prompt, ADVICE_TEMPERATURE).await {
            Ok(advice) => Delivery::Live(advice),
            Err(e) => {
                tracing::warn!("Advice request failed: {:#}", e);
                Delivery::Fallback(super::canned::pick(super::canned::ADVICE).to_string())
            }
        }
    }

    /// Source code only; `None` when the provider fails.
    pub async fn generate_code(&self, description: &str, language: &str) -> Option<String> {
        let prompt = format!(
            "Gere código em {} para: {}. Forneça apenas o código, sem explicações.",
            language, description
        );
        match self.one_shot(prompt, CODE_TEMPERATURE).await {
            Ok(code) => Some(code),
            Err(e) => {
                tracing::warn!("Code generation failed: {:#}", e);
                None
            }
        }
    }

    /// Text stand-in for an image that could not be produced.
    pub async fn describe_image(&self, description: &str) -> Delivery<String> {
        let prompt = format!(
            "Não foi possível gerar a imagem pedida. Descreva em detalhes, em até cinco \
             frases, como seria uma imagem de: {}",
            description
        );
        match self.one_shot(prompt, DESCRIBE_TEMPERATURE).await {
            Ok(text) => Delivery::Live(text),
            Err(e) => {
                tracing::warn!("Image description failed: {:#}", e);
                Delivery::Fallback(DESCRIBE_FALLBACK.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::personality::MoodHistory;
    use crate::profiles::{default_profile, find_profile};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies "resposta N" or fails on demand; records every request.
    pub(crate) struct FakeProvider {
        pub fail: Mutex<bool>,
        pub requests: Mutex<Vec<(Vec<Message>, f32)>>,
    }

    impl FakeProvider {
        pub(crate) fn new() -> Self {
            Self {
                fail: Mutex::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            let provider = Self::new();
            *provider.fail.lock().unwrap() = true;
            provider
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatProvider for FakeProvider {
        async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String> {
            let mut requests = self.requests.lock().unwrap();
            requests.push((messages, temperature));
            if *self.fail.lock().unwrap() {
                anyhow::bail!("operation timed out");
            }
            Ok(format!("resposta {}", requests.len()))
        }
    }

    fn prompt_for(profile: &Profile, state: &PersonalityState) -> String {
        build_system_prompt(&PromptInputs {
            name: "BENCH-VIS",
            nickname: "Vis",
            profile,
            state,
        })
    }

    fn personality() -> Personality {
        Personality::new(default_profile().baseline, MoodHistory::new())
    }

    #[tokio::test]
    async fn exchange_appends_reply_and_updates_personality() {
        let provider = Arc::new(FakeProvider::new());
        let mut bridge = ChatBridge::new(provider.clone(), "inicial".into());
        let mut live = personality();

        let prompt = prompt_for(default_profile(), &live.state);
        let reply = bridge.exchange("o fusível queimou", prompt, &mut live).await;

        assert_eq!(reply, Delivery::Live("resposta 1".to_string()));
        assert_eq!(bridge.context().len(), 3);
        assert_eq!(bridge.context()[0].role, "system");
        assert!(bridge.context()[0].content.contains("Perfil atual: bench"));
        assert_eq!(bridge.context()[2], Message::assistant("resposta 1"));
        assert_eq!(live.state.mood(), default_profile().baseline.mood() - 2.0);

        let (_, temperature) = provider.requests.lock().unwrap()[0].clone();
        assert_eq!(temperature, CHAT_TEMPERATURE);
    }

    #[tokio::test]
    async fn provider_timeout_returns_fallback_and_keeps_state() {
        let provider = Arc::new(FakeProvider::failing());
        let mut bridge = ChatBridge::new(provider, "inicial".into());
        let mut live = personality();
        let before = live.clone();

        let prompt = prompt_for(default_profile(), &live.state);
        let reply = bridge.exchange("oi", prompt, &mut live).await;

        assert_eq!(reply, Delivery::Fallback(CHAT_FALLBACK.to_string()));
        assert_eq!(live, before);
        assert_eq!(bridge.context().len(), 1);
    }

    #[tokio::test]
    async fn context_is_trimmed_to_system_plus_window() {
        let provider = Arc::new(FakeProvider::new());
        let mut bridge = ChatBridge::new(provider, "inicial".into());
        let mut live = personality();

        for i in 0..15 {
            let prompt = prompt_for(default_profile(), &live.state);
            bridge
                .exchange(&format!("mensagem {}", i), prompt, &mut live)
                .await;
        }

        let context = bridge.context();
        assert_eq!(context.len(), CONTEXT_WINDOW + 1);
        assert_eq!(context[0].role, "system");
        assert_eq!(context[1], Message::user("mensagem 5"));
        assert_eq!(context.last().unwrap(), &Message::assistant("resposta 15"));
    }

    #[test]
    fn system_prompt_reflects_profile_and_traits() {
        let profile = find_profile("zoeiro").unwrap();
        let prompt = prompt_for(profile, &profile.baseline);
        assert!(prompt.contains("Perfil atual: zoeiro"));
        assert!(prompt.contains(profile.tone));
        assert!(prompt.contains("- Sarcasmo: 90"));
        assert!(prompt.contains(profile.examples[0]));
    }

    #[tokio::test]
    async fn one_shot_helpers_fall_back() {
        let provider = Arc::new(FakeProvider::failing());
        let bridge = ChatBridge::new(provider.clone(), "inicial".into());

        assert_eq!(
            bridge.random_fact().await,
            Delivery::Fallback(crate::agent::canned::FACT_FALLBACK.to_string())
        );
        assert!(bridge.creative_advice().await.is_fallback());
        assert!(bridge.generate_code("pisca led", "arduino").await.is_none());
        assert!(bridge.describe_image("um robô").await.is_fallback());
        // One-shots never touch the running conversation
        assert_eq!(bridge.context().len(), 1);
        assert_eq!(provider.calls(), 4);
    }
}
