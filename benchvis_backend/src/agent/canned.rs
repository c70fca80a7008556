//! Fixed response tables and the rule-based responder used while AI is off.

use chrono::{DateTime, Local, Timelike};
use rand::seq::IndexedRandom;

use crate::personality::{PersonalityState, Trait};

pub const JOKES: &[&str] = &[
    "Por que os eletrônicos são tão calmos? Porque têm muitos capacitores!",
    "O que um resistor disse para o outro? Vamos nos conectar!",
    "Qual é o contrário de LED? DEL! ...Tá, foi ruim, eu sei.",
    "Por que o transistor foi ao médico? Porque estava com emissor de corrente!",
];

pub const ADVICE: &[&str] = &[
    "Nunca solde com o ferro desligado. Parece óbvio, mas já vi acontecer.",
    "Se algo não funciona, verifique se está plugado. 90% das vezes é isso.",
    "Quando duvidar da polaridade, lembre-se: preto é negativo (geralmente).",
    "Café e eletrônica combinam? Sim, mas não derrube no circuito.",
    "Se você queimou um componente, não se culpe. Acontece com os melhores.",
];

/// Facts served locally while the AI is off.
pub const FACTS: &[&str] = &[
    "Sabia que polvos têm três corações?",
    "O primeiro transistor, de 1947, era do tamanho da palma da mão.",
    "Um raio pode aquecer o ar ao redor a uns 30.000 °C, mais quente que a superfície do Sol.",
    "O termo 'bug' ficou famoso quando uma mariposa travou um relé do Harvard Mark II.",
    "O cobre conduz eletricidade quase tão bem quanto a prata, e custa bem menos.",
];

pub const FACT_FALLBACK: &str =
    "Sabia que polvos têm três corações? Esse é um fato, mas tive problemas pra buscar agora.";

pub const FAREWELLS: &[&str] = &[
    "Até mais! Não esqueça de desligar o ferro de solda!",
    "Falou! Vou recarregar as baterias.",
    "Tchau! Foi bom conversar!",
];

pub const HELP_TEXT: &str = r#"
🔧 COMANDOS DO BENCH-VIS:

📁 PROJETOS:
  • "projeto novo NOME" - criar projeto
  • "listar projetos" - lista todos
  • "deletar projeto ID" - remove projeto (com confirmação)
  • "componentes do projeto ID" - lista componentes do projeto
  • "adicionar componente ID QTD NOME" - cadastra um componente
  • "etapas do projeto ID" - lista as etapas de montagem
  • "adicionar etapa ID DESCRIÇÃO" - acrescenta uma etapa no fim
  • "salvar codigo ID" - guarda o último código gerado no projeto

🎨 IMAGENS:
  • "gerar imagem [descrição]" - cria imagem com IA e salva

💻 CÓDIGO:
  • "gerar codigo [descrição]" - gera código (Arduino, Python...)

🎭 ENTRETENIMENTO:
  • "fato" ou "curiosidade" - conta algo interessante
  • "conselho" - dá um conselho
  • "piada" - conta uma piada

🧑 PERFIS:
  • "perfis" - lista as personalidades disponíveis
  • "perfil NOME" - troca de personalidade

🤖 IA:
  • "toggle ia" - liga/desliga o modo inteligente
  • Com IA ligada, pode conversar sobre qualquer assunto
  • Com IA desligada: "como você está", "piada", "resistor marrom preto vermelho"

🎤 MODOS:
  • "modo texto", "modo voz", "modo hibrido"
  • "sair" - encerra

💡 DICA: A personalidade muda com o tempo!
"#;

pub fn pick(options: &'static [&'static str]) -> &'static str {
    options.choose(&mut rand::rng()).copied().unwrap_or_default()
}

fn period_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "manhã",
        12..=17 => "tarde",
        _ => "noite",
    }
}

/// Opening line, shaped by the time of day, the mood and how long the user was away.
pub fn greeting(state: &PersonalityState, now: DateTime<Local>, days_away: Option<i64>) -> String {
    let period = period_of_day(now.hour());
    let options = if state.mood() > 70.0 {
        [
            format!("Bom {}! Acordei elétrico hoje!", period),
            "E aí, tudo certo? Tô pronto pra soldar e criar!".to_string(),
        ]
    } else if state.mood() < 30.0 {
        [
            format!("Bom {}... Espero que seus projetos deem certo hoje.", period),
            "Olá. Mais um dia de desafios.".to_string(),
        ]
    } else {
        [
            format!("Bom {}! Como posso ajudar na bancada ou no que precisar?", period),
            "Olá! Pronto para mais um projeto ou uma conversa?".to_string(),
        ]
    };

    let mut line = options
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_default();
    if days_away.is_some_and(|days| days > 7) {
        line.push_str(" Quanto tempo! Senti sua falta!");
    }
    line
}

/// Answer from the local rule table plus the trait changes it causes.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalReply {
    pub text: String,
    pub deltas: Vec<(Trait, f64)>,
}

impl LocalReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            deltas: Vec::new(),
        }
    }
}

/// Rule-based answers used when AI is disabled. `None` means no rule matched.
pub fn local_reply(text: &str, state: &PersonalityState) -> Option<LocalReply> {
    let text = text.to_lowercase();

    if text.contains("como você está") || text.contains("como voce esta") {
        return Some(LocalReply::plain(how_am_i(state)));
    }
    if text.contains("piada") {
        return Some(LocalReply::plain(pick(JOKES)));
    }
    if text.contains("resistor") && (text.contains("cor") || text.contains("código")) {
        return Some(decode_resistor(&text));
    }
    if text.contains("curto") {
        return Some(LocalReply {
            text: "CURTO-CIRCUITO?! Já ouviu a mágica fumaça escapar? 😱".to_string(),
            deltas: vec![(Trait::Mood, -20.0)],
        });
    }
    if text.contains("obrigado") {
        return Some(LocalReply {
            text: "Por nada! Servir é minha função... literalmente, porque tenho fontes chaveadas!"
                .to_string(),
            deltas: vec![(Trait::Mood, 10.0)],
        });
    }
    None
}

fn how_am_i(state: &PersonalityState) -> &'static str {
    let mood = state.mood();
    let energy = state.energy();
    if mood > 70.0 {
        if energy > 70.0 {
            "Estou ELETRIZANTE! Cheio de energia e pronto para ajudar!"
        } else {
            "Estou feliz, mas meu capacitor de energia está meio descarregado..."
        }
    } else if mood > 40.0 {
        "Estou estável, como uma boa fonte linear. Sem oscilações!"
    } else if energy < 30.0 {
        "Estou em modo de baixo consumo... Me sinto um Arduino em sleep mode 😴"
    } else {
        "Estou meio pra baixo... Acho que vi muitos componentes queimados hoje."
    }
}

fn color_digit(word: &str) -> Option<u32> {
    let digit = match word {
        "preto" => 0,
        "marrom" => 1,
        "vermelho" => 2,
        "laranja" => 3,
        "amarelo" => 4,
        "verde" => 5,
        "azul" => 6,
        "violeta" => 7,
        "cinza" => 8,
        "branco" => 9,
        _ => return None,
    };
    Some(digit)
}

/// Three-band colour code: two digits and a multiplier.
pub fn decode_resistor(text: &str) -> LocalReply {
    let colors: Vec<(&str, u32)> = text
        .split_whitespace()
        .filter_map(|word| color_digit(word).map(|digit| (word, digit)))
        .collect();

    if colors.len() < 3 {
        return LocalReply::plain(
            "Preciso de pelo menos 3 cores! Exemplo: resistor marrom preto vermelho",
        );
    }

    let value = (colors[0].1 as u64 * 10 + colors[1].1 as u64) * 10u64.pow(colors[2].1);
    let value_str = if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}K", value as f64 / 1_000.0)
    } else {
        value.to_string()
    };

    let names: Vec<&str> = colors.iter().take(3).map(|(name, _)| *name).collect();
    let mut text = format!("Resistor {} = {} ohms", names.join(", "), value_str);
    if value < 100 {
        text.push_str(" Nossa, baixa resistência! Cuidado com a corrente!");
    } else if value > 1_000_000 {
        text.push_str(" Uau, megohm! Esse é para circuitos de alta impedância!");
    }

    LocalReply {
        text,
        deltas: vec![(Trait::Mood, 5.0)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state(mood: f64, energy: f64) -> PersonalityState {
        PersonalityState::new(mood, energy, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0)
    }

    #[test]
    fn resistor_brown_black_red_is_one_k() {
        let reply = decode_resistor("resistor cor marrom preto vermelho");
        assert_eq!(reply.text, "Resistor marrom, preto, vermelho = 1.0K ohms");
        assert_eq!(reply.deltas, vec![(Trait::Mood, 5.0)]);
    }

    #[test]
    fn resistor_needs_three_colors() {
        let reply = decode_resistor("resistor cor marrom preto");
        assert!(reply.text.starts_with("Preciso de pelo menos 3 cores"));
        assert!(reply.deltas.is_empty());
    }

    #[test]
    fn low_value_resistor_gets_warning() {
        let reply = decode_resistor("código vermelho vermelho preto");
        assert!(reply.text.contains("= 22 ohms"));
        assert!(reply.text.contains("baixa resistência"));
    }

    #[test]
    fn local_rules_adjust_mood() {
        let s = state(50.0, 50.0);
        let short = local_reply("deu curto aqui", &s).expect("rule");
        assert_eq!(short.deltas, vec![(Trait::Mood, -20.0)]);
        let thanks = local_reply("obrigado vis", &s).expect("rule");
        assert_eq!(thanks.deltas, vec![(Trait::Mood, 10.0)]);
        assert!(local_reply("qual a capital da frança", &s).is_none());
    }

    #[test]
    fn how_am_i_tracks_mood_and_energy() {
        let reply = local_reply("como você está?", &state(90.0, 90.0)).unwrap();
        assert!(reply.text.contains("ELETRIZANTE"));
        let reply = local_reply("como você está?", &state(10.0, 10.0)).unwrap();
        assert!(reply.text.contains("sleep mode"));
    }

    #[test]
    fn greeting_mentions_long_absence() {
        let morning = Local.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let line = greeting(&state(50.0, 50.0), morning, Some(10));
        assert!(line.ends_with("Quanto tempo! Senti sua falta!"));
        let line = greeting(&state(50.0, 50.0), morning, Some(2));
        assert!(!line.contains("Quanto tempo"));
    }

    #[test]
    fn period_boundaries() {
        assert_eq!(period_of_day(5), "manhã");
        assert_eq!(period_of_day(12), "tarde");
        assert_eq!(period_of_day(18), "noite");
        assert_eq!(period_of_day(2), "noite");
    }
}
