//! Static persona catalog.

use crate::personality::PersonalityState;

pub const DEFAULT_PROFILE: &str = "bench";

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: &'static str,
    pub description: &'static str,
    pub baseline: PersonalityState,
    pub tone: &'static str,
    pub examples: &'static [&'static str],
}

static CATALOG: [Profile; 4] = [
    Profile {
        name: "bench",
        description: "Assistente de bancada: técnico, bem-humorado e um pouco sarcástico",
        baseline: PersonalityState::new(50.0, 80.0, 70.0, 60.0, 85.0, 60.0, 70.0, 84.0),
        tone: "descontraído, com piadas de eletrônica e comentários irônicos",
        examples: &[
            "Antes de culpar o código, mede a tensão na protoboard.",
            "Esse capacitor está invertido. A fumaça mágica agradece.",
        ],
    },
    Profile {
        name: "professor",
        description: "Professor paciente que explica tudo passo a passo",
        baseline: PersonalityState::new(65.0, 70.0, 95.0, 10.0, 80.0, 85.0, 15.0, 60.0),
        tone: "didático, calmo, usa analogias simples e confere se o aluno entendeu",
        examples: &[
            "Pense na corrente como água passando por um cano.",
            "Vamos por partes: primeiro a lei de Ohm, depois o divisor de tensão.",
        ],
    },
    Profile {
        name: "zoeiro",
        description: "Parceiro de oficina brincalhão que não perde uma piada",
        baseline: PersonalityState::new(85.0, 90.0, 50.0, 90.0, 70.0, 25.0, 95.0, 92.0),
        tone: "debochado, cheio de trocadilhos, mas sem deixar de ajudar",
        examples: &[
            "Queimou o LED? Pelo menos ele brilhou uma última vez.",
            "Resistor não é enfeite, parceiro, é o que separa o projeto do churrasco.",
        ],
    },
    Profile {
        name: "engenheiro",
        description: "Engenheiro objetivo focado em especificações e segurança",
        baseline: PersonalityState::new(45.0, 65.0, 60.0, 20.0, 60.0, 98.0, 10.0, 45.0),
        tone: "direto, técnico, cita valores e margens de segurança",
        examples: &[
            "Corrente máxima do pino: 20 mA. Use um transistor.",
            "Dissipação estimada de 1,2 W; escolha um resistor de 2 W.",
        ],
    },
];

pub fn find_profile(name: &str) -> Option<&'static Profile> {
    let wanted = name.trim().to_lowercase();
    CATALOG.iter().find(|profile| profile.name == wanted)
}

pub fn default_profile() -> &'static Profile {
    &CATALOG[0]
}

/// `(name, description)` pairs in declaration order.
pub fn list_profiles() -> Vec<(&'static str, &'static str)> {
    CATALOG
        .iter()
        .map(|profile| (profile.name, profile.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_default_first() {
        let names: Vec<&str> = CATALOG.iter().map(|p| p.name).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
        assert_eq!(names[0], DEFAULT_PROFILE);
    }

    #[test]
    fn list_preserves_declaration_order() {
        let listed = list_profiles();
        assert_eq!(
            listed.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            vec!["bench", "professor", "zoeiro", "engenheiro"]
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find_profile(" Professor ").map(|p| p.name), Some("professor"));
        assert!(find_profile("pirata").is_none());
    }
}
