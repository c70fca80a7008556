//! Bounded personality traits, mood history and the rules that move them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const TRAIT_MIN: f64 = 0.0;
pub const TRAIT_MAX: f64 = 100.0;

pub const MOOD_HISTORY_CAPACITY: usize = 20;

pub const DECAY_INTERVAL: Duration = Duration::from_secs(300);
const DECAY_ENERGY: f64 = 5.0;
const DECAY_MOOD: f64 = 1.0;

const LONG_MESSAGE_WORDS: usize = 10;
const DISTRESS_PHRASES: &[&str] = &["não funcionou", "queimou"];
const EXCHANGE_ENERGY_COST: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Mood,
    Energy,
    Patience,
    Sarcasm,
    Curiosity,
    Professionalism,
    Irony,
    Creativity,
}

impl Trait {
    pub const ALL: [Trait; 8] = [
        Trait::Mood,
        Trait::Energy,
        Trait::Patience,
        Trait::Sarcasm,
        Trait::Curiosity,
        Trait::Professionalism,
        Trait::Irony,
        Trait::Creativity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Trait::Mood => "Humor",
            Trait::Energy => "Energia",
            Trait::Patience => "Paciência",
            Trait::Sarcasm => "Sarcasmo",
            Trait::Curiosity => "Curiosidade",
            Trait::Professionalism => "Profissionalismo",
            Trait::Irony => "Ironia",
            Trait::Creativity => "Criatividade",
        }
    }
}

/// Named traits, each kept inside [0, 100].
///
/// Fields are private so every write passes through [`PersonalityState::set`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityState {
    mood: f64,
    energy: f64,
    patience: f64,
    sarcasm: f64,
    curiosity: f64,
    professionalism: f64,
    irony: f64,
    creativity: f64,
}

impl PersonalityState {
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        mood: f64,
        energy: f64,
        patience: f64,
        sarcasm: f64,
        curiosity: f64,
        professionalism: f64,
        irony: f64,
        creativity: f64,
    ) -> Self {
        Self {
            mood,
            energy,
            patience,
            sarcasm,
            curiosity,
            professionalism,
            irony,
            creativity,
        }
    }

    pub fn get(&self, which: Trait) -> f64 {
        match which {
            Trait::Mood => self.mood,
            Trait::Energy => self.energy,
            Trait::Patience => self.patience,
            Trait::Sarcasm => self.sarcasm,
            Trait::Curiosity => self.curiosity,
            Trait::Professionalism => self.professionalism,
            Trait::Irony => self.irony,
            Trait::Creativity => self.creativity,
        }
    }

    pub fn set(&mut self, which: Trait, value: f64) {
        let value = clamp_trait(value);
        let slot = match which {
            Trait::Mood => &mut self.mood,
            Trait::Energy => &mut self.energy,
            Trait::Patience => &mut self.patience,
            Trait::Sarcasm => &mut self.sarcasm,
            Trait::Curiosity => &mut self.curiosity,
            Trait::Professionalism => &mut self.professionalism,
            Trait::Irony => &mut self.irony,
            Trait::Creativity => &mut self.creativity,
        };
        *slot = value;
    }

    pub fn adjust(&mut self, which: Trait, delta: f64) {
        self.set(which, self.get(which) + delta);
    }

    pub fn mood(&self) -> f64 {
        self.mood
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn creativity(&self) -> f64 {
        self.creativity
    }

    /// Re-clamps every field. Snapshots written by hand may be out of range.
    pub fn normalized(mut self) -> Self {
        for which in Trait::ALL {
            self.set(which, self.get(which));
        }
        self
    }

    /// Words-per-minute for speech synthesis.
    pub fn speech_rate(&self) -> u32 {
        if self.energy > 70.0 {
            200
        } else if self.energy < 30.0 {
            150
        } else {
            180
        }
    }
}

impl Default for PersonalityState {
    fn default() -> Self {
        crate::profiles::default_profile().baseline
    }
}

fn clamp_trait(value: f64) -> f64 {
    if value.is_nan() {
        return TRAIT_MIN;
    }
    value.clamp(TRAIT_MIN, TRAIT_MAX)
}

/// Fixed-capacity FIFO of mood samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct MoodHistory {
    samples: VecDeque<f64>,
}

impl MoodHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MOOD_HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, mood: f64) {
        if self.samples.len() == MOOD_HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(mood);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

impl Default for MoodHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<f64>> for MoodHistory {
    fn from(samples: Vec<f64>) -> Self {
        let mut history = MoodHistory::new();
        for sample in samples {
            history.push(sample);
        }
        history
    }
}

impl From<MoodHistory> for Vec<f64> {
    fn from(history: MoodHistory) -> Self {
        history.samples.into_iter().collect()
    }
}

/// Live personality: the traits plus the mood samples they produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Personality {
    pub state: PersonalityState,
    pub mood_history: MoodHistory,
}

impl Personality {
    pub fn new(state: PersonalityState, mood_history: MoodHistory) -> Self {
        Self {
            state,
            mood_history,
        }
    }

    /// Applies signed deltas, clamps, and records the resulting mood.
    pub fn apply_update(&mut self, deltas: &[(Trait, f64)]) {
        for (which, delta) in deltas {
            self.state.adjust(*which, *delta);
        }
        self.mood_history.push(self.state.mood());
    }

    /// Replaces the whole state, e.g. on a profile switch.
    pub fn reset_to(&mut self, baseline: PersonalityState) {
        self.state = baseline;
        self.mood_history.push(self.state.mood());
    }

    /// Threshold and keyword rules applied after a successful chat exchange.
    pub fn apply_exchange(&mut self, user_text: &str) {
        self.apply_update(&exchange_deltas(user_text));
    }

    /// One tick of passive decay. Does not touch the mood history.
    pub fn decay(&mut self) {
        self.state.adjust(Trait::Energy, -DECAY_ENERGY);
        self.state.adjust(Trait::Mood, -DECAY_MOOD);
    }
}

pub fn exchange_deltas(user_text: &str) -> Vec<(Trait, f64)> {
    let lowered = user_text.to_lowercase();
    let mut deltas = Vec::new();

    if lowered.split_whitespace().count() > LONG_MESSAGE_WORDS {
        deltas.push((Trait::Curiosity, 1.0));
    }
    if DISTRESS_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        deltas.push((Trait::Sarcasm, 1.0));
        deltas.push((Trait::Mood, -2.0));
    }
    deltas.push((Trait::Energy, -EXCHANGE_ENERGY_COST));
    deltas
}

/// Runs decay on `interval` until `stop` is raised.
pub fn spawn_decay_task(
    personality: Arc<RwLock<Personality>>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let mut guard = personality.write().await;
            guard.decay();
            tracing::debug!(
                "Personality decay: energy {:.1}, mood {:.1}",
                guard.state.energy(),
                guard.state.mood()
            );
        }
        tracing::debug!("Decay task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> PersonalityState {
        PersonalityState::new(50.0, 80.0, 70.0, 60.0, 85.0, 60.0, 70.0, 84.0)
    }

    #[test]
    fn updates_stay_clamped_for_any_delta() {
        let mut personality = Personality::new(sample_state(), MoodHistory::new());
        for delta in [1e9, -1e9, 250.0, -250.0, 0.5, f64::INFINITY, f64::NEG_INFINITY] {
            let deltas: Vec<(Trait, f64)> = Trait::ALL.iter().map(|t| (*t, delta)).collect();
            personality.apply_update(&deltas);
            for which in Trait::ALL {
                let value = personality.state.get(which);
                assert!(
                    (TRAIT_MIN..=TRAIT_MAX).contains(&value),
                    "{:?} escaped bounds: {}",
                    which,
                    value
                );
            }
        }
    }

    #[test]
    fn set_clamps_nan_to_floor() {
        let mut state = sample_state();
        state.set(Trait::Irony, f64::NAN);
        assert_eq!(state.get(Trait::Irony), 0.0);
    }

    #[test]
    fn mood_history_evicts_oldest_first() {
        let mut history = MoodHistory::new();
        for i in 0..(MOOD_HISTORY_CAPACITY + 5) {
            history.push(i as f64);
        }
        assert_eq!(history.len(), MOOD_HISTORY_CAPACITY);
        assert_eq!(history.iter().next(), Some(5.0));
        assert_eq!(history.latest(), Some((MOOD_HISTORY_CAPACITY + 4) as f64));
    }

    #[test]
    fn mood_history_deserializes_with_capacity_enforced() {
        let raw: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let json = serde_json::to_string(&raw).unwrap();
        let history: MoodHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(history.len(), MOOD_HISTORY_CAPACITY);
        assert_eq!(history.iter().next(), Some(10.0));
    }

    #[test]
    fn apply_update_appends_mood() {
        let mut personality = Personality::new(sample_state(), MoodHistory::new());
        personality.apply_update(&[(Trait::Mood, 7.0)]);
        assert_eq!(personality.mood_history.latest(), Some(57.0));
    }

    #[test]
    fn long_message_raises_curiosity_and_costs_energy() {
        let mut personality = Personality::new(sample_state(), MoodHistory::new());
        personality.apply_exchange(
            "como eu calculo o resistor certo para um led azul ligado em cinco volts hoje",
        );
        assert_eq!(personality.state.get(Trait::Curiosity), 86.0);
        assert!((personality.state.energy() - 79.9).abs() < 1e-9);
        assert_eq!(personality.state.mood(), 50.0);
    }

    #[test]
    fn distress_phrase_raises_sarcasm_and_lowers_mood() {
        let mut personality = Personality::new(sample_state(), MoodHistory::new());
        personality.apply_exchange("o regulador queimou de novo");
        assert_eq!(personality.state.get(Trait::Sarcasm), 61.0);
        assert_eq!(personality.state.mood(), 48.0);
        assert_eq!(personality.state.get(Trait::Curiosity), 85.0);
        assert_eq!(personality.mood_history.latest(), Some(48.0));
    }

    #[test]
    fn decay_floors_at_zero() {
        let mut personality = Personality::new(
            PersonalityState::new(0.5, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            MoodHistory::new(),
        );
        personality.decay();
        assert_eq!(personality.state.energy(), 0.0);
        assert_eq!(personality.state.mood(), 0.0);
    }

    #[test]
    fn speech_rate_follows_energy() {
        let mut state = sample_state();
        assert_eq!(state.speech_rate(), 200);
        state.set(Trait::Energy, 50.0);
        assert_eq!(state.speech_rate(), 180);
        state.set(Trait::Energy, 10.0);
        assert_eq!(state.speech_rate(), 150);
    }

    #[tokio::test]
    async fn decay_task_runs_until_stopped() {
        let personality = Arc::new(RwLock::new(Personality::new(
            sample_state(),
            MoodHistory::new(),
        )));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_decay_task(personality.clone(), stop.clone(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(60)).await;
        stop.store(true, Ordering::SeqCst);
        handle.await.expect("decay task join");

        let state = personality.read().await.state;
        assert!(state.energy() < 80.0);
        assert!(state.mood() < 50.0);
    }
}
