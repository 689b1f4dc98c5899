//! The speaker library: every known profile plus the matching, auto-learn
//! and enrollment logic that grows them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::speaker::{Embedding, LayerPlacement, SpeakerProfile};

/// Matching thresholds, overridable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Phase-1 screening floor on max similarity.
    pub boundary_threshold: f32,
    /// High-confidence floor; also gates auto-learning.
    pub auto_learn_threshold: f32,
    /// Required core-score gap before a multi-candidate match resolves.
    pub conflict_margin: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            boundary_threshold: defaults::BOUNDARY_THRESHOLD,
            auto_learn_threshold: defaults::AUTO_LEARN_THRESHOLD,
            conflict_margin: defaults::CONFLICT_MARGIN,
        }
    }
}

/// How confident a resolved match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Score cleared the auto-learn threshold; safe to learn from.
    High,
    /// Above the screening floor but below the auto-learn threshold.
    Medium,
}

/// Result of matching one embedding against the library.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// No profile cleared the screening threshold.
    Unmatched,
    Matched {
        name: String,
        score: f32,
        confidence: Confidence,
    },
    /// Two or more profiles survived and the core re-rank could not
    /// separate the top two.
    Conflict {
        first: String,
        second: String,
        score: f32,
    },
}

/// Per-speaker occupancy, for status displays and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub name: String,
    pub core: usize,
    pub boundary: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceLibrary {
    speakers: BTreeMap<String, SpeakerProfile>,
    config: MatcherConfig,
    auto_name_counter: u64,
}

impl VoiceLibrary {
    pub fn new() -> Self {
        Self::with_config(MatcherConfig::default())
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        Self {
            speakers: BTreeMap::new(),
            config,
            auto_name_counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn speaker_names(&self) -> Vec<String> {
        self.speakers.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&SpeakerProfile> {
        self.speakers.get(name)
    }

    pub fn profile_stats(&self) -> Vec<ProfileStats> {
        self.speakers
            .values()
            .map(|p| ProfileStats {
                name: p.name().to_string(),
                core: p.core_len(),
                boundary: p.boundary_len(),
            })
            .collect()
    }

    /// Two-phase match.
    ///
    /// Phase 1 screens every profile by max similarity across both layers.
    /// A single survivor wins outright. With several survivors, phase 2
    /// re-ranks by core-only similarity and resolves when the top two are
    /// separated by at least the conflict margin.
    pub fn match_embedding(&self, embedding: &Embedding) -> MatchOutcome {
        let mut survivors: Vec<(&SpeakerProfile, f32)> = self
            .speakers
            .values()
            .map(|p| (p, p.max_similarity(embedding)))
            .filter(|(_, score)| *score >= self.config.boundary_threshold)
            .collect();

        match survivors.len() {
            0 => MatchOutcome::Unmatched,
            1 => {
                let (profile, score) = survivors.remove(0);
                MatchOutcome::Matched {
                    name: profile.name().to_string(),
                    score,
                    confidence: self.confidence_for(score),
                }
            }
            _ => {
                let mut ranked: Vec<(&SpeakerProfile, f32)> = survivors
                    .into_iter()
                    .map(|(p, _)| (p, p.max_core_similarity(embedding)))
                    .collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

                let (best, best_score) = ranked[0];
                let (runner_up, runner_score) = ranked[1];
                if best_score - runner_score >= self.config.conflict_margin {
                    MatchOutcome::Matched {
                        name: best.name().to_string(),
                        score: best_score,
                        confidence: self.confidence_for(best_score),
                    }
                } else {
                    MatchOutcome::Conflict {
                        first: best.name().to_string(),
                        second: runner_up.name().to_string(),
                        score: best_score,
                    }
                }
            }
        }
    }

    fn confidence_for(&self, score: f32) -> Confidence {
        if score >= self.config.auto_learn_threshold {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }

    /// Feeds a matched embedding back into its profile. Scores below the
    /// auto-learn threshold are rejected without touching the profile.
    pub fn auto_learn(
        &mut self,
        name: &str,
        embedding: Embedding,
        score: f32,
    ) -> Result<LayerPlacement> {
        if score < self.config.auto_learn_threshold {
            return Ok(LayerPlacement::Rejected);
        }
        let profile = self
            .speakers
            .get_mut(name)
            .ok_or_else(|| VoxscribeError::UnknownSpeaker {
                name: name.to_string(),
            })?;
        Ok(profile.add_embedding(embedding))
    }

    /// Enrolls a speaker from a set of embeddings. A new profile's core is
    /// seeded with a farthest-first selection of up to the core cap; an
    /// existing profile absorbs the samples one by one through its normal
    /// layering rules. Returns the number of embeddings stored.
    pub fn enroll(&mut self, name: &str, embeddings: &[Embedding]) -> usize {
        if embeddings.is_empty() {
            return 0;
        }
        if let Some(profile) = self.speakers.get_mut(name) {
            return embeddings
                .iter()
                .filter(|e| profile.add_embedding((*e).clone()) != LayerPlacement::Rejected)
                .count();
        }
        let selected = select_diverse(embeddings, defaults::MAX_CORE_EMBEDDINGS);
        let stored = selected.len();
        self.speakers
            .insert(name.to_string(), SpeakerProfile::from_core(name, selected));
        stored
    }

    /// Creates a sequentially named profile seeded with one embedding and
    /// returns the generated name.
    pub fn auto_enroll(&mut self, embedding: Embedding) -> String {
        loop {
            self.auto_name_counter += 1;
            let name = format!("Speaker {}", self.auto_name_counter);
            if !self.speakers.contains_key(&name) {
                self.speakers
                    .insert(name.clone(), SpeakerProfile::new(&name, embedding));
                return name;
            }
        }
    }
}

/// Farthest-first selection: start from the first sample, then repeatedly
/// take the candidate whose minimum distance to the already-selected set is
/// largest. Maximizes spread when only `limit` slots are available.
fn select_diverse(embeddings: &[Embedding], limit: usize) -> Vec<Embedding> {
    if embeddings.len() <= limit {
        return embeddings.to_vec();
    }

    let mut selected: Vec<Embedding> = vec![embeddings[0].clone()];
    let mut remaining: Vec<&Embedding> = embeddings[1..].iter().collect();

    while selected.len() < limit && !remaining.is_empty() {
        let (best_idx, _) = remaining
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let min_dist = selected
                    .iter()
                    .map(|s| s.distance(candidate))
                    .fold(f32::INFINITY, f32::min);
                (i, min_dist)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));
        selected.push(remaining.swap_remove(best_idx).clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Embedding {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        Embedding::from_unit(v)
    }

    fn mix(a: f32, b: f32) -> Embedding {
        Embedding::normalized(vec![a, b, 0.0, 0.0])
    }

    fn two_speaker_library() -> VoiceLibrary {
        let mut lib = VoiceLibrary::new();
        lib.enroll("Alice", &[unit(4, 0)]);
        lib.enroll("Bob", &[unit(4, 1)]);
        lib
    }

    #[test]
    fn test_empty_library_is_unmatched() {
        let lib = VoiceLibrary::new();
        assert_eq!(lib.match_embedding(&unit(4, 0)), MatchOutcome::Unmatched);
    }

    #[test]
    fn test_far_probe_is_unmatched() {
        let lib = two_speaker_library();
        assert_eq!(lib.match_embedding(&unit(4, 3)), MatchOutcome::Unmatched);
    }

    #[test]
    fn test_single_survivor_high_confidence() {
        let lib = two_speaker_library();
        // similarity ~0.97 to Alice, ~0.24 to Bob
        let outcome = lib.match_embedding(&mix(1.0, 0.25));
        match outcome {
            MatchOutcome::Matched {
                name,
                score,
                confidence,
            } => {
                assert_eq!(name, "Alice");
                assert!(score > 0.9);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_single_survivor_medium_confidence() {
        let mut lib = VoiceLibrary::new();
        lib.enroll("Alice", &[unit(4, 0)]);
        // similarity ~0.45: above screening, below auto-learn
        let outcome = lib.match_embedding(&mix(1.0, 2.0));
        match outcome {
            MatchOutcome::Matched { confidence, .. } => {
                assert_eq!(confidence, Confidence::Medium);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_equidistant_probe_conflicts() {
        let lib = two_speaker_library();
        let outcome = lib.match_embedding(&mix(1.0, 1.0));
        match outcome {
            MatchOutcome::Conflict { first, second, .. } => {
                let mut pair = [first, second];
                pair.sort();
                assert_eq!(pair, ["Alice".to_string(), "Bob".to_string()]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_margin_resolves_multi_candidate() {
        let lib = two_speaker_library();
        // ~0.89 to Alice, ~0.45 to Bob: both survive phase 1, core gap wins
        let outcome = lib.match_embedding(&mix(2.0, 1.0));
        match outcome {
            MatchOutcome::Matched { name, .. } => assert_eq!(name, "Alice"),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_match_is_idempotent_on_unchanged_library() {
        let lib = two_speaker_library();
        for probe in [mix(1.0, 0.25), mix(1.0, 1.0), unit(4, 3)] {
            assert_eq!(lib.match_embedding(&probe), lib.match_embedding(&probe));
        }
    }

    #[test]
    fn test_enrolled_embedding_matches_back_with_full_score() {
        let mut lib = VoiceLibrary::new();
        // five mutually orthogonal samples: maximally dissimilar, so the
        // farthest-first selection keeps all of them
        let samples: Vec<Embedding> = (0..5).map(|i| unit(8, i)).collect();
        let stored = lib.enroll("Alice", &samples);
        assert_eq!(stored, defaults::MAX_CORE_EMBEDDINGS);

        let outcome = lib.match_embedding(&unit(8, 2));
        match outcome {
            MatchOutcome::Matched {
                name,
                score,
                confidence,
            } => {
                assert_eq!(name, "Alice");
                assert!((score - 1.0).abs() < 1e-5);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_auto_learn_rejects_low_score() {
        let mut lib = two_speaker_library();
        let placement = lib
            .auto_learn("Alice", mix(1.0, 0.3), 0.4)
            .unwrap();
        assert_eq!(placement, LayerPlacement::Rejected);
        assert_eq!(lib.get("Alice").unwrap().core_len(), 1);
    }

    #[test]
    fn test_auto_learn_unknown_speaker_errors() {
        let mut lib = VoiceLibrary::new();
        let err = lib.auto_learn("Nobody", unit(4, 0), 0.9).unwrap_err();
        assert!(err.to_string().contains("Unknown speaker: Nobody"));
    }

    #[test]
    fn test_auto_learn_grows_profile() {
        let mut lib = two_speaker_library();
        // distance ~0.15 from Alice's seed: core territory, diverse
        let placement = lib.auto_learn("Alice", mix(1.0, 0.62), 0.9).unwrap();
        assert_eq!(placement, LayerPlacement::Core);
        assert_eq!(lib.get("Alice").unwrap().core_len(), 2);
    }

    #[test]
    fn test_enroll_caps_core_with_diverse_selection() {
        let mut lib = VoiceLibrary::new();
        let samples: Vec<Embedding> = (0..8).map(|i| unit(8, i)).collect();
        let stored = lib.enroll("Alice", &samples);
        assert_eq!(stored, defaults::MAX_CORE_EMBEDDINGS);
        assert_eq!(
            lib.get("Alice").unwrap().core_len(),
            defaults::MAX_CORE_EMBEDDINGS
        );
    }

    #[test]
    fn test_enroll_existing_feeds_through_layering() {
        let mut lib = VoiceLibrary::new();
        lib.enroll("Alice", &[mix(1.0, 0.0)]);
        // near-duplicate of the seed is rejected by the diversity gate
        let stored = lib.enroll("Alice", &[mix(1.0, 0.01)]);
        assert_eq!(stored, 0);
    }

    #[test]
    fn test_select_diverse_prefers_spread() {
        // two tight clusters; a 2-slot selection must take one from each
        let samples = vec![
            mix(1.0, 0.0),
            mix(1.0, 0.02),
            mix(0.0, 1.0),
            mix(0.02, 1.0),
        ];
        let selected = select_diverse(&samples, 2);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].distance(&selected[1]) > 0.5);
    }

    #[test]
    fn test_auto_enroll_names_sequentially() {
        let mut lib = VoiceLibrary::new();
        assert_eq!(lib.auto_enroll(unit(4, 0)), "Speaker 1");
        assert_eq!(lib.auto_enroll(unit(4, 1)), "Speaker 2");
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn test_auto_enroll_skips_taken_names() {
        let mut lib = VoiceLibrary::new();
        lib.enroll("Speaker 1", &[unit(4, 0)]);
        assert_eq!(lib.auto_enroll(unit(4, 1)), "Speaker 2");
    }

    #[test]
    fn test_profile_stats() {
        let lib = two_speaker_library();
        let stats = lib.profile_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "Alice");
        assert_eq!(stats[0].core, 1);
        assert_eq!(stats[0].boundary, 0);
    }
}
