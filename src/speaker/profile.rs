//! Two-layer speaker profiles.
//!
//! A profile keeps a small `core` of highly representative embeddings and a
//! larger `boundary` of atypical but confirmed samples. The core defines the
//! centroid; the distance history around that centroid gives each profile an
//! adaptive acceptance band.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::speaker::Embedding;

/// Where an observed embedding landed when offered to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPlacement {
    /// Close to the centroid and diverse enough: stored in the core.
    Core,
    /// Plausible but atypical: stored in the boundary layer.
    Boundary,
    /// Too far out, too similar to stored samples, or the layer is full.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerProfile {
    name: String,
    core: Vec<Embedding>,
    boundary: Vec<Embedding>,
    centroid: Option<Embedding>,
    /// Cosine distances of every offered sample from the centroid at the
    /// time it was offered, rejected samples included.
    distances: Vec<f32>,
    std_dev: f32,
}

impl SpeakerProfile {
    pub fn new(name: impl Into<String>, seed: Embedding) -> Self {
        let mut profile = Self::empty(name);
        profile.core.push(seed);
        profile.update_centroid();
        profile
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            core: Vec::new(),
            boundary: Vec::new(),
            centroid: None,
            distances: Vec::new(),
            std_dev: defaults::STD_DEV_DEFAULT,
        }
    }

    /// Builds a profile whose core is seeded directly from an enrollment
    /// selection. The distance history starts empty, so the acceptance band
    /// stays at the default until live samples accumulate.
    pub fn from_core(name: impl Into<String>, core: Vec<Embedding>) -> Self {
        let mut profile = Self::empty(name);
        profile.core = core;
        profile.core.truncate(defaults::MAX_CORE_EMBEDDINGS);
        profile.update_centroid();
        profile
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn core_len(&self) -> usize {
        self.core.len()
    }

    pub fn boundary_len(&self) -> usize {
        self.boundary.len()
    }

    pub fn centroid(&self) -> Option<&Embedding> {
        self.centroid.as_ref()
    }

    pub fn std_dev(&self) -> f32 {
        self.std_dev
    }

    /// Highest similarity against any stored embedding, core or boundary.
    pub fn max_similarity(&self, embedding: &Embedding) -> f32 {
        self.core
            .iter()
            .chain(self.boundary.iter())
            .map(|e| e.similarity(embedding))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Highest similarity against core embeddings only.
    pub fn max_core_similarity(&self, embedding: &Embedding) -> f32 {
        self.core
            .iter()
            .map(|e| e.similarity(embedding))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Offers a confirmed embedding to the profile. The centroid distance
    /// enters the history first and the acceptance band is re-estimated, so
    /// every qualifying sample shapes the band whether it is kept or not.
    /// The refreshed band then decides the layer: under one standard
    /// deviation goes to the core, under two to the boundary, anything
    /// further is rejected. Both layers enforce the diversity gate and
    /// their hard caps.
    pub fn add_embedding(&mut self, embedding: Embedding) -> LayerPlacement {
        let centroid = match &self.centroid {
            Some(c) => c.clone(),
            None => {
                self.core.push(embedding);
                self.update_centroid();
                return LayerPlacement::Core;
            }
        };

        let distance = centroid.distance(&embedding);
        self.record_distance(distance);

        let placement = if distance < self.std_dev {
            if self.core.len() < defaults::MAX_CORE_EMBEDDINGS
                && self.is_diverse(&embedding, &self.core)
            {
                LayerPlacement::Core
            } else {
                LayerPlacement::Rejected
            }
        } else if distance < 2.0 * self.std_dev {
            if self.boundary.len() < defaults::MAX_BOUNDARY_EMBEDDINGS
                && self.is_diverse(&embedding, &self.boundary)
            {
                LayerPlacement::Boundary
            } else {
                LayerPlacement::Rejected
            }
        } else {
            LayerPlacement::Rejected
        };

        match placement {
            LayerPlacement::Core => {
                self.core.push(embedding);
                self.update_centroid();
            }
            LayerPlacement::Boundary => {
                self.boundary.push(embedding);
            }
            LayerPlacement::Rejected => {}
        }
        placement
    }

    fn is_diverse(&self, embedding: &Embedding, layer: &[Embedding]) -> bool {
        layer
            .iter()
            .all(|e| e.distance(embedding) >= defaults::MIN_DIVERSITY)
    }

    fn record_distance(&mut self, distance: f32) {
        self.distances.push(distance);
        if self.distances.len() >= defaults::MIN_HISTORY_FOR_STD {
            let n = self.distances.len() as f32;
            let mean: f32 = self.distances.iter().sum::<f32>() / n;
            let variance: f32 = self
                .distances
                .iter()
                .map(|d| (d - mean) * (d - mean))
                .sum::<f32>()
                / n;
            self.std_dev = variance.sqrt().max(defaults::STD_DEV_FLOOR);
        }
    }

    fn update_centroid(&mut self) {
        self.centroid = Embedding::mean(&self.core);
    }
}
