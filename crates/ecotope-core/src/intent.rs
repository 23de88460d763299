//! Behavior intents handed to the host's task executor.
//!
//! The engine does not run goals itself. At attach time each handle may
//! describe what it wants the agent to do (the effect), how urgently (the
//! priority, lower runs first) and when it applies (a predicate over the
//! agent's derived flags). The host starts the effect while the predicate
//! holds and stops it when it no longer does.

use crate::component::DerivedFlags;
use std::fmt;
use std::sync::Arc;

/// Shared predicate over an agent's current flags.
pub type IntentPredicate = Arc<dyn Fn(&DerivedFlags) -> bool + Send + Sync>;

/// What the host should start doing.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentEffect {
    /// Run away from any of `predators` seen within `detection_range`.
    Flee {
        predators: Vec<String>,
        detection_range: f64,
        flee_distance: f64,
        walk_speed: f64,
        sprint_speed: f64,
    },
    /// Chase and attack one of `prey` within `detection_range`.
    Hunt {
        prey: Vec<String>,
        detection_range: f64,
    },
    SeekFood,
    SeekWater,
    /// Move toward members of the same species within `radius`.
    SeekGroup { radius: f64 },
    /// Look for a partner to breed with.
    Breed,
}

/// One priority/predicate/effect registration.
#[derive(Clone)]
pub struct BehaviorIntent {
    pub priority: i32,
    /// Id of the handle that registered it.
    pub source: &'static str,
    pub effect: IntentEffect,
    predicate: IntentPredicate,
}

impl BehaviorIntent {
    /// An intent that always applies until narrowed with [`when`](Self::when).
    pub fn new(source: &'static str, priority: i32, effect: IntentEffect) -> Self {
        Self {
            priority,
            source,
            effect,
            predicate: Arc::new(|_| true),
        }
    }

    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DerivedFlags) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn applies(&self, flags: &DerivedFlags) -> bool {
        (self.predicate)(flags)
    }
}

impl fmt::Debug for BehaviorIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorIntent")
            .field("priority", &self.priority)
            .field("source", &self.source)
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

/// Sort intents by priority, keeping registration order among equals.
pub fn sort_by_priority(intents: &mut [BehaviorIntent]) {
    intents.sort_by_key(|i| i.priority);
}
