//! Capability sets.
//!
//! Agents advertise what their host body can do; handles declare what they
//! need. The engine intersects the two once, when the agent is attached.

use serde::{Deserialize, Serialize};

/// A single host-side capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Capability {
    /// Can be driven by a pathfinding controller.
    Pathfind = 0,
    /// Has a baby/adult life stage.
    Age = 1,
    /// Can swim.
    Swim = 2,
    /// Can reproduce.
    Breed = 3,
    /// Can attack other agents.
    Hunt = 4,
    /// Can fly.
    Fly = 5,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Pathfind,
        Capability::Age,
        Capability::Swim,
        Capability::Breed,
        Capability::Hunt,
        Capability::Fly,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A small bit set of [`Capability`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);

    pub const fn of(cap: Capability) -> Self {
        Capabilities(cap.bit())
    }

    pub const fn with(self, cap: Capability) -> Self {
        Capabilities(self.0 | cap.bit())
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// True when every capability in `required` is present.
    pub fn satisfies(self, required: Capabilities) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Capabilities::NONE, Capabilities::with)
    }
}
