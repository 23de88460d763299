//! Blob persistence tests for every built-in handle.
//!
//! What a handle saves must load back to the same blob, including the
//! "nothing stored yet" case.

use ecotope_core::component::{Blob, Component, DerivedFlags, Slot};
use ecotope_core::handle::{Clock, Handle};
use ecotope_core::host::Activity;
use ecotope_core::profile::Profile;
use ecotope_core::testing::{run_tick, FixedNeighbors, MockAgent};
use ecotope_core::types::AgentId;
use ecotope_handles::bundles::{builtin_handles, herbivore, predator};
use ecotope_handles::condition::ConditionHandle;
use ecotope_handles::social::SocialHandle;
use std::sync::Arc;

fn exercised_component() -> (Component, Vec<Arc<dyn Handle>>) {
    let bundle = predator("minecraft:fox", &["minecraft:rabbit"]);
    let profile = Profile::builder("minecraft:fox")
        .merge(bundle.profile.table())
        .set("production.enabled", true)
        .build();
    let mut component = Component::new(Arc::new(profile));
    let mut agent = MockAgent::new(3, "minecraft:fox");
    agent.activity = Activity {
        hunting: true,
        ..Activity::default()
    };
    let neighbors = FixedNeighbors {
        same_type_nearby: 1,
        nearest: Some(AgentId::from_seed(77)),
    };

    for step in [0u64, 20, 1_220, 2_440] {
        let mut flags = DerivedFlags::seeded(agent.activity, agent.baby);
        for handle in &bundle.handles {
            let profile = Arc::clone(component.profile());
            let mut slot = component.slot(handle.id());
            run_tick(handle.as_ref(), &mut agent, &profile, &mut slot, &mut flags, Clock::new(step, 20), &neighbors)
                .expect("tick");
            component.commit(slot);
        }
    }
    (component, bundle.handles)
}

#[test]
fn every_handle_round_trips_its_blob() {
    let (component, handles) = exercised_component();
    for handle in &handles {
        let blob = component.data(handle.id()).cloned().unwrap_or(Blob::Null);
        match handle.save(&blob) {
            Some(saved) => {
                let text = serde_json::to_string(&saved).expect("serialize");
                let parsed: Blob = serde_json::from_str(&text).expect("deserialize");
                assert_eq!(handle.load(&parsed), blob, "{} changed on round trip", handle.id());
            }
            None => assert!(blob.is_null(), "{} dropped a non-empty blob", handle.id()),
        }
    }
}

#[test]
fn state_carrying_handles_wrote_something() {
    let (component, _) = exercised_component();
    for id in ["age", "hunger", "thirst", "condition", "social", "energy", "predation", "breeding", "production"] {
        assert!(component.data(id).is_some(), "{id} should have state after four passes");
    }
    assert!(component.data("diet").is_none(), "diet keeps no state");
}

#[test]
fn empty_blobs_are_not_saved() {
    for handle in builtin_handles() {
        assert_eq!(handle.save(&Blob::Null), None, "{}", handle.id());
    }
}

fn assert_text_round_trip(id: &str, step: u64, blob: &Blob) {
    let text = serde_json::to_string(blob).expect("serialize");
    let parsed: Blob = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(&parsed, blob, "{id} drifted through text at step {step}: {text}");
}

#[test]
fn fractional_state_survives_text_at_every_step() {
    let profile = herbivore("minecraft:goat", &[]).profile;
    let mut agent = MockAgent::new(9, "minecraft:goat");
    let condition = ConditionHandle::new();
    let social = SocialHandle::new();
    let mut condition_slot = Slot::new(condition.id(), Blob::Null);
    let mut social_slot = Slot::new(social.id(), Blob::Null);

    for step in 0..5_000u64 {
        let mut flags = DerivedFlags::seeded(agent.activity, agent.baby);
        // Alternate feeding spells so condition keeps moving both ways.
        match (step / 97) % 3 {
            0 => flags.is_satiated = true,
            1 => flags.is_hungry = true,
            _ => {}
        }
        let neighbors = FixedNeighbors {
            same_type_nearby: usize::from((step / 130) % 2 == 0),
            nearest: None,
        };
        let clock = Clock::new(step, 1 + step % 7);
        run_tick(&condition, &mut agent, &profile, &mut condition_slot, &mut flags, clock, &neighbors).expect("condition");
        run_tick(&social, &mut agent, &profile, &mut social_slot, &mut flags, clock, &neighbors).expect("social");

        assert_text_round_trip(condition.id(), step, condition_slot.raw());
        assert_text_round_trip(social.id(), step, social_slot.raw());
    }
}
