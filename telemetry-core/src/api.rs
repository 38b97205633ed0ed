//! Public emission surface: one thin, typed entry point per game event. Each builds an
//! `EventDescriptor` at the call site and delegates straight through to the dispatcher.
//! `dispatch::emit` already short-circuits when telemetry is disabled, so none of these need
//! to branch themselves.

use crate::dispatch;
use crate::event::{EventDescriptor, EventKind, Extra, ExtraValue, GameObject};
use crate::record::Frame;

#[inline]
fn frame(tic: u64, millis: u64) -> Frame {
    Frame { millis, tic }
}

pub fn on_start_level(tic: u64, millis: u64, actor: &GameObject, extra: Extra<'_>) {
    let event = EventDescriptor::new(EventKind::StartLevel)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_end_level(tic: u64, millis: u64, actor: &GameObject) {
    let event = EventDescriptor::new(EventKind::EndLevel).with_actor(actor);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_targeted(tic: u64, millis: u64, actor: &GameObject, target: &GameObject) {
    let event = EventDescriptor::new(EventKind::Targeted)
        .with_actor(actor)
        .with_target(target);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_killed(tic: u64, millis: u64, actor: &GameObject, target: &GameObject) {
    let event = EventDescriptor::new(EventKind::Killed)
        .with_actor(actor)
        .with_target(target);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_attack(tic: u64, millis: u64, actor: &GameObject, target: &GameObject) {
    let event = EventDescriptor::new(EventKind::Attack)
        .with_actor(actor)
        .with_target(target);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_counter_attack(tic: u64, millis: u64, actor: &GameObject, target: &GameObject) {
    let event = EventDescriptor::new(EventKind::CounterAttack)
        .with_actor(actor)
        .with_target(target);
    dispatch::emit(&event, frame(tic, millis));
}

/// `target` is optional: a hit can land on an object the caller doesn't have a handle for
/// (e.g. scenery). `damage` is always attached as the `damage` extra.
pub fn on_hit(
    tic: u64,
    millis: u64,
    actor: Option<&GameObject>,
    target: Option<&GameObject>,
    damage: i64,
) {
    let extra = Extra { key: "damage", value: ExtraValue::Int(damage) };
    let mut event = EventDescriptor::new(EventKind::Hit).with_extra(extra);
    if let Some(actor) = actor {
        event = event.with_actor(actor);
    }
    if let Some(target) = target {
        event = event.with_target(target);
    }
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_move(tic: u64, millis: u64, actor: &GameObject) {
    let event = EventDescriptor::new(EventKind::Move).with_actor(actor);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_pickup_weapon(tic: u64, millis: u64, actor: &GameObject, weapon_id: i64) {
    let extra = Extra { key: "weapon", value: ExtraValue::Int(weapon_id) };
    let event = EventDescriptor::new(EventKind::PickupWeapon)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_pickup_health(tic: u64, millis: u64, actor: &GameObject, amount: i64) {
    let extra = Extra { key: "amount", value: ExtraValue::Int(amount) };
    let event = EventDescriptor::new(EventKind::PickupHealth)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_pickup_armor(tic: u64, millis: u64, actor: &GameObject, amount: i64) {
    let extra = Extra { key: "amount", value: ExtraValue::Int(amount) };
    let event = EventDescriptor::new(EventKind::PickupArmor)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_pickup_card(tic: u64, millis: u64, actor: &GameObject, card_id: i64) {
    let extra = Extra { key: "card", value: ExtraValue::Int(card_id) };
    let event = EventDescriptor::new(EventKind::PickupCard)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_health_bonus(tic: u64, millis: u64, actor: &GameObject, amount: i64) {
    let extra = Extra { key: "amount", value: ExtraValue::Int(amount) };
    let event = EventDescriptor::new(EventKind::HealthBonus)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_armor_bonus(tic: u64, millis: u64, actor: &GameObject, amount: i64) {
    let extra = Extra { key: "amount", value: ExtraValue::Int(amount) };
    let event = EventDescriptor::new(EventKind::ArmorBonus)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

/// `sector`/`subsector` carry the BSP node's opaque numeric id; the core never looks inside
/// it, it only forwards whatever the game's BSP lookup produced.
pub fn on_entered_sector(tic: u64, millis: u64, actor: &GameObject, sector: u64) {
    let extra = Extra { key: "sector", value: ExtraValue::Int(sector as i64) };
    let event = EventDescriptor::new(EventKind::EnteredSector)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

pub fn on_entered_subsector(tic: u64, millis: u64, actor: &GameObject, subsector: u64) {
    let extra = Extra { key: "subsector", value: ExtraValue::Int(subsector as i64) };
    let event = EventDescriptor::new(EventKind::EnteredSubsector)
        .with_actor(actor)
        .with_extra(extra);
    dispatch::emit(&event, frame(tic, millis));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetryConfig;
    use crate::dispatch;
    use crate::event::{ObjectKind, Position};
    use crate::logging;

    fn player() -> GameObject {
        GameObject {
            id: 1,
            position: Position { x: 0.0, y: 0.0, z: 0.0, angle: 0.0, subsector: 0 },
            kind: ObjectKind::Player,
            health: 100,
            armor: Some(0),
        }
    }

    #[test]
    fn disabled_telemetry_performs_no_io_through_the_public_surface() {
        dispatch::stop_telemetry();
        let config = TelemetryConfig::default();
        dispatch::init_telemetry(&config, logging::discard(), &|_| {});

        let actor = player();
        // None of these should panic or touch the filesystem/network; disabled means a no-op.
        on_move(0, 0, &actor);
        on_hit(1, 1, Some(&actor), None, 5);

        dispatch::stop_telemetry();
    }
}
