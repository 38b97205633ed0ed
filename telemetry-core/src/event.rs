//! The event descriptor and the read-only view of a game object the composer consumes. These
//! are the types the public emission surface (`api`) builds at each call site.

use crate::logging::{self, Logger};
use serde_json::Value;

/// Tagged variant over every occurrence the core can compose a record for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StartLevel,
    EndLevel,
    Targeted,
    Killed,
    Attack,
    CounterAttack,
    Hit,
    Move,
    PickupWeapon,
    PickupHealth,
    PickupArmor,
    PickupCard,
    HealthBonus,
    ArmorBonus,
    EnteredSector,
    EnteredSubsector,
}

impl EventKind {
    /// The lowercase, underscore-separated string written to the record's `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StartLevel => "start_level",
            EventKind::EndLevel => "end_level",
            EventKind::Targeted => "targeted",
            EventKind::Killed => "killed",
            EventKind::Attack => "attack",
            EventKind::CounterAttack => "counter_attack",
            EventKind::Hit => "hit",
            EventKind::Move => "move",
            EventKind::PickupWeapon => "pickup_weapon",
            EventKind::PickupHealth => "pickup_health",
            EventKind::PickupArmor => "pickup_armor",
            EventKind::PickupCard => "pickup_card",
            EventKind::HealthBonus => "health_bonus",
            EventKind::ArmorBonus => "armor_bonus",
            EventKind::EnteredSector => "entered_sector",
            EventKind::EnteredSubsector => "entered_subsector",
        }
    }
}

/// The closed set of enemy/projectile labels. `Unknown` is what an unrecognized engine type
/// maps to: never a fatal condition, just a logged warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyKind {
    Soldier,
    ShotgunSoldier,
    Imp,
    Demon,
    Spectre,
    Vile,
    Undead,
    LostSoul,
    Cacodemon,
    CacodemonFireball,
    BaronOfHell,
    BaronFireball,
    ImpFireball,
    Barrel,
    Rocket,
    Plasma,
    Unknown,
}

impl EnemyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnemyKind::Soldier => "soldier",
            EnemyKind::ShotgunSoldier => "shotgun_soldier",
            EnemyKind::Imp => "imp",
            EnemyKind::Demon => "demon",
            EnemyKind::Spectre => "spectre",
            EnemyKind::Vile => "vile",
            EnemyKind::Undead => "undead",
            EnemyKind::LostSoul => "lost_soul",
            EnemyKind::Cacodemon => "cacodemon",
            EnemyKind::CacodemonFireball => "cacodemon_fireball",
            EnemyKind::BaronOfHell => "baron_of_hell",
            EnemyKind::BaronFireball => "baron_fireball",
            EnemyKind::ImpFireball => "imp_fireball",
            EnemyKind::Barrel => "barrel",
            EnemyKind::Rocket => "rocket",
            EnemyKind::Plasma => "plasma",
            EnemyKind::Unknown => "unknown_enemy",
        }
    }
}

/// The engine's raw `mobjtype_t`-style classification, exactly as the game hands it to the
/// public emission surface. Only the types this core knows how to label are named; everything
/// else carries its raw numeric code in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMobType {
    Possessed,
    Shotguy,
    Troop,
    Sergeant,
    Shadows,
    Vile,
    Undead,
    Skull,
    Head,
    HeadShot,
    Bruiser,
    BruiserShot,
    TroopShot,
    Barrel,
    Rocket,
    Plasma,
    Other(u32),
}

impl EngineMobType {
    /// Resolves a raw engine type to its label, logging a warning and returning `Unknown` for
    /// anything outside the closed mapping.
    pub fn resolve(self, log: &Logger) -> EnemyKind {
        match self {
            EngineMobType::Possessed => EnemyKind::Soldier,
            EngineMobType::Shotguy => EnemyKind::ShotgunSoldier,
            EngineMobType::Troop => EnemyKind::Imp,
            EngineMobType::Sergeant => EnemyKind::Demon,
            EngineMobType::Shadows => EnemyKind::Spectre,
            EngineMobType::Vile => EnemyKind::Vile,
            EngineMobType::Undead => EnemyKind::Undead,
            EngineMobType::Skull => EnemyKind::LostSoul,
            EngineMobType::Head => EnemyKind::Cacodemon,
            EngineMobType::HeadShot => EnemyKind::CacodemonFireball,
            EngineMobType::Bruiser => EnemyKind::BaronOfHell,
            EngineMobType::BruiserShot => EnemyKind::BaronFireball,
            EngineMobType::TroopShot => EnemyKind::ImpFireball,
            EngineMobType::Barrel => EnemyKind::Barrel,
            EngineMobType::Rocket => EnemyKind::Rocket,
            EngineMobType::Plasma => EnemyKind::Plasma,
            EngineMobType::Other(code) => {
                logging::warn!(log, "unrecognized enemy engine type"; "code" => code);
                EnemyKind::Unknown
            }
        }
    }
}

/// What kind of object this is: the player, or one of the closed enemy/projectile labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Player,
    Enemy(EnemyKind),
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Player => "player",
            ObjectKind::Enemy(kind) => kind.as_str(),
        }
    }
}

/// Position plus the opaque BSP subsector id the game already looked up for `(x, y)`. The core
/// never touches the BSP tree itself; it is handed the resulting numeric id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub angle: f32,
    pub subsector: u64,
}

/// A read-only view of a game object, supplied fresh at each call site. `id` should be a
/// process-unique, monotonically assigned identifier (not a raw pointer bit pattern) so it
/// stays a stable correlation id even under a moving-GC or arena-allocated game object store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameObject {
    pub id: u64,
    pub position: Position,
    pub kind: ObjectKind,
    pub health: i32,
    /// Only populated when `kind == ObjectKind::Player`.
    pub armor: Option<i32>,
}

/// A scalar or nested-mapping value attached to a record under `extra.key`. Borrowed for the
/// duration of the emission call; the composer never takes ownership of it.
#[derive(Debug, Clone, Copy)]
pub enum ExtraValue<'a> {
    Int(i64),
    Map(&'a Value),
}

/// The `(key, value)` pair attached to a record. Borrowed, not owned; see `ExtraValue`.
#[derive(Debug, Clone, Copy)]
pub struct Extra<'a> {
    pub key: &'a str,
    pub value: ExtraValue<'a>,
}

/// The small value built at each call site and handed to the composer. `actor`/`target`/
/// `extra` are all borrowed references with a lifetime tied to the call; nothing here is
/// cloned or retained past the composition call that consumes it.
#[derive(Debug, Clone, Copy)]
pub struct EventDescriptor<'a> {
    pub kind: EventKind,
    pub actor: Option<&'a GameObject>,
    pub target: Option<&'a GameObject>,
    pub extra: Option<Extra<'a>>,
}

impl<'a> EventDescriptor<'a> {
    pub fn new(kind: EventKind) -> EventDescriptor<'a> {
        EventDescriptor {
            kind,
            actor: None,
            target: None,
            extra: None,
        }
    }

    #[inline]
    pub fn with_actor(mut self, actor: &'a GameObject) -> Self {
        self.actor = Some(actor);
        self
    }

    #[inline]
    pub fn with_target(mut self, target: &'a GameObject) -> Self {
        self.target = Some(target);
        self
    }

    #[inline]
    pub fn with_extra(mut self, extra: Extra<'a>) -> Self {
        self.extra = Some(extra);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_strings_are_lowercase_underscored() {
        assert_eq!(EventKind::StartLevel.as_str(), "start_level");
        assert_eq!(EventKind::CounterAttack.as_str(), "counter_attack");
        assert_eq!(EventKind::EnteredSubsector.as_str(), "entered_subsector");
    }

    #[test]
    fn unrecognized_engine_type_maps_to_unknown() {
        let log = logging::discard();
        let resolved = EngineMobType::Other(9999).resolve(&log);
        assert_eq!(resolved, EnemyKind::Unknown);
        assert_eq!(resolved.as_str(), "unknown_enemy");
    }

    #[test]
    fn known_engine_type_maps_to_its_label() {
        let log = logging::discard();
        assert_eq!(EngineMobType::Shotguy.resolve(&log), EnemyKind::ShotgunSoldier);
        assert_eq!(EngineMobType::Barrel.resolve(&log), EnemyKind::Barrel);
    }
}
