//! Game settings and tick-scoped configuration documents.
//!
//! Game settings (ship handling, weapon behavior) arrive as bulk
//! configuration documents. Each [`ConfigDocument`] is a partial overlay that
//! takes effect from its `from_tick` onward; [`GameConfig`] folds every
//! document that applies to a tick over the built-in defaults and hands out
//! an immutable [`GameSettings`] snapshot for that tick.
//!
//! Because settings are resolved by tick rather than stored per state, every
//! trailing state sees exactly the same settings when it simulates the same
//! tick, no matter when the document arrived.
//!
//! All distances and speeds are sub-pixel units (see
//! [`skirmish_types::PIXEL`]); durations are ticks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use skirmish_types::{PIXEL, PhysicsPoint, ROTATION_POINTS, ShipId, Tick, WeaponSlot};

/// Maximum number of chained weapon fires a single slot fire may cause.
pub const MAX_CHAIN_DEPTH: usize = 4;

/// Longest accepted delay or lifetime, in ticks.
pub const MAX_DURATION: Tick = 1 << 24;

/// Largest accepted distance or speed, in sub-pixel units.
pub const MAX_DISTANCE: i32 = 1 << 24;

/// Largest accepted energy, recharge, cost or damage value.
pub const MAX_ENERGY: i32 = 1 << 24;

/// Errors raised while loading or validating game settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to parse a YAML document.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// Failed to parse a JSON document.
    #[error("failed to parse config JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// A ship slot references a weapon that is not defined.
    #[error("ship {ship} slot {slot} references unknown weapon {weapon:?}")]
    UnknownWeapon {
        /// The ship whose slot is invalid.
        ship: ShipId,
        /// The invalid slot.
        slot: WeaponSlot,
        /// The missing weapon name.
        weapon: String,
    },

    /// A weapon's expiration chain references a weapon that is not defined.
    #[error("weapon {weapon:?} chains into unknown weapon {chain:?}")]
    UnknownChainWeapon {
        /// The weapon with the broken chain.
        weapon: String,
        /// The missing chain target.
        chain: String,
    },

    /// A chain of expiration weapons is longer than [`MAX_CHAIN_DEPTH`].
    #[error("weapon {weapon:?} chains deeper than {MAX_CHAIN_DEPTH} levels")]
    ChainTooDeep {
        /// The weapon at the start of the chain.
        weapon: String,
    },

    /// A value is outside its valid range.
    #[error("invalid setting {field} = {value}: {reason}")]
    OutOfRange {
        /// Dotted path of the offending setting.
        field: String,
        /// The rejected value.
        value: i64,
        /// Why it was rejected.
        reason: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Handling and loadout of one ship type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipSettings {
    /// Collision radius.
    pub radius: i32,
    /// Energy after spawning; recharge never exceeds it.
    pub max_energy: i32,
    /// Energy regained per tick.
    pub recharge: i32,
    /// Rotation points turned per tick of LEFT/RIGHT input.
    pub rotation_speed: i32,
    /// Velocity gained per tick of UP/DOWN input.
    pub thrust: i32,
    /// Maximum speed.
    pub max_speed: i32,
    /// Velocity kept after bouncing off a wall, out of 1024.
    pub bounce_friction: i32,
    /// Ticks between death and respawn.
    pub respawn_delay: Tick,
    /// Center of the spawn area.
    pub spawn_center: PhysicsPoint,
    /// Radius of the spawn area.
    pub spawn_radius: i32,
    /// Weapon fired by each slot.
    pub slots: BTreeMap<WeaponSlot, String>,
}

impl Default for ShipSettings {
    fn default() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(WeaponSlot::Gun, "bullet".to_owned());
        slots.insert(WeaponSlot::Bomb, "bomb".to_owned());
        Self {
            radius: 14 * PIXEL,
            max_energy: 1000,
            recharge: 2,
            rotation_speed: ROTATION_POINTS / 100,
            thrust: 40,
            max_speed: 4 * PIXEL,
            bounce_friction: 600,
            respawn_delay: 300,
            spawn_center: PhysicsPoint::new(512 * PIXEL, 512 * PIXEL),
            spawn_radius: 64 * PIXEL,
            slots,
        }
    }
}

/// Behavior of one weapon and the projectiles it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponSettings {
    /// Name the weapon is registered under.
    pub name: String,
    /// Ticks before the same slot may fire again.
    pub fire_delay: Tick,
    /// Energy spent per discharge.
    pub energy_cost: i32,
    /// Projectiles per discharge (coupled siblings).
    pub projectiles: u16,
    /// Rotation between neighboring siblings.
    pub spread: i32,
    /// Projectile speed relative to the firing origin.
    pub speed: i32,
    /// Whether projectiles inherit the shooter's velocity.
    pub inherit_velocity: bool,
    /// Projectile collision radius.
    pub radius: i32,
    /// Ticks until the projectile expires.
    pub lifetime: Tick,
    /// Wall bounces before a tile hit explodes the projectile.
    pub bounces: u16,
    /// Damage to a ship hit directly.
    pub damage: i32,
    /// Damage at the center of the explosion, falling off linearly.
    pub splash_damage: i32,
    /// Radius of splash damage.
    pub splash_radius: i32,
    /// Distance to an enemy ship that triggers the explosion (0 disables).
    pub proximity_radius: i32,
    /// Whether the projectile collides with ships.
    pub hit_ships: bool,
    /// Whether splash damage also hurts the owner.
    pub self_damage: bool,
    /// Whether exploding removes the remaining coupled siblings.
    pub remove_coupled: bool,
    /// Weapon fired from the explosion point when the projectile expires.
    pub expiration_chain: Option<String>,
}

impl WeaponSettings {
    /// A single-shot weapon with conservative defaults.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fire_delay: 20,
            energy_cost: 20,
            projectiles: 1,
            spread: 0,
            speed: 8 * PIXEL,
            inherit_velocity: true,
            radius: 2 * PIXEL,
            lifetime: 200,
            bounces: 0,
            damage: 200,
            splash_damage: 0,
            splash_radius: 0,
            proximity_radius: 0,
            hit_ships: true,
            self_damage: false,
            remove_coupled: false,
            expiration_chain: None,
        }
    }

    fn default_bomb() -> Self {
        Self {
            fire_delay: 80,
            energy_cost: 150,
            speed: 5 * PIXEL,
            lifetime: 400,
            damage: 500,
            splash_damage: 700,
            splash_radius: 64 * PIXEL,
            proximity_radius: 24 * PIXEL,
            ..Self::named("bomb")
        }
    }
}

/// Every setting in effect at one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// Ship types by id.
    pub ships: BTreeMap<ShipId, ShipSettings>,
    /// Weapons by name.
    pub weapons: BTreeMap<String, Arc<WeaponSettings>>,
}

impl Default for GameSettings {
    fn default() -> Self {
        let mut ships = BTreeMap::new();
        ships.insert(ShipId(0), ShipSettings::default());
        let mut weapons = BTreeMap::new();
        weapons.insert("bullet".to_owned(), Arc::new(WeaponSettings::named("bullet")));
        weapons.insert("bomb".to_owned(), Arc::new(WeaponSettings::default_bomb()));
        Self { ships, weapons }
    }
}

impl GameSettings {
    /// Settings of a ship type.
    pub fn ship(&self, ship: ShipId) -> Option<&ShipSettings> {
        self.ships.get(&ship)
    }

    /// A weapon by name.
    pub fn weapon(&self, name: &str) -> Option<&Arc<WeaponSettings>> {
        self.weapons.get(name)
    }

    /// The weapon a ship fires from `slot`, if the slot is equipped.
    pub fn slot_weapon(&self, ship: ShipId, slot: WeaponSlot) -> Option<&Arc<WeaponSettings>> {
        let name = self.ship(ship)?.slots.get(&slot)?;
        self.weapon(name)
    }

    /// Check cross references and ranges.
    ///
    /// Every duration, distance and energy value is bounded so that tick and
    /// physics arithmetic built from settings cannot overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (&ship, settings) in &self.ships {
            let field = |name: &str| format!("ships.{ship}.{name}");
            range(&field("radius"), settings.radius, 1, MAX_DISTANCE)?;
            range(&field("max_energy"), settings.max_energy, 1, MAX_ENERGY)?;
            range(&field("recharge"), settings.recharge, -MAX_ENERGY, MAX_ENERGY)?;
            range(
                &field("rotation_speed"),
                settings.rotation_speed,
                -ROTATION_POINTS,
                ROTATION_POINTS,
            )?;
            range(&field("thrust"), settings.thrust, 0, MAX_DISTANCE)?;
            range(&field("max_speed"), settings.max_speed, 0, MAX_DISTANCE)?;
            range(&field("bounce_friction"), settings.bounce_friction, 0, 1024)?;
            duration(&field("respawn_delay"), settings.respawn_delay, 0)?;
            range(&field("spawn_radius"), settings.spawn_radius, 0, MAX_DISTANCE)?;
            for (&slot, weapon) in &settings.slots {
                if !self.weapons.contains_key(weapon) {
                    return Err(ConfigError::UnknownWeapon {
                        ship,
                        slot,
                        weapon: weapon.clone(),
                    });
                }
            }
        }

        for (name, weapon) in &self.weapons {
            let field = |setting: &str| format!("weapons.{name}.{setting}");
            if weapon.projectiles == 0 {
                return Err(ConfigError::OutOfRange {
                    field: field("projectiles"),
                    value: 0,
                    reason: "must fire at least one projectile",
                });
            }
            duration(&field("fire_delay"), weapon.fire_delay, 0)?;
            duration(&field("lifetime"), weapon.lifetime, 1)?;
            range(&field("energy_cost"), weapon.energy_cost, 0, MAX_ENERGY)?;
            range(&field("spread"), weapon.spread, -ROTATION_POINTS, ROTATION_POINTS)?;
            range(&field("speed"), weapon.speed, 0, MAX_DISTANCE)?;
            range(&field("radius"), weapon.radius, 0, MAX_DISTANCE)?;
            range(&field("damage"), weapon.damage, 0, MAX_ENERGY)?;
            range(&field("splash_damage"), weapon.splash_damage, 0, MAX_ENERGY)?;
            range(&field("splash_radius"), weapon.splash_radius, 0, MAX_DISTANCE)?;
            range(&field("proximity_radius"), weapon.proximity_radius, 0, MAX_DISTANCE)?;
            self.validate_chain(name)?;
        }
        Ok(())
    }

    fn validate_chain(&self, start: &str) -> Result<(), ConfigError> {
        let mut current = start;
        for _ in 0..=MAX_CHAIN_DEPTH {
            let Some(weapon) = self.weapons.get(current) else {
                return Ok(());
            };
            let Some(chain) = weapon.expiration_chain.as_deref() else {
                return Ok(());
            };
            if !self.weapons.contains_key(chain) {
                return Err(ConfigError::UnknownChainWeapon {
                    weapon: current.to_owned(),
                    chain: chain.to_owned(),
                });
            }
            current = chain;
        }
        Err(ConfigError::ChainTooDeep {
            weapon: start.to_owned(),
        })
    }
}

fn range(field: &str, value: i32, min: i32, max: i32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_owned(),
            value: i64::from(value),
            reason: "out of range",
        })
    }
}

fn duration(field: &str, value: Tick, min: Tick) -> Result<(), ConfigError> {
    if (min..=MAX_DURATION).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_owned(),
            value,
            reason: "duration out of range",
        })
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Partial overlay for one ship type. Absent keys keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShipPatch {
    /// See [`ShipSettings::radius`].
    pub radius: Option<i32>,
    /// See [`ShipSettings::max_energy`].
    pub max_energy: Option<i32>,
    /// See [`ShipSettings::recharge`].
    pub recharge: Option<i32>,
    /// See [`ShipSettings::rotation_speed`].
    pub rotation_speed: Option<i32>,
    /// See [`ShipSettings::thrust`].
    pub thrust: Option<i32>,
    /// See [`ShipSettings::max_speed`].
    pub max_speed: Option<i32>,
    /// See [`ShipSettings::bounce_friction`].
    pub bounce_friction: Option<i32>,
    /// See [`ShipSettings::respawn_delay`].
    pub respawn_delay: Option<Tick>,
    /// See [`ShipSettings::spawn_center`].
    pub spawn_center: Option<PhysicsPoint>,
    /// See [`ShipSettings::spawn_radius`].
    pub spawn_radius: Option<i32>,
    /// Slots to (re)assign; other slots keep their weapon.
    pub slots: BTreeMap<WeaponSlot, String>,
}

impl ShipPatch {
    fn apply(&self, ship: &mut ShipSettings) {
        overlay(&mut ship.radius, self.radius);
        overlay(&mut ship.max_energy, self.max_energy);
        overlay(&mut ship.recharge, self.recharge);
        overlay(&mut ship.rotation_speed, self.rotation_speed);
        overlay(&mut ship.thrust, self.thrust);
        overlay(&mut ship.max_speed, self.max_speed);
        overlay(&mut ship.bounce_friction, self.bounce_friction);
        overlay(&mut ship.respawn_delay, self.respawn_delay);
        overlay(&mut ship.spawn_center, self.spawn_center);
        overlay(&mut ship.spawn_radius, self.spawn_radius);
        ship.slots
            .extend(self.slots.iter().map(|(slot, weapon)| (*slot, weapon.clone())));
    }
}

/// Partial overlay for one weapon. Absent keys keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeaponPatch {
    /// See [`WeaponSettings::fire_delay`].
    pub fire_delay: Option<Tick>,
    /// See [`WeaponSettings::energy_cost`].
    pub energy_cost: Option<i32>,
    /// See [`WeaponSettings::projectiles`].
    pub projectiles: Option<u16>,
    /// See [`WeaponSettings::spread`].
    pub spread: Option<i32>,
    /// See [`WeaponSettings::speed`].
    pub speed: Option<i32>,
    /// See [`WeaponSettings::inherit_velocity`].
    pub inherit_velocity: Option<bool>,
    /// See [`WeaponSettings::radius`].
    pub radius: Option<i32>,
    /// See [`WeaponSettings::lifetime`].
    pub lifetime: Option<Tick>,
    /// See [`WeaponSettings::bounces`].
    pub bounces: Option<u16>,
    /// See [`WeaponSettings::damage`].
    pub damage: Option<i32>,
    /// See [`WeaponSettings::splash_damage`].
    pub splash_damage: Option<i32>,
    /// See [`WeaponSettings::splash_radius`].
    pub splash_radius: Option<i32>,
    /// See [`WeaponSettings::proximity_radius`].
    pub proximity_radius: Option<i32>,
    /// See [`WeaponSettings::hit_ships`].
    pub hit_ships: Option<bool>,
    /// See [`WeaponSettings::self_damage`].
    pub self_damage: Option<bool>,
    /// See [`WeaponSettings::remove_coupled`].
    pub remove_coupled: Option<bool>,
    /// Empty string clears the chain.
    pub expiration_chain: Option<String>,
}

impl WeaponPatch {
    fn apply(&self, weapon: &mut WeaponSettings) {
        overlay(&mut weapon.fire_delay, self.fire_delay);
        overlay(&mut weapon.energy_cost, self.energy_cost);
        overlay(&mut weapon.projectiles, self.projectiles);
        overlay(&mut weapon.spread, self.spread);
        overlay(&mut weapon.speed, self.speed);
        overlay(&mut weapon.inherit_velocity, self.inherit_velocity);
        overlay(&mut weapon.radius, self.radius);
        overlay(&mut weapon.lifetime, self.lifetime);
        overlay(&mut weapon.bounces, self.bounces);
        overlay(&mut weapon.damage, self.damage);
        overlay(&mut weapon.splash_damage, self.splash_damage);
        overlay(&mut weapon.splash_radius, self.splash_radius);
        overlay(&mut weapon.proximity_radius, self.proximity_radius);
        overlay(&mut weapon.hit_ships, self.hit_ships);
        overlay(&mut weapon.self_damage, self.self_damage);
        overlay(&mut weapon.remove_coupled, self.remove_coupled);
        if let Some(chain) = &self.expiration_chain {
            weapon.expiration_chain = (!chain.is_empty()).then(|| chain.clone());
        }
    }
}

fn overlay<T: Clone>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// A bulk settings document taking effect from `from_tick`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigDocument {
    /// Human-readable document name used in logs.
    pub name: String,
    /// First tick the document applies to.
    pub from_tick: Tick,
    /// Ship overlays by ship id.
    pub ships: BTreeMap<ShipId, ShipPatch>,
    /// Weapon overlays by weapon name. Unknown names define new weapons.
    pub weapons: BTreeMap<String, WeaponPatch>,
}

impl ConfigDocument {
    /// Parse a document from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the content is not a valid document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Parse a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the content is not a valid document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    fn apply(&self, settings: &mut GameSettings) {
        for (name, patch) in &self.weapons {
            let mut weapon = settings
                .weapons
                .get(name)
                .map_or_else(|| WeaponSettings::named(name), |w| WeaponSettings::clone(w));
            patch.apply(&mut weapon);
            settings.weapons.insert(name.clone(), Arc::new(weapon));
        }
        for (&ship, patch) in &self.ships {
            patch.apply(settings.ships.entry(ship).or_default());
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Tick-scoped game settings built from configuration documents.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Documents ordered by `(from_tick, load sequence)`.
    documents: Vec<(Tick, u64, ConfigDocument)>,
    /// Resolved snapshots: settings in effect from each tick onward.
    resolved: Vec<(Tick, Arc<GameSettings>)>,
    /// Sequence for the next loaded document.
    next_seq: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(GameSettings::default())
    }
}

impl GameConfig {
    /// Create a configuration whose settings are `base` at every tick until
    /// a document overrides them.
    pub fn new(base: GameSettings) -> Self {
        Self {
            documents: Vec::new(),
            resolved: vec![(Tick::MIN, Arc::new(base))],
            next_seq: 0,
        }
    }

    /// Load a document. The resulting settings are validated at every
    /// affected tick; an invalid document leaves the configuration untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in the resolved settings.
    pub fn load(&mut self, document: ConfigDocument) -> Result<(), ConfigError> {
        let seq = self.next_seq;
        let mut documents = self.documents.clone();
        let position =
            documents.partition_point(|(tick, s, _)| (*tick, *s) <= (document.from_tick, seq));
        documents.insert(position, (document.from_tick, seq, document));

        let resolved = self.resolve(&documents)?;
        self.documents = documents;
        self.resolved = resolved;
        self.next_seq = seq.saturating_add(1);
        Ok(())
    }

    fn resolve(
        &self,
        documents: &[(Tick, u64, ConfigDocument)],
    ) -> Result<Vec<(Tick, Arc<GameSettings>)>, ConfigError> {
        let base = self
            .resolved
            .first()
            .map(|(_, settings)| GameSettings::clone(settings))
            .unwrap_or_default();
        let mut resolved = vec![(Tick::MIN, Arc::new(base.clone()))];
        let mut current = base;
        for (tick, _, document) in documents {
            document.apply(&mut current);
            current.validate()?;
            let snapshot = Arc::new(current.clone());
            match resolved.last_mut() {
                Some((last_tick, last)) if last_tick == tick => *last = snapshot,
                _ => resolved.push((*tick, snapshot)),
            }
        }
        Ok(resolved)
    }

    /// Settings in effect at `tick`.
    pub fn settings_at(&self, tick: Tick) -> Arc<GameSettings> {
        let index = self.resolved.partition_point(|(from, _)| *from <= tick);
        self.resolved
            .get(index.saturating_sub(1))
            .map(|(_, settings)| Arc::clone(settings))
            .unwrap_or_default()
    }

    /// Names and start ticks of the loaded documents, in application order.
    pub fn documents(&self) -> impl Iterator<Item = (Tick, &str)> {
        self.documents
            .iter()
            .map(|(tick, _, document)| (*tick, document.name.as_str()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GameSettings::default().validate().is_ok());
        let settings = GameSettings::default();
        assert!(settings.slot_weapon(ShipId(0), WeaponSlot::Gun).is_some());
        assert!(settings.slot_weapon(ShipId(0), WeaponSlot::Burst).is_none());
    }

    #[test]
    fn documents_take_effect_from_their_tick() {
        let mut config = GameConfig::default();
        let doc = ConfigDocument::from_yaml(
            r"
name: faster
from_tick: 100
ships:
  0:
    max_speed: 5000
",
        )
        .unwrap();
        config.load(doc).unwrap();

        assert_eq!(config.settings_at(99).ship(ShipId(0)).unwrap().max_speed, 4 * PIXEL);
        assert_eq!(config.settings_at(100).ship(ShipId(0)).unwrap().max_speed, 5000);
        assert_eq!(config.settings_at(1_000).ship(ShipId(0)).unwrap().max_speed, 5000);
    }

    #[test]
    fn later_loaded_document_wins_on_same_tick() {
        let mut config = GameConfig::default();
        config
            .load(ConfigDocument::from_yaml("from_tick: 5\nships:\n  0:\n    thrust: 1\n").unwrap())
            .unwrap();
        config
            .load(ConfigDocument::from_yaml("from_tick: 5\nships:\n  0:\n    thrust: 2\n").unwrap())
            .unwrap();
        assert_eq!(config.settings_at(5).ship(ShipId(0)).unwrap().thrust, 2);
    }

    #[test]
    fn earlier_document_loaded_late_still_orders_by_tick() {
        let mut config = GameConfig::default();
        config
            .load(ConfigDocument::from_yaml("from_tick: 50\nships:\n  0:\n    thrust: 7\n").unwrap())
            .unwrap();
        config
            .load(ConfigDocument::from_yaml("from_tick: 10\nships:\n  0:\n    recharge: 9\n").unwrap())
            .unwrap();
        let at_20 = config.settings_at(20);
        let at_60 = config.settings_at(60);
        assert_eq!(at_20.ship(ShipId(0)).unwrap().recharge, 9);
        assert_eq!(at_20.ship(ShipId(0)).unwrap().thrust, 40);
        assert_eq!(at_60.ship(ShipId(0)).unwrap().recharge, 9);
        assert_eq!(at_60.ship(ShipId(0)).unwrap().thrust, 7);
    }

    #[test]
    fn new_weapon_and_slot_assignment() {
        let mut config = GameConfig::default();
        let doc = ConfigDocument::from_yaml(
            r"
weapons:
  shrapnel:
    projectiles: 6
    spread: 10922
    lifetime: 30
  cluster:
    expiration_chain: shrapnel
    lifetime: 50
ships:
  0:
    slots:
      burst: cluster
",
        )
        .unwrap();
        config.load(doc).unwrap();
        let settings = config.settings_at(0);
        let cluster = settings.slot_weapon(ShipId(0), WeaponSlot::Burst).unwrap();
        assert_eq!(cluster.expiration_chain.as_deref(), Some("shrapnel"));
        assert_eq!(settings.weapon("shrapnel").unwrap().projectiles, 6);
        // Untouched slots survive the overlay.
        assert!(settings.slot_weapon(ShipId(0), WeaponSlot::Gun).is_some());
    }

    #[test]
    fn unknown_slot_weapon_is_rejected_and_config_unchanged() {
        let mut config = GameConfig::default();
        let doc = ConfigDocument::from_yaml("ships:\n  0:\n    slots:\n      mine: nothing\n").unwrap();
        let result = config.load(doc);
        assert!(matches!(result, Err(ConfigError::UnknownWeapon { .. })));
        assert_eq!(config.documents().count(), 0);
    }

    #[test]
    fn chain_cycle_is_rejected() {
        let mut config = GameConfig::default();
        let doc = ConfigDocument::from_yaml(
            "weapons:\n  a:\n    expiration_chain: b\n  b:\n    expiration_chain: a\n",
        )
        .unwrap();
        assert!(matches!(config.load(doc), Err(ConfigError::ChainTooDeep { .. })));
    }

    #[test]
    fn unbounded_durations_are_rejected() {
        let mut config = GameConfig::default();
        for doc in [
            "weapons:\n  bullet:\n    lifetime: 9223372036854775807\n",
            "weapons:\n  bullet:\n    fire_delay: 9223372036854775807\n",
            "ships:\n  0:\n    respawn_delay: 9223372036854775807\n",
            "weapons:\n  bullet:\n    fire_delay: -1\n",
        ] {
            let result = config.load(ConfigDocument::from_yaml(doc).unwrap());
            assert!(matches!(result, Err(ConfigError::OutOfRange { .. })), "{doc}");
        }
        assert_eq!(config.documents().count(), 0);

        let longest = format!("weapons:\n  bullet:\n    lifetime: {MAX_DURATION}\n");
        config.load(ConfigDocument::from_yaml(&longest).unwrap()).unwrap();
        assert_eq!(config.settings_at(0).weapon("bullet").unwrap().lifetime, MAX_DURATION);
    }

    #[test]
    fn oversized_distances_and_damage_are_rejected() {
        let mut config = GameConfig::default();
        for doc in [
            "weapons:\n  bomb:\n    splash_radius: 2147483647\n",
            "weapons:\n  bullet:\n    damage: 2147483647\n",
            "ships:\n  0:\n    max_speed: -5\n",
        ] {
            let result = config.load(ConfigDocument::from_yaml(doc).unwrap());
            assert!(matches!(result, Err(ConfigError::OutOfRange { .. })), "{doc}");
        }
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let result = ConfigDocument::from_yaml("ships:\n  0:\n    warp_drive: 9\n");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn json_documents_are_accepted() {
        let doc = ConfigDocument::from_json(r#"{"from_tick": 3, "ships": {"1": {"radius": 9000}}}"#)
            .unwrap();
        let mut config = GameConfig::default();
        config.load(doc).unwrap();
        assert_eq!(config.settings_at(3).ship(ShipId(1)).unwrap().radius, 9000);
        assert!(config.settings_at(2).ship(ShipId(1)).is_none());
    }
}
