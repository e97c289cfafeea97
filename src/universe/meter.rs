//! Meters: paired current/initial numeric attributes on universe objects.
//!
//! `current` is the live value mutated during a turn. `initial` holds the
//! value at the start of the turn and is only refreshed by back-propagation,
//! so phases that must not react to same-turn changes (combat eligibility,
//! invasion shield checks) read `initial`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upper bound applied to meters with no paired max meter.
pub const METER_LIMIT: f32 = 1_000_000.0;

/// The kinds of meters an object can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeterType {
    Population,
    TargetPopulation,
    Industry,
    TargetIndustry,
    Research,
    TargetResearch,
    Influence,
    TargetInfluence,
    Happiness,
    TargetHappiness,
    Troops,
    MaxTroops,
    RebelTroops,
    Structure,
    MaxStructure,
    Shield,
    MaxShield,
    Defense,
    MaxDefense,
    Fuel,
    MaxFuel,
    Supply,
    MaxSupply,
    Stealth,
    Detection,
    Speed,
}

/// How a current meter relates to its partner meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterPairing {
    /// Current is capped by the partner.
    Max(MeterType),
    /// Current grows toward the partner over turns but is not capped by it.
    Target(MeterType),
}

impl MeterType {
    /// Returns the partner meter for paired current meters.
    pub const fn pairing(self) -> Option<MeterPairing> {
        use MeterType::*;
        match self {
            Population => Some(MeterPairing::Target(TargetPopulation)),
            Industry => Some(MeterPairing::Target(TargetIndustry)),
            Research => Some(MeterPairing::Target(TargetResearch)),
            Influence => Some(MeterPairing::Target(TargetInfluence)),
            Happiness => Some(MeterPairing::Target(TargetHappiness)),
            Troops => Some(MeterPairing::Max(MaxTroops)),
            Structure => Some(MeterPairing::Max(MaxStructure)),
            Shield => Some(MeterPairing::Max(MaxShield)),
            Defense => Some(MeterPairing::Max(MaxDefense)),
            Fuel => Some(MeterPairing::Max(MaxFuel)),
            Supply => Some(MeterPairing::Max(MaxSupply)),
            _ => None,
        }
    }

    /// Influence may run negative; everything else is floored at zero.
    pub const fn lower_bound(self) -> f32 {
        match self {
            MeterType::Influence | MeterType::TargetInfluence => -METER_LIMIT,
            _ => 0.0,
        }
    }
}

/// A single meter value with its start-of-turn snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Meter {
    current: f32,
    initial: f32,
}

impl Meter {
    /// Creates a meter with both current and initial set to `value`.
    pub fn new(value: f32) -> Self {
        Meter { current: value, initial: value }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn initial(&self) -> f32 {
        self.initial
    }

    pub fn set_current(&mut self, value: f32) {
        self.current = value;
    }

    pub fn add_to_current(&mut self, delta: f32) {
        self.current += delta;
    }

    /// Sets both current and initial, used when an object is (re)created.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.initial = value;
    }

    pub fn clamp_current(&mut self, low: f32, high: f32) {
        self.current = self.current.max(low).min(high);
    }

    /// Copies current into initial.
    pub fn back_propagate(&mut self) {
        self.initial = self.current;
    }
}

/// All meters attached to one object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meters(BTreeMap<MeterType, Meter>);

impl Meters {
    pub fn new() -> Self {
        Meters(BTreeMap::new())
    }

    /// Builds a meter set from `(type, value)` pairs.
    pub fn with(values: &[(MeterType, f32)]) -> Self {
        let mut meters = Meters::new();
        for &(ty, value) in values {
            meters.set(ty, value);
        }
        meters
    }

    pub fn get(&self, ty: MeterType) -> Option<&Meter> {
        self.0.get(&ty)
    }

    /// Returns the meter, creating it at zero if absent.
    pub fn get_mut(&mut self, ty: MeterType) -> &mut Meter {
        self.0.entry(ty).or_default()
    }

    /// Current value, or 0 if the object has no such meter.
    pub fn current(&self, ty: MeterType) -> f32 {
        self.0.get(&ty).map_or(0.0, Meter::current)
    }

    /// Initial value, or 0 if the object has no such meter.
    pub fn initial(&self, ty: MeterType) -> f32 {
        self.0.get(&ty).map_or(0.0, Meter::initial)
    }

    pub fn has(&self, ty: MeterType) -> bool {
        self.0.contains_key(&ty)
    }

    /// Sets current and initial together.
    pub fn set(&mut self, ty: MeterType, value: f32) {
        self.get_mut(ty).reset(value);
    }

    pub fn set_current(&mut self, ty: MeterType, value: f32) {
        self.get_mut(ty).set_current(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MeterType, &Meter)> {
        self.0.iter()
    }

    /// Clamps every meter: max-paired meters to `[lower, max]`, others to
    /// `[lower, METER_LIMIT]`.
    pub fn clamp(&mut self) {
        let caps: Vec<(MeterType, f32)> = self
            .0
            .keys()
            .map(|&ty| {
                let high = match ty.pairing() {
                    Some(MeterPairing::Max(max_ty)) => self.current(max_ty),
                    _ => METER_LIMIT,
                };
                (ty, high)
            })
            .collect();
        for (ty, high) in caps {
            let low = ty.lower_bound();
            if let Some(meter) = self.0.get_mut(&ty) {
                meter.clamp_current(low, high.max(low));
            }
        }
    }

    pub fn back_propagate(&mut self) {
        for meter in self.0.values_mut() {
            meter.back_propagate();
        }
    }
}
