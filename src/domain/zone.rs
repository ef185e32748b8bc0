//! Zone detector: discretises indicator readings and emits directional signals
//! on qualifying zone transitions.
//!
//! Evaluation is split in two so the caller can persist a zone change before it
//! becomes visible: [`ZoneDetector::evaluate`] is pure, [`ZoneDetector::commit`]
//! applies the transition and runs the dedup gate.

use crate::domain::dedup::SignalDeduplicator;
use crate::domain::indicator::IndicatorState;
use crate::domain::position::Side;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Above,
    Below,
    Oversold,
    Normal,
    Overbought,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Above => "ABOVE",
            Zone::Below => "BELOW",
            Zone::Oversold => "OVERSOLD",
            Zone::Normal => "NORMAL",
            Zone::Overbought => "OVERBOUGHT",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABOVE" => Ok(Zone::Above),
            "BELOW" => Ok(Zone::Below),
            "OVERSOLD" => Ok(Zone::Oversold),
            "NORMAL" => Ok(Zone::Normal),
            "OVERBOUGHT" => Ok(Zone::Overbought),
            other => Err(format!("unknown zone '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneRule {
    /// ABOVE iff fast > slow.
    Crossover,
    /// OVERSOLD / NORMAL / OVERBOUGHT with exit hysteresis.
    Oscillator {
        oversold: f64,
        overbought: f64,
        hysteresis: f64,
    },
}

impl ZoneRule {
    pub fn accepts(&self, zone: Zone) -> bool {
        match self {
            ZoneRule::Crossover => matches!(zone, Zone::Above | Zone::Below),
            ZoneRule::Oscillator { .. } => {
                matches!(zone, Zone::Oversold | Zone::Normal | Zone::Overbought)
            }
        }
    }

    /// Zone for `state` given the zone held before it. `None` when the reading
    /// belongs to a different indicator family than the rule.
    pub fn classify(&self, previous: Option<Zone>, state: &IndicatorState) -> Option<Zone> {
        match (*self, *state) {
            (ZoneRule::Crossover, IndicatorState::DualEma { fast, slow }) => {
                Some(if fast > slow { Zone::Above } else { Zone::Below })
            }
            (
                ZoneRule::Oscillator {
                    oversold,
                    overbought,
                    hysteresis,
                },
                IndicatorState::Oscillator { value },
            ) => {
                // A held extreme is only left once the value clears the band.
                let zone = match previous {
                    Some(Zone::Oversold) if value <= oversold + hysteresis => Zone::Oversold,
                    Some(Zone::Overbought) if value >= overbought - hysteresis => {
                        Zone::Overbought
                    }
                    _ if value <= oversold => Zone::Oversold,
                    _ if value >= overbought => Zone::Overbought,
                    _ => Zone::Normal,
                };
                Some(zone)
            }
            _ => None,
        }
    }

    /// Direction implied by moving from `previous` to `next`, if any.
    pub fn direction(&self, previous: Zone, next: Zone) -> Option<Side> {
        if previous == next {
            return None;
        }
        match self {
            ZoneRule::Crossover => match next {
                Zone::Above => Some(Side::Long),
                Zone::Below => Some(Side::Short),
                _ => None,
            },
            ZoneRule::Oscillator { .. } => match previous {
                Zone::Oversold => Some(Side::Long),
                Zone::Overbought => Some(Side::Short),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub instrument: String,
    pub direction: Side,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Result of evaluating one reading; nothing is applied until committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTransition {
    pub instrument: String,
    pub previous: Option<Zone>,
    pub zone: Zone,
    pub candidate: Option<Side>,
    pub price: f64,
    pub at: DateTime<Utc>,
}

impl ZoneTransition {
    /// True when the zone differs from the stored one and must be persisted.
    pub fn changed(&self) -> bool {
        self.previous != Some(self.zone)
    }

    pub fn is_priming(&self) -> bool {
        self.previous.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalDecision {
    NoSignal,
    Emitted(SignalEvent),
    Suppressed(Side),
    Unconfirmed(Side),
}

#[derive(Debug, Clone)]
pub struct ZoneDetector {
    rule: ZoneRule,
    zones: BTreeMap<String, Zone>,
    dedup: SignalDeduplicator,
}

impl ZoneDetector {
    pub fn new(rule: ZoneRule, dedup_window: Duration) -> Self {
        ZoneDetector {
            rule,
            zones: BTreeMap::new(),
            dedup: SignalDeduplicator::new(dedup_window),
        }
    }

    /// Seeds a zone loaded from the state store. Zones of the wrong family are
    /// rejected so the instrument re-primes instead of misfiring.
    pub fn restore(&mut self, instrument: &str, zone: Zone) -> bool {
        if !self.rule.accepts(zone) {
            return false;
        }
        self.zones.insert(instrument.to_string(), zone);
        true
    }

    pub fn zone(&self, instrument: &str) -> Option<Zone> {
        self.zones.get(instrument).copied()
    }

    pub fn zones(&self) -> Vec<(String, Zone)> {
        self.zones.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn evaluate(
        &self,
        instrument: &str,
        state: &IndicatorState,
        price: f64,
        at: DateTime<Utc>,
    ) -> Option<ZoneTransition> {
        let previous = self.zone(instrument).filter(|z| self.rule.accepts(*z));
        let zone = self.rule.classify(previous, state)?;
        let candidate = previous.and_then(|prev| self.rule.direction(prev, zone));

        Some(ZoneTransition {
            instrument: instrument.to_string(),
            previous,
            zone,
            candidate,
            price,
            at,
        })
    }

    /// Applies the transition. The zone is always updated; a candidate signal
    /// is emitted only if `confirmed` and it passes the dedup window.
    pub fn commit(&mut self, transition: &ZoneTransition, confirmed: bool) -> SignalDecision {
        if transition.changed() {
            self.zones
                .insert(transition.instrument.clone(), transition.zone);
        }

        let Some(direction) = transition.candidate else {
            return SignalDecision::NoSignal;
        };
        if !confirmed {
            return SignalDecision::Unconfirmed(direction);
        }
        if !self
            .dedup
            .admit(&transition.instrument, direction, transition.at)
        {
            return SignalDecision::Suppressed(direction);
        }

        SignalDecision::Emitted(SignalEvent {
            instrument: transition.instrument.clone(),
            direction,
            timestamp: transition.at,
            price: transition.price,
        })
    }
}
