//! Engine resolution policy.
//!
//! Decides per call whether an action runs on the fetch engine or the live
//! engine. A tab that already owns a live page stays live; an explicit
//! `fetch` always wins; `auto` never upgrades an existing fetch tab.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// Concrete execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Fetch,
    Live,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Fetch => f.write_str("fetch"),
            Engine::Live => f.write_str("live"),
        }
    }
}

/// Engine requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    #[default]
    Auto,
    Fetch,
    Live,
}

impl EngineMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "fetch" => Some(Self::Fetch),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

/// What the target tab looks like when the decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabBacking {
    /// No tab exists yet (e.g. the first `open`).
    None,
    Fetch,
    Live,
}

/// Result of engine resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDecision {
    pub engine: Engine,
    /// Set when the caller asked for a different engine than the one chosen.
    pub fallback_from: Option<Engine>,
    pub reason: Option<String>,
}

impl EngineDecision {
    fn direct(engine: Engine) -> Self {
        Self {
            engine,
            fallback_from: None,
            reason: None,
        }
    }
}

/// Resolve the engine for one call.
pub fn resolve_engine(
    requested: EngineMode,
    backing: TabBacking,
    live_available: bool,
    allow_fallback: bool,
) -> Result<EngineDecision, BrowserError> {
    if backing == TabBacking::Live {
        return Ok(EngineDecision::direct(Engine::Live));
    }

    match requested {
        EngineMode::Fetch => Ok(EngineDecision::direct(Engine::Fetch)),
        EngineMode::Live if live_available => Ok(EngineDecision::direct(Engine::Live)),
        EngineMode::Live if allow_fallback => Ok(EngineDecision {
            engine: Engine::Fetch,
            fallback_from: Some(Engine::Live),
            reason: Some("live engine unavailable".to_string()),
        }),
        EngineMode::Live => Err(BrowserError::LiveUnavailable(
            "engine=live was requested, no live driver is available and fallback is disabled"
                .to_string(),
        )),
        EngineMode::Auto => match backing {
            TabBacking::Fetch => Ok(EngineDecision::direct(Engine::Fetch)),
            _ if live_available => Ok(EngineDecision::direct(Engine::Live)),
            _ => Ok(EngineDecision::direct(Engine::Fetch)),
        },
    }
}
