//! Top-level configuration types.
//!
//! These are plain data: the application crate is responsible for loading
//! them (YAML, TOML, CLI — whatever fits its deployment) and passing them to
//! the simulation builder.  Nothing in the core ever mutates them after
//! start-up.

use std::path::PathBuf;

use crate::clock::StepConfig;

// ── InputSource ───────────────────────────────────────────────────────────────

/// Where an input (map, person table) comes from.
///
/// The simulator core does no I/O; this type exists so a host application can
/// carry the source descriptor around and key its own file caches by
/// `(db, collection)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputSource {
    /// A file on disk.
    File(PathBuf),
    /// A database collection, with an optional cache file name
    /// (default `{db}.{collection}.pb`).
    Database {
        db: String,
        collection: String,
        cache: Option<String>,
    },
}

impl InputSource {
    /// Cache file name for this source.
    pub fn cache_path(&self) -> Option<String> {
        match self {
            InputSource::File(_) => None,
            InputSource::Database { db, collection, cache } => Some(
                cache
                    .clone()
                    .unwrap_or_else(|| format!("{db}.{collection}.pb")),
            ),
        }
    }
}

// ── SimFlags ──────────────────────────────────────────────────────────────────

/// Process-wide tunables.  Loaded once, never mutated during a run.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimFlags {
    /// Max-Pressure yellow transition time (s).
    pub mp_yellow_time: f64,
    /// Max-Pressure pedestrian-clear transition time (s).
    pub mp_pedestrian_clear_time: f64,
    /// Max-Pressure all-red transition time (s).
    pub mp_all_red_time: f64,
    /// Max-Pressure phase duration (s).
    pub mp_phase_time: f64,
    /// Max times a Max-Pressure phase may be extended in place.
    pub mp_max_repeat_count: u32,
    /// Offset added to every person's RNG seed.
    pub seed_offset: u64,
    /// Heartbeat log interval in steps.
    pub heartbeat_interval: u32,
    /// Log level name handed to the subscriber ("info", "debug", …).
    pub log_level: String,
}

impl Default for SimFlags {
    fn default() -> Self {
        Self {
            mp_yellow_time: 3.0,
            mp_pedestrian_clear_time: 5.0,
            mp_all_red_time: 3.0,
            mp_phase_time: 15.0,
            mp_max_repeat_count: 6,
            seed_offset: 0,
            heartbeat_interval: 100,
            log_level: "info".to_string(),
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Full simulation configuration.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Map input descriptor (unused by the core, carried for the host).
    pub map_input: Option<InputSource>,
    /// Person input descriptor (unused by the core, carried for the host).
    pub person_input: Option<InputSource>,
    /// Step range and resolution.
    pub step: StepConfig,
    /// If `true` and a junction has a fixed signal program, use it instead of
    /// the Max-Pressure controller.
    pub prefer_fixed_light: bool,
    /// Process-wide tunables.
    pub flags: SimFlags,
}
