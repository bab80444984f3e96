//! JSON actor settings files.
//!
//! A settings file carries the actor configuration and the part of the
//! geometry needed to validate it:
//!
//! ```json
//! {
//!   "actor": { "attach_to": "head", "crystal": "crystal", "roulette_factor": 10 },
//!   "geometry": [
//!     { "name": "head", "mother": "world" },
//!     { "name": "crystal", "mother": "head" }
//!   ]
//! }
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use spectcrf_core::{ActorConfig, Placement, RecordMode, Vec3, VolumeTree, WORLD};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Actor configuration together with the geometry it refers to.
#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub config: ActorConfig,
    pub geometry: VolumeTree,
}

// Intermediate structs for the on-disk schema
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonConfig {
    #[serde(default)]
    actor: JsonActor,
    #[serde(default)]
    geometry: Vec<JsonVolume>,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JsonActor {
    name: String,
    attach_to: Option<String>,
    crystal: Option<String>,
    orientation_x: Option<Vec3>,
    orientation_y: Option<Vec3>,
    debug_level: i32,
    roulette_factor: i64,
    record_mode: RecordMode,
    placement: Option<Placement>,
    output: Option<PathBuf>,
}

impl Default for JsonActor {
    fn default() -> Self {
        Self {
            name: "crf".to_string(),
            attach_to: None,
            crystal: None,
            orientation_x: None,
            orientation_y: None,
            debug_level: 0,
            roulette_factor: 1,
            record_mode: RecordMode::PerPass,
            placement: None,
            output: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonVolume {
    name: String,
    #[serde(default = "default_mother")]
    mother: String,
    #[serde(default = "default_copies")]
    copies: u32,
}

fn default_mother() -> String {
    WORLD.to_string()
}

fn default_copies() -> u32 {
    1
}

impl ActorSettings {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// redefines the world volume.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader).map_err(json_error)?;
        Self::from_json_config(json_config)
    }

    /// Loads settings from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON for this schema or
    /// redefines the world volume.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json).map_err(json_error)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(json: JsonConfig) -> Result<Self> {
        let mut geometry = VolumeTree::new();
        for volume in &json.geometry {
            if volume.name == WORLD {
                return Err(Error::InvalidFormat(format!(
                    "geometry entry redefines the {WORLD} volume"
                )));
            }
            geometry.insert_repeated(&volume.name, &volume.mother, volume.copies);
        }

        let actor = json.actor;
        let mut config = ActorConfig::new(&actor.name);
        if let Some(volume) = &actor.attach_to {
            config.attach_to(volume);
        }
        // resolved against the geometry above; unknown names only warn
        if let Some(crystal) = &actor.crystal {
            config.set_crystal_volume(crystal, &geometry);
        }
        if let Some(x) = actor.orientation_x {
            config.set_orientation_x(x);
        }
        if let Some(y) = actor.orientation_y {
            config.set_orientation_y(y);
        }
        config.set_debug_level(actor.debug_level);
        config.set_roulette_factor(actor.roulette_factor);
        config.set_record_mode(actor.record_mode);
        if let Some(placement) = actor.placement {
            config.set_placement(placement);
        }
        if let Some(output) = &actor.output {
            config.set_output(output);
        }

        Ok(Self { config, geometry })
    }
}

fn json_error(source: serde_json::Error) -> Error {
    Error::Json {
        line: source.line(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SETTINGS: &str = r#"{
        "actor": {
            "attach_to": "head",
            "crystal": "crystal",
            "orientation_x": [0, 0, 1],
            "orientation_y": [0, 1, 0],
            "debug_level": 1,
            "roulette_factor": 25,
            "record_mode": "per_event",
            "placement": {
                "translation": [0, 0, 300],
                "rotation": [[1, 0, 0], [0, 1, 0], [0, 0, 1]]
            },
            "output": "crf.csv"
        },
        "geometry": [
            { "name": "head" },
            { "name": "collimator", "mother": "head" },
            { "name": "crystal", "mother": "head" },
            { "name": "pixel", "mother": "collimator", "copies": 4096 }
        ]
    }"#;

    #[test]
    fn test_from_json_full() {
        let settings = ActorSettings::from_json(SETTINGS).unwrap();
        let config = &settings.config;
        assert_eq!(config.attached_volume(), Some("head"));
        assert_eq!(config.crystal_volume(), Some("crystal"));
        assert_eq!(config.debug_level(), 1);
        assert_eq!(config.roulette_factor(), 25);
        assert_eq!(config.record_mode(), RecordMode::PerEvent);
        assert_eq!(config.output(), Some(Path::new("crf.csv")));
        assert_abs_diff_eq!(config.placement().translation.z, 300.0);
        assert_abs_diff_eq!(config.frame().z().x, -1.0);

        assert_eq!(settings.geometry.find("pixel").unwrap().copies, 4096);
        assert!(config.validate(&settings.geometry).is_ok());
    }

    #[test]
    fn test_from_json_defaults() {
        let settings = ActorSettings::from_json("{}").unwrap();
        assert_eq!(settings.config.roulette_factor(), 1);
        assert_eq!(settings.config.record_mode(), RecordMode::PerPass);
        assert!(settings.config.attached_volume().is_none());
        assert_eq!(settings.geometry.len(), 1);
    }

    #[test]
    fn test_unknown_crystal_is_not_a_parse_error() {
        let json = r#"{"actor": {"attach_to": "head", "crystal": "nope"},
                       "geometry": [{"name": "head"}]}"#;
        let settings = ActorSettings::from_json(json).unwrap();
        assert!(settings.config.crystal_volume().is_none());
    }

    #[test]
    fn test_invalid_json_reports_line() {
        let json = "{\n\"actor\": {\n\"roulette_factor\": \"ten\"\n}\n}";
        match ActorSettings::from_json(json) {
            Err(Error::Json { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_world_redefinition_is_rejected() {
        let json = r#"{"actor": {"attach_to": "head", "crystal": "crystal"},
                       "geometry": [{"name": "head"},
                                    {"name": "crystal", "mother": "head"},
                                    {"name": "world", "mother": "head"}]}"#;
        match ActorSettings::from_json(json) {
            Err(Error::InvalidFormat(msg)) => assert!(msg.contains("world")),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();
        file.flush().unwrap();

        let settings = ActorSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.config.roulette_factor(), 25);
    }
}
