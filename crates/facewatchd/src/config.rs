use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Monitoring configuration.
///
/// Layered as: built-in defaults, then the optional TOML file, then
/// `FACEWATCH_*` environment variables. CLI flags are applied on top by
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture size; the driver may choose another.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Replay a directory of images instead of opening the camera.
    pub replay_dir: Option<PathBuf>,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory of known-face photos; file stem = identity name.
    pub known_faces_dir: PathBuf,
    /// Where snapshots of unknown faces are written.
    pub snapshot_dir: PathBuf,
    /// Path to the SQLite detection log.
    pub db_path: PathBuf,
    /// Maximum cosine distance for a registry match.
    pub tolerance: f32,
    /// Minimum SCRFD score for a detection.
    pub detector_confidence: f32,
    /// Rewrite an annotated JPEG of every frame here.
    pub preview_path: Option<PathBuf>,
    /// TrueType font for preview labels; a system font is used when unset.
    pub label_font: Option<PathBuf>,
}

/// On-disk form of [`Config`]; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    replay_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    known_faces_dir: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    tolerance: Option<f32>,
    detector_confidence: Option<f32>,
    preview_path: Option<PathBuf>,
    label_font: Option<PathBuf>,
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            replay_dir: None,
            model_dir: facewatch_core::default_model_dir(),
            known_faces_dir: data_dir.join("known_faces"),
            snapshot_dir: data_dir.join("detected_faces"),
            db_path: data_dir.join("database").join("faces.db"),
            tolerance: facewatch_core::DEFAULT_TOLERANCE,
            detector_confidence: 0.5,
            preview_path: None,
            label_font: None,
        }
    }

    /// Load the layered configuration.
    ///
    /// `file` takes precedence over `FACEWATCH_CONFIG`; with neither, no
    /// file is read.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::with_data_dir(&default_data_dir());

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("FACEWATCH_CONFIG").map(PathBuf::from));
        if let Some(path) = file {
            config.apply_file(&path)?;
        }

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "applying config file");

        let FileConfig {
            camera_device,
            frame_width,
            frame_height,
            replay_dir,
            model_dir,
            known_faces_dir,
            snapshot_dir,
            db_path,
            tolerance,
            detector_confidence,
            preview_path,
            label_font,
        } = file;

        set(&mut self.camera_device, camera_device);
        set(&mut self.frame_width, frame_width);
        set(&mut self.frame_height, frame_height);
        set(&mut self.model_dir, model_dir);
        set(&mut self.known_faces_dir, known_faces_dir);
        set(&mut self.snapshot_dir, snapshot_dir);
        set(&mut self.db_path, db_path);
        set(&mut self.tolerance, tolerance);
        set(&mut self.detector_confidence, detector_confidence);
        if replay_dir.is_some() {
            self.replay_dir = replay_dir;
        }
        if preview_path.is_some() {
            self.preview_path = preview_path;
        }
        if label_font.is_some() {
            self.label_font = label_font;
        }
        Ok(())
    }

    /// Apply `FACEWATCH_*` variables. Unparseable numbers are ignored.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        set(&mut self.camera_device, lookup("FACEWATCH_CAMERA_DEVICE"));
        set(&mut self.frame_width, parsed(&lookup, "FACEWATCH_FRAME_WIDTH"));
        set(&mut self.frame_height, parsed(&lookup, "FACEWATCH_FRAME_HEIGHT"));
        set(&mut self.model_dir, lookup("FACEWATCH_MODEL_DIR").map(PathBuf::from));
        set(&mut self.known_faces_dir, lookup("FACEWATCH_KNOWN_FACES_DIR").map(PathBuf::from));
        set(&mut self.snapshot_dir, lookup("FACEWATCH_SNAPSHOT_DIR").map(PathBuf::from));
        set(&mut self.db_path, lookup("FACEWATCH_DB_PATH").map(PathBuf::from));
        set(&mut self.tolerance, parsed(&lookup, "FACEWATCH_TOLERANCE"));
        set(&mut self.detector_confidence, parsed(&lookup, "FACEWATCH_DETECTOR_CONFIDENCE"));
        if let Some(dir) = lookup("FACEWATCH_REPLAY_DIR") {
            self.replay_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("FACEWATCH_PREVIEW_PATH") {
            self.preview_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("FACEWATCH_LABEL_FONT") {
            self.label_font = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(0.0..1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be in [0, 1), got {}",
                self.detector_confidence
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::Invalid("frame size must be non-zero".into()));
        }
        Ok(())
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(facewatch_core::DETECTOR_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(facewatch_core::RECOGNIZER_MODEL_FILE)
    }
}

/// `$XDG_DATA_HOME/facewatch`, falling back to `~/.local/share/facewatch`.
fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facewatch")
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> Config {
        Config::with_data_dir(Path::new("/data/facewatch"))
    }

    #[test]
    fn test_defaults() {
        let config = base();
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.tolerance, 0.5);
        assert_eq!(config.db_path, PathBuf::from("/data/facewatch/database/faces.db"));
        assert_eq!(config.snapshot_dir, PathBuf::from("/data/facewatch/detected_faces"));
        assert_eq!(config.known_faces_dir, PathBuf::from("/data/facewatch/known_faces"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facewatch.toml");
        let text = concat!(
            "tolerance = 0.6\n",
            "camera_device = \"/dev/video4\"\n",
            "preview_path = \"/tmp/preview.jpg\"\n",
            "label_font = \"/opt/fonts/Mono.ttf\"\n",
        );
        std::fs::write(&path, text).unwrap();

        let mut config = base();
        config.apply_file(&path).unwrap();
        assert_eq!(config.tolerance, 0.6);
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.preview_path, Some(PathBuf::from("/tmp/preview.jpg")));
        assert_eq!(config.label_font, Some(PathBuf::from("/opt/fonts/Mono.ttf")));

        let env: HashMap<&str, &str> = [
            ("FACEWATCH_TOLERANCE", "0.45"),
            ("FACEWATCH_FRAME_WIDTH", "wide"),
            ("FACEWATCH_LABEL_FONT", "/usr/share/fonts/Sans.ttf"),
        ]
        .into_iter()
        .collect();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.tolerance, 0.45);
        assert_eq!(config.frame_width, 640, "unparseable value is ignored");
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.label_font, Some(PathBuf::from("/usr/share/fonts/Sans.ttf")));
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facewatch.toml");
        std::fs::write(&path, "tolerence = 0.6\n").unwrap();

        assert!(matches!(base().apply_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let err = base().apply_file(Path::new("/nonexistent/facewatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_tolerance() {
        let mut config = base();
        config.tolerance = 0.0;
        assert!(config.validate().is_err());
        config.tolerance = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_paths() {
        let mut config = base();
        config.model_dir = PathBuf::from("/models");
        assert_eq!(config.detector_model_path(), PathBuf::from("/models/det_10g.onnx"));
        assert_eq!(config.recognizer_model_path(), PathBuf::from("/models/w600k_r50.onnx"));
    }
}
