use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PicamConfig {
    pub general: GeneralConfig,
    pub telegram: TelegramConfig,
    pub pir: PirConfig,
    pub motion: MotionConfig,
    pub capture: CaptureConfig,
    pub buzzer: BuzzerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeneralConfig {
    /// Seconds to wait for the chat API at startup (0 or negative waits forever)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: i64,

    /// Directory watched for images produced by the capture processes
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Delete images after they were handled
    #[serde(default = "default_delete_images")]
    pub delete_images: bool,

    /// Start in armed state
    #[serde(default = "default_arm")]
    pub arm: bool,

    /// Directory for the rotating log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    /// Bot access token
    #[serde(default)]
    pub token: String,

    /// Chat identities allowed to control the bot and receive images
    #[serde(default)]
    pub owner_ids: Vec<i64>,

    /// Base URL of the bot API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PirConfig {
    #[serde(default)]
    pub enable: bool,

    /// BCM pin of the sensor output
    #[serde(default)]
    pub gpio: Option<u8>,

    /// Command run on every PIR trigger
    #[serde(default)]
    pub capture_cmd: String,

    /// Track motion while disarmed without capturing
    #[serde(default)]
    pub creepy_mode: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    #[serde(default)]
    pub enable: bool,

    /// Command starting the motion software (expected to daemonize)
    #[serde(default)]
    pub cmd: String,

    /// PID file written by the motion software
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Process name used by the kill command
    #[serde(default = "default_kill_name")]
    pub kill_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// File written by the capture command
    #[serde(default = "default_capture_file")]
    pub file: PathBuf,

    /// Still capture command
    #[serde(default = "default_capture_cmd")]
    pub cmd: String,

    #[serde(default)]
    pub led: LedConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LedConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub gpio: Option<u8>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuzzerConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub gpio: Option<u8>,

    /// Length of one sequence step in seconds
    #[serde(default = "default_buzzer_duration")]
    pub duration: f64,

    #[serde(default = "default_seq_arm")]
    pub seq_arm: String,

    #[serde(default = "default_seq_disarm")]
    pub seq_disarm: String,

    #[serde(default = "default_seq_capture")]
    pub seq_capture: String,

    #[serde(default = "default_seq_motion")]
    pub seq_motion: String,

    #[serde(default = "default_seq_buzzer")]
    pub seq_buzzer: String,
}

impl BuzzerConfig {
    pub fn pulse_duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration.max(0.0))
    }
}

impl PicamConfig {
    /// Load configuration from a specific file path, with `PICAM_`
    /// environment overrides on top
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("general.startup_timeout", default_startup_timeout())?
            .set_default(
                "general.image_dir",
                default_image_dir().to_string_lossy().to_string(),
            )?
            .set_default("general.delete_images", default_delete_images())?
            .set_default("general.arm", default_arm())?
            .set_default(
                "general.log_dir",
                default_log_dir().to_string_lossy().to_string(),
            )?
            .set_default("telegram.token", "")?
            .set_default("telegram.owner_ids", Vec::<i64>::new())?
            .set_default("telegram.api_url", default_api_url())?
            .set_default("telegram.poll_timeout", default_poll_timeout())?
            .set_default("pir.enable", false)?
            .set_default("pir.capture_cmd", "")?
            .set_default("pir.creepy_mode", false)?
            .set_default("motion.enable", false)?
            .set_default("motion.cmd", "")?
            .set_default(
                "motion.pid_file",
                default_pid_file().to_string_lossy().to_string(),
            )?
            .set_default("motion.kill_name", default_kill_name())?
            .set_default(
                "capture.file",
                default_capture_file().to_string_lossy().to_string(),
            )?
            .set_default("capture.cmd", default_capture_cmd())?
            .set_default("capture.led.enable", false)?
            .set_default("buzzer.enable", false)?
            .set_default("buzzer.duration", default_buzzer_duration())?
            .set_default("buzzer.seq_arm", default_seq_arm())?
            .set_default("buzzer.seq_disarm", default_seq_disarm())?
            .set_default("buzzer.seq_capture", default_seq_capture())?
            .set_default("buzzer.seq_motion", default_seq_motion())?
            .set_default("buzzer.seq_buzzer", default_seq_buzzer())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(env)
            .build()?;

        let config: PicamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pir.enable && self.motion.enable {
            return Err(ConfigError::Message(
                "Enabling both PIR and motion based capturing is not supported".to_string(),
            ));
        }

        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "Telegram access token must not be empty".to_string(),
            ));
        }

        if self.telegram.owner_ids.is_empty() {
            return Err(ConfigError::Message(
                "At least one owner id must be configured".to_string(),
            ));
        }

        if self.pir.enable {
            if self.pir.gpio.is_none() {
                return Err(ConfigError::Message(
                    "PIR enabled but no gpio configured".to_string(),
                ));
            }
            if self.pir.capture_cmd.trim().is_empty() {
                return Err(ConfigError::Message(
                    "PIR enabled but no capture_cmd configured".to_string(),
                ));
            }
        }

        if self.motion.enable {
            if self.motion.cmd.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Motion enabled but no cmd configured".to_string(),
                ));
            }
            if self.motion.pid_file.as_os_str().is_empty() {
                return Err(ConfigError::Message(
                    "Motion enabled but no pid_file configured".to_string(),
                ));
            }
        }

        if self.capture.led.enable && self.capture.led.gpio.is_none() {
            return Err(ConfigError::Message(
                "Capture LED enabled but no gpio configured".to_string(),
            ));
        }

        if self.buzzer.enable {
            if self.buzzer.gpio.is_none() {
                return Err(ConfigError::Message(
                    "Buzzer enabled but no gpio configured".to_string(),
                ));
            }
            if self.buzzer.duration <= 0.0 {
                return Err(ConfigError::Message(
                    "Buzzer duration must be greater than 0".to_string(),
                ));
            }
            for (name, sequence) in self.buzzer.sequences() {
                if sequence.chars().any(|c| c != '0' && c != '1') {
                    warn!(
                        "Buzzer sequence {} contains characters other than 0/1: {:?}",
                        name, sequence
                    );
                }
            }
        }

        Ok(())
    }

    /// Whether any device needs the GPIO port
    pub fn needs_gpio(&self) -> bool {
        self.pir.enable || self.buzzer.enable || self.capture.led.enable
    }

    /// Copy with the access token masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.telegram.token.is_empty() {
            copy.telegram.token = "***".to_string();
        }
        copy
    }
}

impl BuzzerConfig {
    fn sequences(&self) -> [(&'static str, &str); 5] {
        [
            ("seq_arm", &self.seq_arm),
            ("seq_disarm", &self.seq_disarm),
            ("seq_capture", &self.seq_capture),
            ("seq_motion", &self.seq_motion),
            ("seq_buzzer", &self.seq_buzzer),
        ]
    }
}

impl Default for PicamConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                startup_timeout: default_startup_timeout(),
                image_dir: default_image_dir(),
                delete_images: default_delete_images(),
                arm: default_arm(),
                log_dir: default_log_dir(),
            },
            telegram: TelegramConfig {
                token: String::new(),
                owner_ids: Vec::new(),
                api_url: default_api_url(),
                poll_timeout: default_poll_timeout(),
            },
            pir: PirConfig {
                enable: false,
                gpio: None,
                capture_cmd: String::new(),
                creepy_mode: false,
            },
            motion: MotionConfig {
                enable: false,
                cmd: String::new(),
                pid_file: default_pid_file(),
                kill_name: default_kill_name(),
            },
            capture: CaptureConfig {
                file: default_capture_file(),
                cmd: default_capture_cmd(),
                led: LedConfig::default(),
            },
            buzzer: BuzzerConfig {
                enable: false,
                gpio: None,
                duration: default_buzzer_duration(),
                seq_arm: default_seq_arm(),
                seq_disarm: default_seq_disarm(),
                seq_capture: default_seq_capture(),
                seq_motion: default_seq_motion(),
                seq_buzzer: default_seq_buzzer(),
            },
        }
    }
}

/// `PICAM_TELEGRAM__TOKEN` overrides `telegram.token`. Owner ids are given
/// comma separated.
fn environment() -> Environment {
    Environment::with_prefix("PICAM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("telegram.owner_ids")
}

// Default value functions
fn default_startup_timeout() -> i64 {
    60
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("/tmp/picambot/images")
}
fn default_delete_images() -> bool {
    true
}
fn default_arm() -> bool {
    false
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout() -> u64 {
    30
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/motion.pid")
}
fn default_kill_name() -> String {
    "motion".to_string()
}

fn default_capture_file() -> PathBuf {
    PathBuf::from("/tmp/picambot/capture.jpg")
}
fn default_capture_cmd() -> String {
    "raspistill -o /tmp/picambot/capture.jpg".to_string()
}

fn default_buzzer_duration() -> f64 {
    0.2
}
fn default_seq_arm() -> String {
    "1010".to_string()
}
fn default_seq_disarm() -> String {
    "10".to_string()
}
fn default_seq_capture() -> String {
    "1".to_string()
}
fn default_seq_motion() -> String {
    "111000111".to_string()
}
fn default_seq_buzzer() -> String {
    "101".to_string()
}
