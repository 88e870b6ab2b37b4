use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ZoneBand;

const DEFAULT_DB_PATH: &str = "lanewatch.db";
const DEFAULT_STREAM_URL: &str = "stub://traffic_cam";
const DEFAULT_STREAM_WIDTH: u32 = 1920;
const DEFAULT_STREAM_HEIGHT: u32 = 1080;
const DEFAULT_ZONE_TOP: u32 = 250;
const DEFAULT_ZONE_BOTTOM: u32 = 800;
const DEFAULT_CROSSING_LINE: i32 = 540;
const DEFAULT_TOLERANCE: i32 = 7;
const DEFAULT_BUCKET_MINUTES: u32 = 15;
const DEFAULT_TIMEZONE: &str = "Europe/Brussels";
const DEFAULT_EVICTION_SECS: u64 = 30 * 60;

#[derive(Debug, Deserialize, Default)]
struct LanewatchConfigFile {
    db_path: Option<String>,
    stream: Option<StreamConfigFile>,
    zone: Option<ZoneConfigFile>,
    interval: Option<IntervalConfigFile>,
    eviction: Option<EvictionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ZoneConfigFile {
    top: Option<u32>,
    bottom: Option<u32>,
    crossing_line: Option<i32>,
    tolerance: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
struct IntervalConfigFile {
    minutes: Option<u32>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EvictionConfigFile {
    seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LanewatchConfig {
    pub db_path: String,
    pub stream: StreamSettings,
    pub zone: ZoneSettings,
    pub interval: IntervalSettings,
    /// Counted-id eviction horizon.
    pub eviction: Duration,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ZoneSettings {
    pub band: ZoneBand,
    pub crossing_line: i32,
    pub tolerance: i32,
}

#[derive(Debug, Clone)]
pub struct IntervalSettings {
    pub minutes: u32,
    pub timezone: Tz,
}

impl LanewatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LANEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LanewatchConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let stream = StreamSettings {
            url: file
                .stream
                .as_ref()
                .and_then(|stream| stream.url.clone())
                .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string()),
            width: file
                .stream
                .as_ref()
                .and_then(|stream| stream.width)
                .unwrap_or(DEFAULT_STREAM_WIDTH),
            height: file
                .stream
                .as_ref()
                .and_then(|stream| stream.height)
                .unwrap_or(DEFAULT_STREAM_HEIGHT),
        };
        let zone = ZoneSettings {
            band: ZoneBand::new(
                file.zone
                    .as_ref()
                    .and_then(|zone| zone.top)
                    .unwrap_or(DEFAULT_ZONE_TOP),
                file.zone
                    .as_ref()
                    .and_then(|zone| zone.bottom)
                    .unwrap_or(DEFAULT_ZONE_BOTTOM),
            ),
            crossing_line: file
                .zone
                .as_ref()
                .and_then(|zone| zone.crossing_line)
                .unwrap_or(DEFAULT_CROSSING_LINE),
            tolerance: file
                .zone
                .as_ref()
                .and_then(|zone| zone.tolerance)
                .unwrap_or(DEFAULT_TOLERANCE),
        };
        let timezone_name = file
            .interval
            .as_ref()
            .and_then(|interval| interval.timezone.clone())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let interval = IntervalSettings {
            minutes: file
                .interval
                .as_ref()
                .and_then(|interval| interval.minutes)
                .unwrap_or(DEFAULT_BUCKET_MINUTES),
            timezone: parse_timezone(&timezone_name)?,
        };
        let eviction = Duration::from_secs(
            file.eviction
                .and_then(|eviction| eviction.seconds)
                .unwrap_or(DEFAULT_EVICTION_SECS),
        );
        Ok(Self {
            db_path,
            stream,
            zone,
            interval,
            eviction,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("LANEWATCH_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(url) = std::env::var("LANEWATCH_STREAM_URL") {
            if !url.trim().is_empty() {
                self.stream.url = url;
            }
        }
        if let Ok(tz) = std::env::var("LANEWATCH_TIMEZONE") {
            if !tz.trim().is_empty() {
                self.interval.timezone = parse_timezone(&tz)?;
            }
        }
        if let Ok(seconds) = std::env::var("LANEWATCH_EVICTION_SECS") {
            let seconds: u64 = seconds.parse().map_err(|_| {
                anyhow!("LANEWATCH_EVICTION_SECS must be an integer number of seconds")
            })?;
            self.eviction = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(anyhow!("stream dimensions must be non-zero"));
        }
        if self.zone.band.top >= self.zone.band.bottom {
            return Err(anyhow!(
                "zone top ({}) must be above zone bottom ({})",
                self.zone.band.top,
                self.zone.band.bottom
            ));
        }
        if self.zone.band.bottom > self.stream.height {
            return Err(anyhow!(
                "zone bottom ({}) exceeds frame height ({})",
                self.zone.band.bottom,
                self.stream.height
            ));
        }
        if self.zone.crossing_line < 0 || self.zone.crossing_line as u32 > self.stream.height {
            return Err(anyhow!(
                "crossing line ({}) is outside the frame",
                self.zone.crossing_line
            ));
        }
        if self.zone.tolerance < 0 {
            return Err(anyhow!("crossing tolerance must be non-negative"));
        }
        // Buckets must tile the hour so boundaries land on fixed wall-clock
        // marks regardless of process start time.
        if self.interval.minutes == 0
            || self.interval.minutes > 60
            || 60 % self.interval.minutes != 0
        {
            return Err(anyhow!(
                "interval minutes ({}) must evenly divide 60",
                self.interval.minutes
            ));
        }
        if self.eviction.as_secs() == 0 {
            return Err(anyhow!("eviction horizon must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow!("unknown timezone '{}'", name))
}

fn read_config_file(path: &Path) -> Result<LanewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
