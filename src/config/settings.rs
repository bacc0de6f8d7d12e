use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub access_key: String,
    pub secret_key: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub bucket_in: String,
    pub bucket_out: String,
    pub object_name: String,
    pub output_format: String,
    pub output_ext: Option<String>,
    pub video_codec: String,
    pub audio_codec: String,
    pub database_url: String,
    pub job_table: String,
    pub status_host: IpAddr,
    pub status_port: u16,
    pub work_dir: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get_opt(key).ok_or(ConfigError::Missing(name))
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let job_table = env::get_or(EnvKey::JobTable, "files");
        validate_identifier(&job_table).map_err(|reason| ConfigError::Invalid {
            key: EnvKey::JobTable.as_str(),
            reason,
        })?;

        let status_host = parse_or(
            EnvKey::StatusHost,
            env::get_opt(EnvKey::StatusHost),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        )?;
        let status_port = parse_or(EnvKey::StatusPort, env::get_opt(EnvKey::StatusPort), 5000u16)?;

        let object_name = required(EnvKey::ObjectName)?;
        if artifact_file_name(&object_name).is_none() {
            return Err(ConfigError::Invalid {
                key: EnvKey::ObjectName.as_str(),
                reason: format!("'{}' has no usable file name", object_name),
            });
        }

        Ok(Self {
            access_key: required(EnvKey::AccessKey)?,
            secret_key: required(EnvKey::SecretKey)?,
            s3_endpoint: env::get_opt(EnvKey::S3Endpoint),
            s3_region: env::get_or(EnvKey::S3Region, "us-east-1"),
            bucket_in: required(EnvKey::BucketIn)?,
            bucket_out: required(EnvKey::BucketOut)?,
            object_name,
            output_format: required(EnvKey::OutputFormat)?,
            output_ext: env::get_opt(EnvKey::OutputExt)
                .map(|ext| ext.trim_start_matches('.').to_string()),
            video_codec: required(EnvKey::VideoCodec)?,
            audio_codec: required(EnvKey::AudioCodec)?,
            database_url: required(EnvKey::DatabaseUrl)?,
            job_table,
            status_host,
            status_port,
            work_dir: PathBuf::from(env::get_or(EnvKey::WorkDir, ".")),
            ffmpeg_path: env::get_opt(EnvKey::FfmpegPath).map(PathBuf::from),
            ffprobe_path: env::get_opt(EnvKey::FfprobePath).map(PathBuf::from),
        })
    }

    pub fn status_addr(&self) -> SocketAddr {
        SocketAddr::new(self.status_host, self.status_port)
    }

    pub fn output_key(&self) -> String {
        output_key_for(&self.object_name, self.output_ext.as_deref())
    }

    pub fn local_artifact_path(&self) -> PathBuf {
        let name = artifact_file_name(&self.object_name).unwrap_or_else(|| "input".to_string());
        self.work_dir.join(name)
    }
}

/// Output objects keep the input key, with the extension swapped when one is configured.
pub fn output_key_for(input_key: &str, ext: Option<&str>) -> String {
    let Some(ext) = ext.filter(|e| !e.is_empty()) else {
        return input_key.to_string();
    };

    let (dir, file) = match input_key.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, input_key),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };

    match dir {
        Some(dir) => format!("{}/{}.{}", dir, stem, ext),
        None => format!("{}.{}", stem, ext),
    }
}

/// Final path segment of an object key, safe to use inside the work dir.
pub fn artifact_file_name(key: &str) -> Option<String> {
    Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
}

/// Parses an optional setting, falling back to `default` only when it is unset.
fn parse_or<T>(key: EnvKey, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.as_str(),
        reason: format!("'{}': {}", raw, e),
    })
}

fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return Err(format!("'{}' must start with a letter or underscore", name)),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(format!("'{}' may only contain letters, digits and underscores", name))
    }
}
