use std::env;

pub enum EnvKey {
    AccessKey,
    SecretKey,
    S3Endpoint,
    S3Region,
    BucketIn,
    BucketOut,
    ObjectName,
    OutputFormat,
    OutputExt,
    VideoCodec,
    AudioCodec,
    DatabaseUrl,
    JobTable,
    StatusHost,
    StatusPort,
    WorkDir,
    FfmpegPath,
    FfprobePath,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::AccessKey => "AWS_SDK_ACCESS_KEY",
            EnvKey::SecretKey => "AWS_SDK_SECRET_KEY",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::BucketIn => "S3_BUCKET_IN",
            EnvKey::BucketOut => "S3_BUCKET_OUT",
            EnvKey::ObjectName => "OBJECT_NAME",
            EnvKey::OutputFormat => "OUTPUT_FORMAT",
            EnvKey::OutputExt => "OUTPUT_EXT",
            EnvKey::VideoCodec => "VIDEO_CODEC",
            EnvKey::AudioCodec => "AUDIO_CODEC",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::JobTable => "DB_TABLE_FILES",
            EnvKey::StatusHost => "STATUS_HOST",
            EnvKey::StatusPort => "STATUS_PORT",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::LogFormat => "LOG_FORMAT",
        }
    }
}

/// Reads a variable, treating an empty value as unset.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    get_opt(key).unwrap_or_else(|| default.to_string())
}
