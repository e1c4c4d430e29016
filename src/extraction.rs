/*!
 * Text subtitle extraction from video containers.
 *
 * The `SubtitleExtractor` trait hides the external tools so the rest of the
 * crate (and its tests) never needs ffmpeg. `FfmpegExtractor` is the real
 * implementation, driving `ffprobe` for stream listing and `ffmpeg` for a
 * stream copy into a temporary file.
 */

use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::ExtractionConfig;
use crate::document::Dialect;
use crate::errors::ExtractionError;
use crate::language_utils;

/// Codec of a subtitle stream as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleCodec {
    Ass,
    Ssa,
    SubRip,
    /// Bitmap or otherwise unsupported codec, with its ffprobe name
    Other(String),
}

impl SubtitleCodec {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "ass" => Self::Ass,
            "ssa" => Self::Ssa,
            "subrip" | "srt" => Self::SubRip,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::SubRip => "subrip",
            Self::Other(name) => name,
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Dialect of the extracted text
    pub fn dialect(&self) -> Option<Dialect> {
        match self {
            Self::Ass | Self::Ssa => Some(Dialect::Ass),
            Self::SubRip => Some(Dialect::Srt),
            Self::Other(_) => None,
        }
    }

    /// File suffix for the extracted stream, without the dot
    pub fn extension(&self) -> Option<&'static str> {
        self.dialect().map(|dialect| dialect.extension())
    }

    /// ffmpeg muxer name for a stream copy
    fn muxer(&self) -> Option<&'static str> {
        match self {
            Self::Ass | Self::Ssa => Some("ass"),
            Self::SubRip => Some("srt"),
            Self::Other(_) => None,
        }
    }
}

/// One subtitle stream of a video container
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStream {
    /// Absolute stream index in the container
    pub index: usize,
    pub codec: SubtitleCodec,
    pub language: Option<String>,
    pub title: Option<String>,
}

impl fmt::Display for SubtitleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {}",
            self.index,
            self.codec.name(),
            self.language.as_deref().unwrap_or("und")
        )?;
        if let Some(title) = &self.title {
            write!(f, " \"{}\"", title)?;
        }
        Ok(())
    }
}

/// Which stream to extract
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StreamSelector {
    /// First text stream in container order
    #[default]
    First,
    /// Absolute stream index
    Index(usize),
    /// First text stream tagged with (or titled after) this language
    Language(String),
}

impl StreamSelector {
    /// Pick a stream from a container listing
    pub fn select<'a>(&self, streams: &'a [SubtitleStream], video: &str) -> Result<&'a SubtitleStream, ExtractionError> {
        let mut text_streams = streams.iter().filter(|s| s.codec.is_text()).peekable();
        if text_streams.peek().is_none() {
            return Err(ExtractionError::NoTextStreams(video.to_string()));
        }

        match self {
            Self::First => text_streams
                .next()
                .ok_or_else(|| ExtractionError::NoTextStreams(video.to_string())),
            Self::Index(index) => {
                let stream = streams
                    .iter()
                    .find(|s| s.index == *index)
                    .ok_or_else(|| ExtractionError::StreamNotFound(format!("index {} in {}", index, video)))?;
                if stream.codec.is_text() {
                    Ok(stream)
                } else {
                    Err(ExtractionError::UnsupportedCodec(stream.codec.name().to_string()))
                }
            }
            Self::Language(language) => text_streams
                .find(|s| stream_matches_language(s, language))
                .ok_or_else(|| ExtractionError::StreamNotFound(format!("language '{}' in {}", language, video))),
        }
    }
}

fn stream_matches_language(stream: &SubtitleStream, language: &str) -> bool {
    if let Some(tag) = &stream.language {
        if language_utils::language_codes_match(tag, language) {
            return true;
        }
    }
    // Untagged streams often carry the language in the title
    match (&stream.title, language_utils::get_language_name(language)) {
        (Some(title), Ok(name)) => title.to_lowercase().contains(&name.to_lowercase()),
        _ => false,
    }
}

/// Access to the subtitle streams of video files
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    /// List the subtitle streams of a video, text or not
    async fn list_subtitle_streams(&self, video: &Path) -> Result<Vec<SubtitleStream>, ExtractionError>;

    /// Write one text stream to `output` in its native dialect
    async fn extract_stream(&self, video: &Path, stream: &SubtitleStream, output: &Path) -> Result<(), ExtractionError>;
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: usize,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Deserialize, Default)]
struct ProbeTags {
    language: Option<String>,
    title: Option<String>,
}

/// Parse the JSON printed by `ffprobe -print_format json -show_streams`
pub fn parse_ffprobe_streams(json: &str) -> Result<Vec<SubtitleStream>, ExtractionError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| ExtractionError::InvalidProbeOutput(e.to_string()))?;

    Ok(probe
        .streams
        .into_iter()
        .map(|stream| SubtitleStream {
            index: stream.index,
            codec: SubtitleCodec::from_name(stream.codec_name.as_deref().unwrap_or("unknown")),
            language: stream.tags.language,
            title: stream.tags.title,
        })
        .collect())
}

/// Keep only the meaningful lines of ffmpeg's stderr, dropping the version
/// banner and stream metadata dump.
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    const NOISE_PREFIXES: &[&str] = &[
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "BPS",
        "DURATION",
        "NUMBER_OF",
        "_STATISTICS",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "no error output".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// ffprobe/ffmpeg backed extractor
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl FfmpegExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Run a tool to completion, bounded by the configured timeout
    async fn run_tool(&self, tool: &str, args: &[&str]) -> Result<Output, ExtractionError> {
        debug!("Running {} {}", tool, args.join(" "));

        let future = Command::new(tool).args(args).kill_on_drop(true).output();

        let output = tokio::select! {
            result = future => result.map_err(|e| ExtractionError::Spawn {
                tool: tool.to_string(),
                message: e.to_string(),
            })?,
            _ = tokio::time::sleep(self.timeout) => {
                return Err(ExtractionError::Timeout {
                    tool: tool.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = filter_ffmpeg_stderr(&String::from_utf8_lossy(&output.stderr));
            error!("{} failed: {}", tool, stderr);
            return Err(ExtractionError::ToolFailed {
                tool: tool.to_string(),
                status: output.status.code(),
                stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl SubtitleExtractor for FfmpegExtractor {
    async fn list_subtitle_streams(&self, video: &Path) -> Result<Vec<SubtitleStream>, ExtractionError> {
        let video_arg = video.to_string_lossy();
        let output = self
            .run_tool(
                &self.ffprobe_path,
                &[
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_streams",
                    "-select_streams",
                    "s",
                    &video_arg,
                ],
            )
            .await?;

        parse_ffprobe_streams(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_stream(&self, video: &Path, stream: &SubtitleStream, output: &Path) -> Result<(), ExtractionError> {
        let muxer = stream
            .codec
            .muxer()
            .ok_or_else(|| ExtractionError::UnsupportedCodec(stream.codec.name().to_string()))?;

        let video_arg = video.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let map_arg = format!("0:{}", stream.index);
        self.run_tool(
            &self.ffmpeg_path,
            &["-y", "-i", &video_arg, "-map", &map_arg, "-c:s", "copy", "-f", muxer, &output_arg],
        )
        .await?;

        Ok(())
    }
}

/// Subtitle text pulled out of a video
#[derive(Debug, Clone)]
pub struct ExtractedSubtitle {
    pub text: String,
    pub dialect: Dialect,
    pub stream: SubtitleStream,
}

/// Select a text stream and read it into memory
///
/// The stream is written to a temporary file with the dialect's suffix,
/// which is removed once read.
pub async fn extract_subtitle_text(
    extractor: &dyn SubtitleExtractor,
    video: &Path,
    selector: &StreamSelector,
) -> Result<ExtractedSubtitle, ExtractionError> {
    let video_name = video.display().to_string();
    let streams = extractor.list_subtitle_streams(video).await?;
    let stream = selector.select(&streams, &video_name)?.clone();

    let (dialect, extension) = match (stream.codec.dialect(), stream.codec.extension()) {
        (Some(dialect), Some(extension)) => (dialect, extension),
        _ => return Err(ExtractionError::UnsupportedCodec(stream.codec.name().to_string())),
    };

    info!("Extracting subtitle stream {} from {}", stream, video_name);

    let temp_file = tempfile::Builder::new()
        .prefix("dualsub-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;

    extractor.extract_stream(video, &stream, temp_file.path()).await?;

    let bytes = tokio::fs::read(temp_file.path()).await?;
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ExtractionError::EmptyOutput(stream.index));
    }

    Ok(ExtractedSubtitle {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        dialect,
        stream,
    })
}
