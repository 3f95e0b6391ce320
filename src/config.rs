//! Configuration for the viewer library and the `docview` binary.
//!
//! The library is configured with [`ViewerConfig`]. The binary parses a
//! [`Cli`] whose flags can all be set through environment variables with
//! the `DOCVIEW_` prefix:
//!
//! - `DOCVIEW_ROOT` - Local document root (default: current directory)
//! - `DOCVIEW_S3_BUCKET` - Read documents from this S3 bucket instead
//! - `DOCVIEW_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `DOCVIEW_S3_PREFIX` - Key prefix inside the bucket
//! - `DOCVIEW_CACHE_DIR` - Persist rendered pages under this directory
//! - `DOCVIEW_CACHE_CAPACITY_MB` - In-memory cache size (default: 256)
//! - `DOCVIEW_NO_CACHE` - Disable caching entirely
//! - `DOCVIEW_LICENSE_KEY` - License key
//! - `DOCVIEW_LICENSE_SECRET` - Secret used to verify and issue keys
//! - `DOCVIEW_HOST` / `DOCVIEW_PORT` - Server bind address (default: 0.0.0.0:3000)

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{ArtifactCache, DiskArtifactStore, MemoryArtifactStore, DEFAULT_MEMORY_CAPACITY};
use crate::render::{
    Color, RenderOptions, RenderTarget, Watermark, WatermarkPosition, DEFAULT_JPEG_QUALITY,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default in-memory cache size in megabytes.
pub const DEFAULT_CACHE_CAPACITY_MB: usize = DEFAULT_MEMORY_CAPACITY / (1024 * 1024);

/// Default validity of issued licenses.
pub const DEFAULT_LICENSE_DAYS: u64 = 365;

// =============================================================================
// Library Configuration
// =============================================================================

/// Where rendered artifacts are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process LRU bounded by total page bytes
    Memory { capacity_bytes: usize },

    /// Directory tree on local disk
    Disk { path: PathBuf },
}

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// When false nothing is cached and no cache directory is created
    pub use_cache: bool,

    pub cache: CacheBackend,

    /// Target used by `get_pages`
    pub default_target: RenderTarget,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache: CacheBackend::Memory {
                capacity_bytes: DEFAULT_MEMORY_CAPACITY,
            },
            default_target: RenderTarget::Html,
        }
    }
}

impl ViewerConfig {
    /// Configuration caching to `path` on disk.
    pub fn disk(path: impl Into<PathBuf>) -> Self {
        Self {
            cache: CacheBackend::Disk { path: path.into() },
            ..Self::default()
        }
    }

    /// Configuration with caching disabled.
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }

    pub fn with_default_target(mut self, target: RenderTarget) -> Self {
        self.default_target = target;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.use_cache {
            return Ok(());
        }
        match &self.cache {
            CacheBackend::Memory { capacity_bytes: 0 } => {
                Err("cache capacity must be greater than 0".to_string())
            }
            CacheBackend::Disk { path } if path.as_os_str().is_empty() => {
                Err("cache directory must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Build the artifact cache described by this configuration.
    pub fn build_cache(&self) -> ArtifactCache {
        if !self.use_cache {
            return ArtifactCache::disabled();
        }
        match &self.cache {
            CacheBackend::Memory { capacity_bytes } => {
                ArtifactCache::new(Arc::new(MemoryArtifactStore::with_capacity(*capacity_bytes)))
            }
            CacheBackend::Disk { path } => ArtifactCache::new(Arc::new(DiskArtifactStore::new(path))),
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// docview - renders documents into cached HTML or image pages.
#[derive(Parser, Debug, Clone)]
#[command(name = "docview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render a document and write its pages to a directory.
    Render(RenderArgs),

    /// Print document metadata (pages, attachments).
    Info(InfoArgs),

    /// Remove cached renders for one document or all documents.
    ClearCache(ClearCacheArgs),

    /// Start the HTTP server.
    Serve(ServeArgs),

    /// Issue a license key.
    License(LicenseArgs),
}

/// Flags shared by every command touching documents.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Local directory documents are resolved against.
    #[arg(long, default_value = ".", env = "DOCVIEW_ROOT")]
    pub root: PathBuf,

    /// Read documents from this S3 bucket instead of the local root.
    #[arg(long, env = "DOCVIEW_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "DOCVIEW_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Key prefix for documents inside the bucket.
    #[arg(long, env = "DOCVIEW_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Persist rendered pages under this directory instead of memory.
    #[arg(long, env = "DOCVIEW_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// In-memory cache capacity in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY_MB, env = "DOCVIEW_CACHE_CAPACITY_MB")]
    pub cache_capacity_mb: usize,

    /// Disable caching; nothing is written to disk.
    #[arg(long, default_value_t = false, env = "DOCVIEW_NO_CACHE")]
    pub no_cache: bool,

    /// License key (`licensee:expiry:signature`).
    #[arg(long, env = "DOCVIEW_LICENSE_KEY")]
    pub license_key: Option<String>,

    /// Secret the license key is verified against.
    #[arg(long, env = "DOCVIEW_LICENSE_SECRET", hide_env_values = true)]
    pub license_secret: Option<String>,
}

impl CommonArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.license_secret.as_deref().map_or(true, str::is_empty) {
            return Err(
                "No license secret configured. Set --license-secret or DOCVIEW_LICENSE_SECRET"
                    .to_string(),
            );
        }
        if matches!(&self.s3_bucket, Some(bucket) if bucket.is_empty()) {
            return Err("S3 bucket name must not be empty".to_string());
        }
        self.viewer_config().validate()
    }

    pub fn viewer_config(&self) -> ViewerConfig {
        let cache = match &self.cache_dir {
            Some(path) => CacheBackend::Disk { path: path.clone() },
            None => CacheBackend::Memory {
                capacity_bytes: self.cache_capacity_mb.saturating_mul(1024 * 1024),
            },
        };
        ViewerConfig {
            use_cache: !self.no_cache,
            cache,
            default_target: RenderTarget::Html,
        }
    }

    pub fn license_secret_or_empty(&self) -> &str {
        self.license_secret.as_deref().unwrap_or("")
    }
}

/// Output kind for the `render` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Png,
    Jpeg,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Document identifier (path relative to the root, or S3 key).
    pub document: String,

    /// Directory the pages are written to.
    #[arg(short, long, default_value = "output", env = "DOCVIEW_OUTPUT")]
    pub output: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,

    /// Render an attachment of the document instead of the document.
    #[arg(long)]
    pub attachment: Option<String>,

    /// Image width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Image height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub quality: u8,

    /// Page numbers to render (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub pages: Vec<u32>,

    /// Maximum number of pages to render.
    #[arg(long)]
    pub count: Option<u32>,

    /// First page position to render.
    #[arg(long, default_value_t = 1)]
    pub start: u32,

    /// Inline resources into the HTML.
    #[arg(long, default_value_t = false)]
    pub embed_resources: bool,

    /// Watermark text.
    #[arg(long)]
    pub watermark: Option<String>,

    /// Watermark color (`#rrggbb` or a basic color name).
    #[arg(long, default_value = "gray")]
    pub watermark_color: String,

    /// Watermark position (top-left, center, diagonal, ...).
    #[arg(long, default_value = "diagonal")]
    pub watermark_position: String,

    /// Share of the page width covered by the watermark, in percent.
    #[arg(long)]
    pub watermark_width: Option<f32>,

    /// Rotate pages before rendering, as `page:angle` (repeatable).
    #[arg(long = "rotate", value_parser = parse_pair_i32)]
    pub rotations: Vec<(u32, i32)>,

    /// Move pages before rendering, as `from:to` positions (repeatable).
    #[arg(long = "reorder", value_parser = parse_pair_u32)]
    pub reorders: Vec<(u32, u32)>,
}

fn parse_pair(s: &str) -> Result<(&str, &str), String> {
    s.split_once(':')
        .ok_or_else(|| format!("expected `a:b`, got `{}`", s))
}

fn parse_pair_i32(s: &str) -> Result<(u32, i32), String> {
    let (a, b) = parse_pair(s)?;
    Ok((
        a.trim().parse().map_err(|e| format!("{}: {}", a, e))?,
        b.trim().parse().map_err(|e| format!("{}: {}", b, e))?,
    ))
}

fn parse_pair_u32(s: &str) -> Result<(u32, u32), String> {
    let (a, b) = parse_pair(s)?;
    Ok((
        a.trim().parse().map_err(|e| format!("{}: {}", a, e))?,
        b.trim().parse().map_err(|e| format!("{}: {}", b, e))?,
    ))
}

impl RenderArgs {
    /// Render options described by the flags.
    pub fn options(&self) -> Result<RenderOptions, String> {
        let mut options = RenderOptions::new()
            .with_pages(self.pages.iter().copied())
            .starting_at(self.start)
            .embed_resources(self.embed_resources);
        if let Some(count) = self.count {
            options = options.with_count(count);
        }
        if let Some(text) = &self.watermark {
            let color = Color::parse(&self.watermark_color)
                .ok_or_else(|| format!("unknown color `{}`", self.watermark_color))?;
            let position = WatermarkPosition::parse(&self.watermark_position)
                .ok_or_else(|| format!("unknown position `{}`", self.watermark_position))?;
            let mut watermark = Watermark::new(text.clone())
                .with_color(color)
                .with_position(position);
            if let Some(width) = self.watermark_width {
                watermark = watermark.with_width(width);
            }
            options = options.with_watermark(watermark);
        }
        options.validate().map_err(|e| e.to_string())?;
        Ok(options)
    }

    /// Render target described by the flags.
    pub fn target(&self) -> Result<RenderTarget, String> {
        if self.quality == 0 || self.quality > 100 {
            return Err("quality must be between 1 and 100".to_string());
        }
        Ok(match self.format {
            OutputFormat::Html => RenderTarget::Html,
            OutputFormat::Png => RenderTarget::png().with_size(self.width, self.height),
            OutputFormat::Jpeg => RenderTarget::jpeg(self.quality).with_size(self.width, self.height),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Document identifier.
    pub document: String,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClearCacheArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Only clear this document; clears everything when omitted.
    pub document: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "DOCVIEW_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "DOCVIEW_PORT")]
    pub port: u16,

    /// Allowed CORS origins (comma-separated). Any origin when omitted.
    #[arg(long, env = "DOCVIEW_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,
}

impl ServeArgs {
    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LicenseArgs {
    /// Name of the licensee.
    pub licensee: String,

    /// Days until the license expires.
    #[arg(long, default_value_t = DEFAULT_LICENSE_DAYS)]
    pub valid_days: u64,

    /// Secret used to sign the key.
    #[arg(long, env = "DOCVIEW_LICENSE_SECRET", hide_env_values = true)]
    pub license_secret: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_viewer_config_validate() {
        assert!(ViewerConfig::default().validate().is_ok());
        assert!(ViewerConfig::disk("/tmp/cache").validate().is_ok());
        assert!(ViewerConfig::disk("").validate().is_err());

        let zero = ViewerConfig {
            cache: CacheBackend::Memory { capacity_bytes: 0 },
            ..ViewerConfig::default()
        };
        assert!(zero.validate().is_err());
        // Irrelevant when caching is off
        assert!(ViewerConfig { use_cache: false, ..zero }.validate().is_ok());
    }

    #[test]
    fn test_build_cache() {
        assert!(ViewerConfig::default().build_cache().is_enabled());
        assert!(!ViewerConfig::uncached().build_cache().is_enabled());
    }

    #[test]
    fn test_render_command() {
        let cli = parse(&[
            "docview",
            "render",
            "docs/report.txt",
            "--license-secret",
            "s",
            "--format",
            "jpeg",
            "--width",
            "300",
            "--quality",
            "70",
            "--pages",
            "1,3",
            "--rotate",
            "1:90",
            "--reorder",
            "2:1",
            "--watermark",
            "DRAFT",
            "--watermark-color",
            "#ff0000",
        ]);

        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.document, "docs/report.txt");
        assert_eq!(args.rotations, vec![(1, 90)]);
        assert_eq!(args.reorders, vec![(2, 1)]);

        let options = args.options().unwrap();
        assert_eq!(options.page_numbers_to_render.len(), 2);
        assert_eq!(options.watermark.unwrap().color, Color::RED);

        let target = args.target().unwrap();
        assert_eq!(target, RenderTarget::jpeg(70).with_size(Some(300), None));
    }

    #[test]
    fn test_render_rejects_bad_values() {
        let cli = parse(&[
            "docview",
            "render",
            "a.txt",
            "--watermark",
            "x",
            "--watermark-position",
            "sideways",
        ]);
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert!(args.options().is_err());

        assert!(Cli::try_parse_from(["docview", "render", "a.txt", "--rotate", "1"]).is_err());
    }

    #[test]
    fn test_common_config() {
        let cli = parse(&["docview", "clear-cache", "--no-cache", "--license-secret", "s"]);
        let Command::ClearCache(args) = cli.command else {
            panic!("expected clear-cache");
        };
        assert!(args.document.is_none());
        assert!(args.common.validate().is_ok());
        assert!(!args.common.viewer_config().use_cache);

        let cli = parse(&["docview", "info", "a.txt", "--cache-dir", "/var/cache/docview"]);
        let Command::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(
            args.common.viewer_config().cache,
            CacheBackend::Disk {
                path: PathBuf::from("/var/cache/docview")
            }
        );
        // No secret configured
        assert!(args.common.validate().is_err());
    }

    #[test]
    fn test_serve_bind_address() {
        let cli = parse(&["docview", "serve", "--port", "8080", "--host", "127.0.0.1"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind_address(), "127.0.0.1:8080");
    }
}
