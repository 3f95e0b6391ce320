//! docview - renders documents into cached HTML or image pages.
//!
//! This binary wires the CLI to the viewer service and the HTTP server.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docview::{
    config::{ClearCacheArgs, Cli, Command, CommonArgs, InfoArgs, LicenseArgs, RenderArgs, ServeArgs},
    create_router, create_s3_client, export_pages, issue_license, CancellationToken, DocumentSource,
    LocalDocumentSource, RouterConfig, S3DocumentSource, SignedLicense, ViewerService,
};

type DynSource = Arc<dyn DocumentSource>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render(args) => run_render(args).await,
        Command::Info(args) => run_info(args).await,
        Command::ClearCache(args) => run_clear_cache(args).await,
        Command::Serve(args) => run_serve(args).await,
        Command::License(args) => run_license(args),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "docview=debug,tower_http=debug"
    } else {
        "docview=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validate the shared flags and build the viewer they describe.
async fn build_viewer(common: &CommonArgs) -> Result<ViewerService<DynSource>, String> {
    common.validate()?;

    let source: DynSource = match &common.s3_bucket {
        Some(bucket) => {
            let client = create_s3_client(common.s3_endpoint.as_deref()).await;
            let mut source = S3DocumentSource::new(client, bucket.clone());
            if let Some(prefix) = &common.s3_prefix {
                source = source.with_prefix(prefix.clone());
            }
            Arc::new(source)
        }
        None => Arc::new(LocalDocumentSource::new(common.root.clone())),
    };

    let license = SignedLicense::new(
        common.license_secret_or_empty(),
        common.license_key.clone(),
    );
    match license.check_at(now_secs()) {
        Ok(key) => info!(licensee = %key.licensee, expiry = key.expiry, "License accepted"),
        Err(e) => warn!("License check failed: {}", e),
    }

    Ok(ViewerService::with_config(
        source,
        Arc::new(license),
        &common.viewer_config(),
    ))
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(args: RenderArgs) -> ExitCode {
    let viewer = match build_viewer(&args.common).await {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let (options, target) = match args.options().and_then(|o| Ok((o, args.target()?))) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for &(page, angle) in &args.rotations {
        if let Err(e) = viewer.rotate_page(&args.document, page, angle).await {
            error!("Cannot rotate page {}: {}", page, e);
            return ExitCode::FAILURE;
        }
    }
    for &(current, new) in &args.reorders {
        if let Err(e) = viewer.reorder_page(&args.document, current, new).await {
            error!("Cannot move page {} to {}: {}", current, new, e);
            return ExitCode::FAILURE;
        }
    }

    let result = match &args.attachment {
        Some(attachment) => {
            viewer
                .get_attachment_pages(&args.document, attachment, &options, &target)
                .await
        }
        None => {
            viewer
                .render_pages(&args.document, &options, &target, &CancellationToken::new())
                .await
        }
    };
    let set = match result {
        Ok(set) => set,
        Err(e) => {
            error!("Render failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match export_pages(&args.output, &set.pages).await {
        Ok(files) => {
            info!(
                pages = set.pages.len(),
                files = files.len(),
                cache_hit = set.cache_hit,
                "Wrote {}",
                args.output.display()
            );
            for file in files {
                println!("{}", file.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(args: InfoArgs) -> ExitCode {
    let viewer = match build_viewer(&args.common).await {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let info = match viewer.get_document_info(&args.document).await {
        Ok(info) => info,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Cannot serialize document info: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Document: {}", info.id);
    println!("Format:   {}", info.format.name());
    println!("Pages:    {}", info.page_count);
    for page in &info.pages {
        println!(
            "  #{:<4} page {:<4} {}x{}  rotation {}",
            page.position, page.number, page.width, page.height, page.rotation
        );
    }
    if !info.attachments.is_empty() {
        println!("Attachments:");
        for attachment in &info.attachments {
            println!(
                "  {} ({} bytes)",
                attachment.name, attachment.size
            );
        }
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Clear Cache Command
// =============================================================================

async fn run_clear_cache(args: ClearCacheArgs) -> ExitCode {
    let viewer = match build_viewer(&args.common).await {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match viewer.clear_cache(args.document.as_deref()).await {
        Ok(removed) => {
            println!("Removed {} cached render(s)", removed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(args: ServeArgs) -> ExitCode {
    let viewer = match build_viewer(&args.common).await {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("docview v{}", env!("CARGO_PKG_VERSION"));
    match &args.common.s3_bucket {
        Some(bucket) => info!("  Documents: s3://{}", bucket),
        None => info!("  Documents: {}", args.common.root.display()),
    }
    if args.common.no_cache {
        warn!("  Cache: DISABLED - every request renders");
    } else if let Some(dir) = &args.common.cache_dir {
        info!("  Cache: {}", dir.display());
    } else {
        info!("  Cache: {}MB in memory", args.common.cache_capacity_mb);
    }

    let mut router_config = RouterConfig::new();
    if let Some(origins) = &args.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }
    let router = create_router(viewer, router_config);

    let addr = args.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/documents/<id>/pages", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// =============================================================================
// License Command
// =============================================================================

fn run_license(args: LicenseArgs) -> ExitCode {
    if args.license_secret.is_empty() {
        eprintln!("Error: license secret must not be empty");
        return ExitCode::FAILURE;
    }
    let expiry = now_secs().saturating_add(args.valid_days.saturating_mul(86_400));

    match issue_license(&args.license_secret, &args.licensee, expiry) {
        Ok(key) => {
            println!("{}", key);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
