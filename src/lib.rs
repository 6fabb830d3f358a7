pub mod audio;
pub mod cli;
pub mod detection;
pub mod hooks;
pub mod monitor;
pub mod process;
pub mod session;
pub mod settings;
pub mod target;
pub mod utils;
pub mod window;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use audio::library::AudioLibrary;
use audio::sequencer::SubstituteSequencer;
use audio::AudioEngineHandle;
use cli::{Args, Command};
use detection::{runtime_language, Classifier, PatternCatalog};
use hooks::{EveryNthAd, LogReporter, PackageVersion, VersionSource};
use monitor::{loop_worker::monitor_loop, Monitor};
use process::{ProcessLocator, SysinfoProcesses};
use session::AudioSessionController;
use settings::Settings;
use window::WindowResolver;

/// Entry point for the `adhush` binary.
pub fn run() -> Result<()> {
    let args = Args::parse();
    utils::logging::init(args.verbose);

    let settings = args.effective_settings()?;
    let catalog = PatternCatalog::new()?;
    let classifier = Classifier::new(
        catalog,
        settings.target.clone(),
        settings.confidence_threshold,
    );

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Classify { titles } => {
            for title in titles {
                println!("{}", cli::classification_report(&classifier, &title));
            }
            Ok(())
        }
        Command::Run => run_monitor(settings, classifier),
    }
}

fn build_monitor(settings: &Settings, classifier: Classifier) -> Monitor {
    let profile = settings.target.clone();

    let library = if settings.substitute_audio.enabled {
        AudioLibrary::locate(settings.audio_dir.as_deref())
    } else {
        info!("Substitute audio disabled");
        AudioLibrary::empty()
    };

    Monitor::new(
        ProcessLocator::new(
            Box::new(SysinfoProcesses::new()),
            profile.clone(),
            settings.process_cache(),
        ),
        WindowResolver::new(
            window::platform_backend(),
            profile.clone(),
            settings.window_cache(),
        ),
        classifier,
        AudioSessionController::new(session::platform_backend(), profile),
        SubstituteSequencer::new(
            Box::new(AudioEngineHandle::new(settings.substitute_audio.volume)),
            library,
        ),
        Box::new(LogReporter::new(Box::new(EveryNthAd::default()))),
    )
}

fn run_monitor(settings: Settings, classifier: Classifier) -> Result<()> {
    info!(
        "adhush {} watching {} (threshold {:.2})",
        PackageVersion.current_app_version(),
        settings.target.display_name,
        classifier.threshold()
    );
    let language = runtime_language();
    debug!(
        "system language {language}: {} local pattern(s), matching against all {}",
        classifier.catalog().for_language(&language).count(),
        classifier.catalog().patterns().len()
    );

    let monitor = build_monitor(&settings, classifier);

    // One logical thread of control: the monitor never leaves this thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let cancel_token = CancellationToken::new();
        let signal_token = cancel_token.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            signal_token.cancel();
        });

        monitor_loop(monitor, cancel_token).await;
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, restoring audio");
        },
        _ = terminate => {
            info!("Received terminate signal, restoring audio");
        },
    }
}
