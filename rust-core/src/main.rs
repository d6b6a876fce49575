mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cli::Cli;
use sidmon::audio::{PcmSource, SampleFormat};
use sidmon::config::{Config, CONFIG_FILE};
use sidmon::monitor::SystemClock;
use sidmon::output::{LogAlerter, Termination};
use sidmon::{Monitor, MonitorSettings};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(&cli);
    let logfile = config.as_ref().ok().and_then(|c| c.logfile.clone());
    if let Err(err) = logging::init(cli.log_level(), logfile.as_deref()) {
        eprintln!("cannot open log file: {}", err);
        let _ = logging::init(cli.log_level(), None);
    }

    let termination = Termination::new();
    match config.and_then(|config| run(&cli, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            termination.terminate(&mut LogAlerter, &format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

/// Explicit --config path, else ./sidmon.toml when present, else defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(|| {
        let local = PathBuf::from(CONFIG_FILE);
        local.exists().then_some(local)
    });

    let Some(path) = path else {
        return Ok(Config::default());
    };
    Ok(Config::load(&path)?)
}

fn run(cli: &Cli, mut config: Config) -> Result<()> {
    if let Some(input) = &cli.input {
        config.input.device = input.clone();
    }
    config.validate()?;

    let settings = MonitorSettings::from_config(&config)?;
    log::info!(
        "resolution: bins={} fftwid={} df={:.6}",
        settings.bins,
        settings.frame_len(),
        settings.df()
    );
    for band in settings.bands.iter() {
        log::info!(
            "band {}: {}-{} Hz, bins {}..={}",
            band.name,
            band.start_hz,
            band.end_hz,
            band.first_bin,
            band.last_bin
        );
    }
    match &settings.spectrum_file {
        Some(path) => log::info!(
            "spectrum file [{}] every {} frames",
            path.display(),
            settings.spectrum_interval
        ),
        None => log::info!("spectrum file disabled"),
    }

    if cli.check_config {
        println!("{:<16} {:>10} {:>10} {:>6} {:>6}", "band", "start_hz", "end_hz", "first", "last");
        for band in settings.bands.iter() {
            println!(
                "{:<16} {:>10} {:>10} {:>6} {:>6}",
                band.name, band.start_hz, band.end_hz, band.first_bin, band.last_bin
            );
        }
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_for_ctrlc = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_ctrlc.store(false, Ordering::SeqCst);
    })
    .context("cannot install interrupt handler")?;

    let mut monitor = Monitor::new(settings, Box::new(SystemClock), Box::new(LogAlerter));

    #[cfg(feature = "device")]
    if cli.capture {
        return run_capture(&config, &mut monitor, &running);
    }

    let format = SampleFormat::from_bits(config.input.bits)
        .with_context(|| format!("unsupported sample width {}", config.input.bits))?;
    let mut source = PcmSource::open(
        &config.input.device,
        format,
        config.input.channels as usize,
        config.input.follow,
    )
    .with_context(|| format!("cannot open input [{}]", config.input.device.display()))?;

    log::info!("starting work");
    monitor.run(&mut source, &running, config.retry_pause())?;
    log::info!("stopped after {} frames", monitor.frames_sealed());
    Ok(())
}

#[cfg(feature = "device")]
fn run_capture(config: &Config, monitor: &mut Monitor, running: &AtomicBool) -> Result<()> {
    use sidmon::audio::{DeviceInput, RingBuffer};

    let channels = config.input.channels;
    // One second of audio between the callback and the control loop
    let capacity = config.analysis.sample_rate as usize * channels as usize;
    let (producer, mut source) = RingBuffer::new(capacity).split(channels as usize);

    let input = DeviceInput::from_default_device(producer, config.analysis.sample_rate, channels)?;
    log::info!(
        "capturing from [{}] at {} Hz, {} channels",
        input.device_info().name,
        input.device_info().sample_rate,
        input.device_info().channels
    );
    input.start()?;

    log::info!("starting work");
    monitor.run(&mut source, running, config.retry_pause())?;
    log::info!("stopped after {} frames", monitor.frames_sealed());
    Ok(())
}
