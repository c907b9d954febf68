use clap::Parser;
use color_eyre::Result;
use log::{info, LevelFilter};
use pegasus::{
    ActiveView, App, AppConfig, AppEvent, ConfigManager, Dataset, PegasusClient, Theme, APP_NAME,
};
use pegasus_cli::{Args, StartView};
use ratatui::DefaultTerminal;
use simplelog::WriteLogger;
use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

fn start_view(args: &Args) -> ActiveView {
    match args.view {
        Some(StartView::Trb) => ActiveView::Table(Dataset::Trb),
        Some(StartView::Pmwo) => ActiveView::Table(Dataset::Pmwo),
        Some(StartView::Swo) => ActiveView::Table(Dataset::Swo),
        Some(StartView::Dashboard) => ActiveView::Dashboard,
        Some(StartView::Sites) | None => ActiveView::Table(Dataset::Sites),
    }
}

/// Apply CLI overrides on top of the loaded config (CLI wins).
fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.api.timeout_secs = timeout;
    }
    if let Some(page_size) = args.page_size {
        config.display.page_size = page_size;
    }
    if args.debug || args.log_file.is_some() {
        config.debug.enabled = true;
    }
    if args.log_file.is_some() {
        config.debug.log_file = args.log_file.clone();
    }
}

/// File logging: a TUI owns the terminal, so logs can only go to a file.
fn init_logging(config: &AppConfig) -> Result<()> {
    if !config.debug.enabled {
        return Ok(());
    }
    let path = config
        .debug
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("pegasus.log"));
    let log_file = File::create(&path)?;
    WriteLogger::init(LevelFilter::Debug, simplelog::Config::default(), log_file)?;
    info!("logging to {}", path.display());
    Ok(())
}

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(
    mut terminal: DefaultTerminal,
    args: &Args,
    config: AppConfig,
    theme: Theme,
    client: PegasusClient,
) -> Result<()> {
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);
    let debug_enabled = config.debug.enabled;
    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::new_with_config(tx.clone(), client, theme, config);
    if debug_enabled {
        app.enable_debug();
    }

    render(&mut terminal, &mut app)?;
    match start_view(args) {
        ActiveView::Table(dataset) => {
            app.active = ActiveView::Table(dataset);
            tx.send(AppEvent::Load(dataset))?;
        }
        ActiveView::Dashboard => {
            app.active = ActiveView::Dashboard;
            tx.send(AppEvent::LoadDashboard)?;
        }
    }

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args, config: &AppConfig) -> Result<Option<()>> {
    if args.write_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Config written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {e}");
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {e}");
                std::process::exit(1);
            }
        }
    }

    if args.check {
        let client = PegasusClient::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
        )?;
        match client.health() {
            Ok(()) => {
                println!("Backend OK: {}", client.base_url());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Backend unreachable: {e}");
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(APP_NAME)?;
    apply_args(&mut config, &args);

    if let Some(()) = handle_early_exit_flags(&args, &config)? {
        return Ok(());
    }

    color_eyre::install()?;
    init_logging(&config)?;

    let theme = Theme::from_config(&config.theme)?;
    let client = PegasusClient::new(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
    )?;

    let terminal = ratatui::init();
    let result = run(terminal, &args, config, theme, client);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_config() {
        let args = Args {
            base_url: Some("http://noc.example:9000".to_string()),
            view: Some(StartView::Dashboard),
            page_size: Some(25),
            timeout: Some(5),
            check: false,
            debug: true,
            log_file: None,
            write_config: false,
            force: false,
        };
        let mut config = AppConfig::default();
        apply_args(&mut config, &args);
        assert_eq!(config.api.base_url, "http://noc.example:9000");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.display.page_size, 25);
        assert!(config.debug.enabled);
        assert_eq!(start_view(&args), ActiveView::Dashboard);
    }
}
