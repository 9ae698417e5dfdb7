mod config;
mod control;
mod download;
mod events;
mod learn;
mod logging;
mod prefs;

use color_eyre::eyre::{WrapErr, eyre};
use std::path::Path;
use tokio::sync::mpsc;

use config::{Command, Config, DownloadConfig};
use control::{Controller, Reply};
use download::{DispatchBridge, DownloadService, Downloader};
use events::{Event, EventSink};
use learn::{FileDescriptor, LearnClient, Scanner, course_id_from_page};
use logging::LogBuffer;
use prefs::Preferences;

const EVENT_BUFFER: usize = 64;

type CourseController = Controller<LearnClient, DispatchBridge>;

/// Pick the top level download folder: the explicit title, the course name
/// from Learn, or the course id when the lookup fails.
async fn resolve_root_label(
    client: &LearnClient,
    course: &str,
    download: &DownloadConfig,
) -> Option<String> {
    if let Some(title) = download.course_title.as_ref() {
        return Some(title.clone());
    }

    let course_id = course_id_from_page(course).ok()?;
    match client.course_name(&course_id).await {
        Ok(Some(name)) => Some(name),
        Ok(None) => Some(course_id),
        Err(e) => {
            tracing::warn!(course_id = %course_id, error = %e, "Course title lookup failed, using the course id");
            Some(course_id)
        }
    }
}

/// Print progress and notifications as they arrive
async fn render_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::DownloadProgress {
                current,
                total,
                file_name,
            } => eprintln!("[{current}/{total}] {file_name}"),
            Event::ShowNotification { title, message } => eprintln!("{title}: {message}"),
        }
    }
}

async fn scan(controller: &mut CourseController) -> color_eyre::Result<Vec<FileDescriptor>> {
    match controller.handle(control::Command::ScanCourse).await {
        Reply::Scanned { files, .. } => Ok(files),
        Reply::Failed { error, .. } => Err(eyre!(error)),
        other => Err(eyre!("Unexpected reply to scan: {other:?}")),
    }
}

async fn download(
    controller: &mut CourseController,
    files: Vec<FileDescriptor>,
) -> color_eyre::Result<()> {
    let total = files.len();
    match controller
        .handle(control::Command::DownloadFiles {
            files,
            organize_by_folder: None,
        })
        .await
    {
        Reply::Downloaded { count, .. } => {
            println!("Started {count} of {total} downloads");
            Ok(())
        }
        Reply::Failed { error, .. } => Err(eyre!(error)),
        other => Err(eyre!("Unexpected reply to download: {other:?}")),
    }
}

fn load_file_list(path: &Path) -> color_eyre::Result<Vec<FileDescriptor>> {
    let raw = std::fs::read(path).wrap_err_with(|| format!("Reading {}", path.display()))?;
    serde_json::from_slice(&raw).wrap_err_with(|| format!("Parsing {}", path.display()))
}

async fn run_actions(
    config: &Config,
    controller: &mut CourseController,
    events: &EventSink,
) -> color_eyre::Result<()> {
    match &config.command {
        Command::Scan {
            output,
            auto_download,
            ..
        } => {
            let files = scan(controller).await?;
            print!("{}", learn::tree::render(&files));
            println!("{} files found", files.len());

            if let Some(output) = output {
                std::fs::write(output, serde_json::to_vec_pretty(&files)?)
                    .wrap_err_with(|| format!("Writing {}", output.display()))?;
                tracing::info!(path = ?output, "Scan result saved");
            }

            let auto = match auto_download {
                Some(forced) => *forced,
                None => Preferences::load(&config.prefs_path())?.auto_download,
            };
            if auto && !files.is_empty() {
                events.notify(
                    "coursedl",
                    format!("Auto-downloading {} files from course", files.len()),
                );
                download(controller, files).await
            } else {
                Ok(())
            }
        }
        Command::Download { files, .. } => {
            let files = match files {
                Some(path) => load_file_list(path)?,
                None => scan(controller).await?,
            };
            download(controller, files).await
        }
        Command::Prefs { .. } => Err(eyre!("prefs does not take a course")),
    }
}

async fn run_course_command(
    config: &Config,
    logs: &LogBuffer,
    course: &str,
    download_config: &DownloadConfig,
) -> color_eyre::Result<()> {
    let client = LearnClient::new(&config.learn.origin, config.learn.session_cookie.as_deref())?
        .with_page_limit(config.learn.page_limit)
        .with_expand(config.learn.expand);

    let root_label = resolve_root_label(&client, course, download_config).await;
    tracing::debug!(root_label = ?root_label, "Download folder label");

    let downloader = Downloader::new(client.cookie_jar())?;
    let (bridge, service) =
        DownloadService::new(downloader, &download_config.output_dir).spawn();

    let (events, rx) = EventSink::channel(EVENT_BUFFER);
    let renderer = tokio::spawn(render_events(rx));

    let mut controller = Controller::new(
        course,
        Scanner::new(client),
        bridge,
        events.clone(),
        logs.clone(),
        download_config.options(root_label),
    );

    let outcome = run_actions(config, &mut controller, &events).await;

    let page = controller.page().to_string();

    // Dropping the controller drops the last bridge, letting the service drain
    drop(controller);
    drop(events);
    let report = service.await?;
    renderer.await?;

    if report.accepted > 0 {
        println!(
            "{} downloads completed, {} failed",
            report.completed(),
            report.failed()
        );
        for failed in report
            .outcomes
            .iter()
            .filter(|o| !matches!(o.status, download::DownloadStatus::Completed))
        {
            println!("  {}: {}", failed.path.display(), failed.status);
        }
    }

    export_logs(config, logs, &page)?;
    outcome
}

fn export_logs(config: &Config, logs: &LogBuffer, page: &str) -> color_eyre::Result<()> {
    if let Some(path) = &config.log.export_logs {
        std::fs::write(path, logs.report(page))
            .wrap_err_with(|| format!("Writing logs to {}", path.display()))?;
        println!("Logs written to {}", path.display());
    }
    Ok(())
}

fn run_prefs(config: &Config, auto_download: Option<bool>) -> color_eyre::Result<()> {
    let path = config.prefs_path();
    let mut prefs = Preferences::load(&path)?;

    if let Some(auto_download) = auto_download {
        prefs.auto_download = auto_download;
        prefs.save(&path)?;
    }

    println!("{}", serde_json::to_string_pretty(&prefs)?);
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::config();
    let logs = logging::init(config.log.log_capacity);
    color_eyre::install()?;

    match &config.command {
        Command::Prefs { auto_download } => run_prefs(&config, *auto_download),
        Command::Scan {
            course, download, ..
        }
        | Command::Download {
            course, download, ..
        } => run_course_command(&config, &logs, course, download).await,
    }
}
