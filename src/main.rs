use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use ropey::Rope;
use taghl::kernel::services::adapters::{
    ensure_settings_file, load_settings, HighlightMessage, HighlightRuntime, StdoutHost,
};
use taghl::kernel::services::ports::Settings;
use taghl::kernel::{BufferId, BufferInfo, HighlightSession};

mod logging;

const USAGE: &str =
    "usage: taghl --filetype <ft> [--settings <file>] [--worker <binary>] [--root <dir>] <file>";

/// Buffer id used for the single file highlighted per run.
const CLI_BUFFER: BufferId = BufferId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    filetype: String,
    settings: Option<PathBuf>,
    worker: Option<PathBuf>,
    root: Option<PathBuf>,
    file: PathBuf,
}

fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut filetype = None;
    let mut settings = None;
    let mut worker = None;
    let mut root = None;
    let mut file = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("missing value for {}", flag))
        };
        match arg.as_str() {
            "--filetype" | "-f" => filetype = Some(value(&arg)?),
            "--settings" => settings = Some(PathBuf::from(value(&arg)?)),
            "--worker" => worker = Some(PathBuf::from(value(&arg)?)),
            "--root" => root = Some(PathBuf::from(value(&arg)?)),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ if file.is_none() => file = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument {}", arg)),
        }
    }

    Ok(CliArgs {
        filetype: filetype.ok_or("--filetype is required")?,
        settings,
        worker,
        root,
        file: file.ok_or("missing input file")?,
    })
}

fn resolve_settings(args: &CliArgs) -> Settings {
    let path = match &args.settings {
        Some(path) => Some(path.clone()),
        None => match ensure_settings_file() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "settings file unavailable, using defaults");
                None
            }
        },
    };

    let mut settings = match path {
        Some(path) => load_settings(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to load settings, using defaults");
            Settings::default()
        }),
        None => Settings::default(),
    };

    if let Some(worker) = &args.worker {
        settings.worker.binary = Some(worker.clone());
    }
    settings
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn run(args: CliArgs) -> Result<(), String> {
    let settings = resolve_settings(&args);

    let file = absolute(&args.file);
    let content = std::fs::read_to_string(&file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    let project_root = match &args.root {
        Some(root) => absolute(root),
        None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let session = Arc::new(HighlightSession::new(StdoutHost::stdout(), settings));
    session
        .attach_buffer(BufferInfo {
            id: CLI_BUFFER,
            filetype: args.filetype.clone(),
            path: file,
            project_root,
        })
        .map_err(|e| e.to_string())?;

    let (tx, rx) = mpsc::channel();
    let runtime = HighlightRuntime::new(session.clone(), tx).map_err(|e| e.to_string())?;
    runtime.highlight_external(CLI_BUFFER, Rope::from_str(&content));

    let outcome = match rx.recv() {
        Ok(HighlightMessage::Flushed { ops, .. }) => {
            tracing::info!(ops, "highlight pass committed");
            Ok(())
        }
        Ok(HighlightMessage::Dropped { .. }) => Err("highlight request dropped".to_string()),
        Ok(HighlightMessage::Failed { error, .. }) => Err(error),
        Err(e) => Err(e.to_string()),
    };

    session.detach_buffer(CLI_BUFFER);
    outcome
}

fn main() -> ExitCode {
    let logging = logging::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("taghl: {}\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "taghl failed");
            eprintln!("taghl: {}", e);
            if let Some(guard) = &logging {
                eprintln!("taghl: logs in {}", guard.log_dir().display());
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/cli_args.rs"]
mod tests;
