mod procfile;

use crate::procfile::{Procfile, ProcfileError};
use commons::error::BuildpackErrorMessage;
use commons::log::{log_header, log_info};
use commons::runtime::{entrypoint_override, RuntimeSelection};
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::launch::{LaunchBuilder, Process, ProcessBuilder, ProcessType};
use libcnb::data::process_type;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::{GenericMetadata, GenericPlatform};
use libcnb::{buildpack_main, Buildpack, Env, Platform};
use std::fs;
use std::path::Path;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

pub(crate) struct EntrypointBuildpack;

impl Buildpack for EntrypointBuildpack {
    type Platform = GenericPlatform;
    type Metadata = GenericMetadata;
    type Error = EntrypointBuildpackError;

    fn detect(&self, _context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        DetectResultBuilder::pass().build()
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Entrypoint");

        let env = context.platform.env();
        let missing_entrypoint = || EntrypointBuildpackError::MissingEntrypoint {
            language: app_language(env, &context.app_dir),
        };

        let processes = match entrypoint_override(env) {
            Some(entrypoint) => {
                log_info(format!("Using GOOGLE_ENTRYPOINT: {entrypoint}"));
                vec![shell_process(process_type!("web"), &entrypoint, true)]
            }
            None => {
                let procfile = Procfile::read(&context.app_dir)
                    .map_err(EntrypointBuildpackError::Procfile)?
                    .ok_or_else(missing_entrypoint)?;
                log_info("Using processes from Procfile");
                procfile_processes(&procfile).ok_or_else(missing_entrypoint)?
            }
        };

        BuildResultBuilder::new()
            .launch(LaunchBuilder::new().processes(processes).build())
            .build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

/// Runs the command through `bash -c`, so it may contain environment variable assignments and
/// shell syntax, for example `FOO=bar ruby main.rb`.
fn shell_process(process_type: ProcessType, command: &str, default: bool) -> Process {
    ProcessBuilder::new(process_type, ["bash", "-c", command])
        .default(default)
        .build()
}

/// `web` is the default process if the Procfile declares one, otherwise the first process is.
///
/// Returns `None` for a Procfile without processes.
fn procfile_processes(procfile: &Procfile) -> Option<Vec<Process>> {
    let default_process = procfile
        .processes
        .iter()
        .find(|(process_type, _)| *process_type == process_type!("web"))
        .or_else(|| procfile.processes.first())
        .map(|(process_type, _)| process_type.clone())?;

    Some(
        procfile
            .processes
            .iter()
            .map(|(process_type, command)| {
                shell_process(
                    process_type.clone(),
                    command,
                    *process_type == default_process,
                )
            })
            .collect(),
    )
}

/// Runtime name in `GOOGLE_RUNTIME`, display name, root-level files and file extension that
/// identify an app of that language.
const LANGUAGES: [(&str, &str, &[&str], &str); 3] = [
    ("ruby", "Ruby", &["Gemfile", "Gemfile.lock", "gems.rb"], "rb"),
    ("nodejs", "Node.js", &["package.json"], "js"),
    (
        "java",
        "Java",
        &["pom.xml", "build.gradle", "build.gradle.kts"],
        "java",
    ),
];

/// Guesses the app's language for error messages: an explicit `GOOGLE_RUNTIME` first, then the
/// files at the root of the app.
fn app_language(env: &Env, app_dir: &Path) -> Option<&'static str> {
    let selections = LANGUAGES.map(|(runtime, name, files, extension)| {
        (
            RuntimeSelection::from_env(env, runtime),
            name,
            files,
            extension,
        )
    });

    if let Some((_, name, _, _)) = selections
        .iter()
        .find(|(selection, ..)| *selection == RuntimeSelection::Selected)
    {
        return Some(*name);
    }

    let root_files = fs::read_dir(app_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect::<Vec<_>>();

    selections
        .iter()
        .filter(|(selection, ..)| *selection == RuntimeSelection::Unspecified)
        .find(|(_, _, files, extension)| {
            root_files.iter().any(|path| {
                path.file_name()
                    .is_some_and(|file_name| files.iter().any(|file| file_name == *file))
                    || path.extension().is_some_and(|ext| ext == *extension)
            })
        })
        .map(|(_, name, _, _)| *name)
}

#[derive(Debug)]
pub(crate) enum EntrypointBuildpackError {
    MissingEntrypoint { language: Option<&'static str> },
    Procfile(ProcfileError),
}

impl BuildpackErrorMessage for EntrypointBuildpackError {
    fn header(&self) -> String {
        match self {
            EntrypointBuildpackError::MissingEntrypoint { .. } => "No entrypoint",
            EntrypointBuildpackError::Procfile(_) => "Invalid Procfile",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            EntrypointBuildpackError::MissingEntrypoint { language } => {
                let message = "an entrypoint must be manually set, either with \"GOOGLE_ENTRYPOINT\" env var or by creating a \"Procfile\" file";
                match language {
                    Some(language) => format!("for {language}, {message}"),
                    None => message.to_string(),
                }
            }
            EntrypointBuildpackError::Procfile(error) => error.to_string(),
        }
    }
}

impl From<EntrypointBuildpackError> for libcnb::Error<EntrypointBuildpackError> {
    fn from(error: EntrypointBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}

buildpack_main!(EntrypointBuildpack);
