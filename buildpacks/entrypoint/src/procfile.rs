use libcnb::data::launch::{ProcessType, ProcessTypeError};
use std::fs;
use std::io;
use std::path::Path;

/// Process declarations from a `Procfile`, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Procfile {
    pub(crate) processes: Vec<(ProcessType, String)>,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ProcfileError {
    #[error("Couldn't read Procfile: {0}")]
    Read(io::Error),

    #[error("Line {line} of the Procfile is not of the form `name: command`")]
    InvalidLine { line: usize },

    #[error("Line {line} of the Procfile has an invalid process type: {source}")]
    InvalidProcessType {
        line: usize,
        #[source]
        source: ProcessTypeError,
    },

    #[error("Line {line} of the Procfile declares an empty command for {process_type}")]
    EmptyCommand {
        line: usize,
        process_type: ProcessType,
    },

    #[error("The Procfile declares {0} more than once")]
    DuplicateProcessType(ProcessType),
}

impl Procfile {
    /// Reads the `Procfile` from the app directory, if there is one.
    pub(crate) fn read(app_dir: &Path) -> Result<Option<Self>, ProcfileError> {
        match fs::read_to_string(app_dir.join("Procfile")) {
            Ok(contents) => Self::parse(&contents).map(Some),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ProcfileError::Read(error)),
        }
    }

    pub(crate) fn parse(contents: &str) -> Result<Self, ProcfileError> {
        let mut processes: Vec<(ProcessType, String)> = Vec::new();

        for (index, raw_line) in contents.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (name, command) = trimmed
                .split_once(':')
                .ok_or(ProcfileError::InvalidLine { line })?;
            let process_type = name
                .trim()
                .parse::<ProcessType>()
                .map_err(|source| ProcfileError::InvalidProcessType { line, source })?;

            let command = command.trim();
            if command.is_empty() {
                return Err(ProcfileError::EmptyCommand { line, process_type });
            }
            if processes.iter().any(|(existing, _)| *existing == process_type) {
                return Err(ProcfileError::DuplicateProcessType(process_type));
            }

            processes.push((process_type, command.to_string()));
        }

        Ok(Self { processes })
    }
}
