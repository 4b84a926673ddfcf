use crate::{
    blueprint,
    config::{self, Configuration, ConfigError, Overrides, RawArgs},
    filesystem::LocalFilesystem,
    materialize::{self, PlannedFile, RunSummary},
};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum KickstackError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidArgument(#[from] ConfigError),
}

/// Loads the optional override file and resolves the run's [`Configuration`].
///
/// # Errors
///
/// Returns a [`KickstackError::InvalidArgument`] if:
///
/// - The current directory cannot be determined.
/// - The override file cannot be read or parsed.
/// - The root or any override is rejected by [`config::resolve`].
pub fn configure(raw: &RawArgs) -> Result<Configuration, KickstackError> {
    let working_dir = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;

    let file_overrides = match &raw.config_file {
        Some(path) => {
            log::debug!("Loading overrides from: {}", path.display());
            Overrides::from_file(path)?
        }
        None => Overrides::default(),
    };

    Ok(config::resolve(raw, &working_dir, file_overrides)?)
}

/// Writes the built-in stack into the configured root.
///
/// Per-file failures do not make this return `Err`; they are recorded in the returned
/// [`RunSummary`], whose [`RunSummary::exit_code`] reflects them.
///
/// # Errors
///
/// Returns a [`KickstackError`] if the configuration cannot be resolved. Nothing is written
/// in that case.
pub fn generate(raw: &RawArgs) -> Result<RunSummary, KickstackError> {
    let config = configure(raw)?;

    log::debug!("Materializing scaffold into: {}", config.root().display());

    Ok(materialize::materialize(
        &blueprint::scaffold(),
        &config,
        &LocalFilesystem,
    ))
}

/// Computes what [`generate`] would do, without writing.
///
/// # Errors
///
/// Same as [`generate`].
pub fn preview(raw: &RawArgs) -> Result<(Configuration, Vec<PlannedFile>), KickstackError> {
    let config = configure(raw)?;

    let planned = materialize::plan(&blueprint::scaffold(), &config, &LocalFilesystem);

    Ok((config, planned))
}
