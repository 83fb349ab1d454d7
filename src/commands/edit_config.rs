use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};

use crate::cli::{ConfigAction, ConfigArgs};
use crate::render::{self, Painter};
use crate::ConfigError;

// ---

/// `config show` prints the file as written; `config set` edits one existing
/// key and refuses to leave an invalid file behind. Neither requires the
/// current file to be valid.
pub(super) fn run(path: &Path, painter: &Painter, args: &ConfigArgs) -> Result<ExitCode> {
    // ---
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }

    match args.action {
        ConfigAction::Show => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("unable to read config {}", path.display()))?;
            println!("{}", render::config_view(painter, path, &text));
        }
        ConfigAction::Set => {
            let (Some(key), Some(value)) = (args.key.as_deref(), args.value.as_deref()) else {
                bail!("provide a key and a value, e.g. `ag config set thresholds.pm25.warn 15`");
            };
            crate::config::set_value(path, key, value)?;
            println!("{}", render::config_updated_line(painter, key, value));
        }
    }
    Ok(ExitCode::SUCCESS)
}
