//! `peerdrop config`: show, locate, or create the config file.

use std::path::{Path, PathBuf};

use peerdrop_common::{PeerdropError, Result};
use peerdrop_config::toml_loader::{create_default_config, default_config_path};
use peerdrop_config::{config_to_toml, PeerdropConfig};

use crate::cli::ConfigAction;

pub fn run(action: ConfigAction, override_path: Option<&Path>, config: &PeerdropConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config_to_toml(config));
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", config_path(override_path)?.display());
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = config_path(override_path)?;
            init(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(default_config_path()?),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(PeerdropError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    create_default_config(path)?;
    Ok(())
}
