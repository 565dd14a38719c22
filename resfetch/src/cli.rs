// resfetch/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use resfetch_common::config::Config;
use resfetch_common::error::Result;
use resfetch_common::BackendKind;

pub mod report;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "resfetch", bin_name = "resfetch")]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root every manifest folder path is relative to.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Directory holding the per-folder JSON manifests.
    #[arg(long, value_name = "DIR")]
    pub manifests: Option<PathBuf>,

    /// Manifest file inside the manifests directory (repeatable). Defaults to
    /// every *.json file.
    #[arg(long = "manifest", value_name = "FILE")]
    pub manifest_files: Vec<String>,

    /// Where shared .hef and .mp4 resources are staged.
    #[arg(long, value_name = "DIR")]
    pub common_dir: Option<PathBuf>,

    /// Skip staging shared resources; materialize folders only.
    #[arg(long)]
    pub skip_common: bool,

    #[arg(long, value_name = "KIND")]
    pub backend: Option<BackendKind>,

    /// Base URL of the object store used by the http backend.
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Local directory used by the mirror backend.
    #[arg(long, value_name = "DIR")]
    pub mirror: Option<PathBuf>,

    /// Fail when a downloaded file does not hash to the advertised value.
    #[arg(long)]
    pub verify: bool,
}

impl CliArgs {
    /// Flags expressed as the environment variables they override.
    pub fn env_overrides(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        let mut set = |key, value: Option<String>| {
            if let Some(value) = value {
                vars.insert(key, value);
            }
        };
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());

        set("RESFETCH_ROOT", path(&self.root));
        set("RESFETCH_MANIFESTS", path(&self.manifests));
        set(
            "RESFETCH_MANIFEST_FILES",
            (!self.manifest_files.is_empty()).then(|| self.manifest_files.join(",")),
        );
        set("RESFETCH_COMMON_DIR", path(&self.common_dir));
        set("RESFETCH_BACKEND", self.backend.map(|b| b.to_string()));
        set("RESFETCH_REMOTE_URL", self.remote_url.clone());
        set("RESFETCH_MIRROR", path(&self.mirror));
        set("RESFETCH_VERIFY", self.verify.then(|| "1".to_string()));
        vars
    }

    /// Environment configuration with command-line flags taking precedence.
    /// Derived defaults (manifests and common dir) follow an overridden root.
    pub fn load_config(&self) -> Result<Config> {
        let overrides = self.env_overrides();
        let cwd = env::current_dir()?;
        Config::load_from(
            |key| overrides.get(key).cloned().or_else(|| env::var(key).ok()),
            &cwd,
        )
    }
}
