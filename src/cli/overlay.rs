//! Overlay command implementation

use clap::Args;
use std::path::PathBuf;

use crate::config::Config;
use crate::overlay::{build_theo_overlay, Palette};
use crate::replay::ReplayReader;

#[derive(Args, Debug)]
pub struct OverlayArgs {
    /// Coin to plot
    pub coin: String,

    /// Theo feature to stack; repeatable, in stacking order
    #[arg(short, long = "feature", required = true)]
    pub features: Vec<String>,

    /// Replay directory; defaults to [replay] directory in config
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Colours overriding [overlay] palette; repeatable
    #[arg(long = "color")]
    pub colors: Vec<String>,

    /// Output JSON file; stdout otherwise
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OverlayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let reader = match &self.dir {
            Some(dir) => ReplayReader::new(dir.clone()).with_max_rows(config.replay.max_rows),
            None => ReplayReader::from_config(&config.replay),
        };
        let palette = if self.colors.is_empty() {
            config.overlay.palette.clone()
        } else {
            Palette::new(self.colors.clone())?
        };

        let theos = reader.theos(&[&self.coin])?;
        let overlay = build_theo_overlay(&theos, &self.features, &palette);
        let json = serde_json::to_string_pretty(&overlay.to_json())?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, json)?;
                tracing::info!(path = ?path, rows = overlay.rows.len(), "Wrote overlay");
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}
