use crate::config::toml_config::TomlConfig;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "art-guessr")]
#[command(about = "Backend for the Art Guessr museum geography game")]
pub struct CliConfig {
    #[arg(long, env = "ART_GUESSR_CONFIG", help = "Path to a TOML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Override server.host")]
    pub host: Option<String>,

    #[arg(long, env = "PORT", help = "Override server.port")]
    pub port: Option<u16>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 載入設定檔 (未指定時使用預設值) 並套用命令列覆寫
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📄 Loading config from {}", path);
                TomlConfig::from_file(path)?
            }
            None => {
                tracing::info!("📄 No config file given, using defaults");
                TomlConfig::default()
            }
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        Ok(config)
    }
}
