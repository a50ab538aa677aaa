//! Interface de linha de comando do callcache.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::config::CONFIG_FILE;

/// callcache - inspeciona e limpa o cache persistente de chamadas.
#[derive(Parser, Debug)]
#[command(name = "callcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arquivo de configuração.
    #[arg(short, long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Modo verbose.
    #[arg(short, long)]
    pub verbose: bool,

    /// Modo silencioso.
    #[arg(short, long)]
    pub quiet: bool,

    /// Comando a executar.
    #[command(subcommand)]
    pub command: Commands,
}

/// Comandos disponíveis.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inicializa configuração e diretório do cache.
    Init {
        /// Diretório de destino (padrão: diretório atual).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Lista as entradas do cache.
    List,

    /// Mostra argumentos e resultado de uma entrada.
    Show {
        /// Identidade da função.
        identity: String,
    },

    /// Remove uma entrada, ou todas.
    Clear {
        /// Identidade da função (omitida: todas).
        identity: Option<String>,
    },

    /// Verifica a integridade das entradas.
    Verify {
        /// Remove as entradas corrompidas.
        #[arg(long)]
        prune: bool,
    },

    /// Mostra versão.
    Version,
}
