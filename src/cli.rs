//! Interface de linha de comando do blueprint-verify baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (init, apply, verify,
//! teardown, test, poll, match) e flags globais que sobrescrevem a configuração.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{StatusBackend, VerifyConfig};

/// blueprint-verify: teste de integração de blueprints de data warehouse.
#[derive(Debug, Parser)]
#[command(name = "blueprint-verify", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: `blueprint-verify.toml`, se existir).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Projeto GCP em teste; tem precedência sobre arquivo e ambiente.
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Diretório com a configuração Terraform do blueprint.
    #[arg(long, global = true)]
    pub terraform_dir: Option<PathBuf>,

    /// Backend usado para consultar o estado dos workflows.
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// Habilita saída detalhada (logs em nível debug).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Backend aceito pela CLI, mapeado para [`StatusBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// `gcloud workflows executions ...`
    Gcloud,
    /// API REST de Workflow Executions.
    Api,
}

impl From<BackendArg> for StatusBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Gcloud => StatusBackend::Gcloud,
            BackendArg::Api => StatusBackend::Api,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// `terraform init`, com retentativa de erros transitórios.
    Init,

    /// `terraform apply`, com retentativa de erros transitórios.
    Apply,

    /// Aguarda os workflows e valida as tabelas do blueprint já aplicado.
    Verify,

    /// `terraform destroy`, com retentativa de erros transitórios.
    Teardown,

    /// Execução completa: init, apply, verify e teardown.
    Test,

    /// Consulta um workflow até terminar, usando a política configurada.
    Poll {
        /// Nome do workflow (por exemplo `copy-data`).
        workflow: String,
    },

    /// Mostra qual regra de erro transitório reconhece a mensagem (sem executar nada).
    Match {
        /// Mensagem de erro a classificar.
        message: String,
    },
}

impl Cli {
    /// Aplica as flags globais sobre a configuração carregada.
    pub fn apply_overrides(&self, config: &mut VerifyConfig) {
        if let Some(project) = &self.project {
            config.project_id = Some(project.clone());
        }
        if let Some(dir) = &self.terraform_dir {
            config.terraform_dir = dir.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
    }
}
