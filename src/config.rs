//! Configuração do blueprint-verify carregada a partir de `blueprint-verify.toml`.
//!
//! A struct [`VerifyConfig`] contém todos os parâmetros configuráveis.
//! Campos ausentes no arquivo usam os valores padrão do blueprint de data
//! warehouse. As variáveis de ambiente `GOOGLE_CLOUD_PROJECT` e
//! `GOOGLE_OAUTH_ACCESS_TOKEN` têm precedência sobre o arquivo.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::policy::{PollPolicy, RetryPolicy};
use crate::retry::{RetryableErrorMatcher, TransientErrorRule};

/// Arquivo lido quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "blueprint-verify.toml";

/// Backend usado para consultar o estado das execuções de workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    /// `gcloud workflows executions ...`
    #[default]
    Gcloud,
    /// API REST de Workflow Executions via HTTP.
    Api,
}

/// Configuração de nível superior carregada de `blueprint-verify.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    /// Projeto GCP. Quando ausente, é lido da saída `project_id` do Terraform.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Diretório com a configuração Terraform do blueprint.
    #[serde(default = "default_terraform_dir")]
    pub terraform_dir: PathBuf,

    /// Região dos workflows.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub backend: StatusBackend,

    /// Token OAuth para o backend `api`. Se ausente, usa `gcloud auth print-access-token`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// URL base alternativa da API REST (útil para testes).
    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Workflows que precisam terminar antes da validação das tabelas, na ordem de espera.
    #[serde(default = "default_workflows")]
    pub workflows: Vec<WorkflowConfig>,

    /// Tabelas (`dataset.tabela`) que devem conter ao menos uma linha.
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,
}

/// Retentativas dos comandos do Terraform.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total de tentativas, incluindo a primeira.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: NonZeroU32,

    /// Espera fixa entre tentativas, em segundos.
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,

    /// Padrões de erro transitório. Uma lista vazia desativa as retentativas.
    #[serde(default = "TransientErrorRule::blueprint_defaults")]
    pub rules: Vec<TransientErrorRule>,
}

/// Um workflow a aguardar e o orçamento de consultas para ele.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,

    #[serde(default = "default_poll_attempts")]
    pub max_attempts: NonZeroU32,

    /// Intervalo entre consultas, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

// Valor padrão para o diretório do Terraform: o diretório atual.
fn default_terraform_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_region() -> String {
    "us-central1".to_string()
}

// 60 tentativas com 1 minuto de espera entre elas.
fn default_retry_attempts() -> NonZeroU32 {
    NonZeroU32::new(60).unwrap_or(NonZeroU32::MIN)
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_poll_attempts() -> NonZeroU32 {
    NonZeroU32::new(50).unwrap_or(NonZeroU32::MIN)
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn workflow(name: &str, max_attempts: u32) -> WorkflowConfig {
    WorkflowConfig {
        name: name.to_string(),
        max_attempts: NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN),
        interval_secs: default_poll_interval_secs(),
    }
}

fn default_workflows() -> Vec<WorkflowConfig> {
    vec![workflow("copy-data", 50), workflow("project-setup", 100)]
}

fn default_tables() -> Vec<String> {
    [
        "gcp_primary_raw.ga4_obfuscated_sample_ecommerce_images",
        "gcp_primary_raw.textocr_images",
        "gcp_primary_staging.new_york_taxi_trips_tlc_yellow_trips_2022",
        "gcp_primary_staging.thelook_ecommerce_distribution_centers",
        "gcp_primary_staging.thelook_ecommerce_events",
        "gcp_primary_staging.thelook_ecommerce_inventory_items",
        "gcp_primary_staging.thelook_ecommerce_order_items",
        "gcp_primary_staging.thelook_ecommerce_orders",
        "gcp_primary_staging.thelook_ecommerce_products",
        "gcp_primary_staging.thelook_ecommerce_users",
        "gcp_lakehouse_ds.agg_events_iceberg",
    ]
    .map(str::to_string)
    .to_vec()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            delay_secs: default_retry_delay_secs(),
            rules: TransientErrorRule::blueprint_defaults(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }

    /// Constrói um matcher próprio desta configuração (sem estado global).
    pub fn matcher(&self) -> RetryableErrorMatcher {
        RetryableErrorMatcher::new(self.rules.clone(), self.policy())
    }
}

impl WorkflowConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_attempts, Duration::from_secs(self.interval_secs))
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            terraform_dir: default_terraform_dir(),
            region: default_region(),
            backend: StatusBackend::default(),
            access_token: None,
            api_base_url: None,
            retry: RetryConfig::default(),
            workflows: default_workflows(),
            tables: default_tables(),
        }
    }
}

impl VerifyConfig {
    /// Carrega a configuração de `path`, ou de `blueprint-verify.toml` no
    /// diretório atual. Usa valores padrão se o arquivo padrão não existir;
    /// um caminho explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str::<VerifyConfig>(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(project) = lookup("GOOGLE_CLOUD_PROJECT")
            && !project.is_empty()
        {
            self.project_id = Some(project);
        }
        if let Some(token) = lookup("GOOGLE_OAUTH_ACCESS_TOKEN")
            && !token.is_empty()
        {
            self.access_token = Some(token);
        }
    }

    /// Rejeita workflows sem nome e tabelas fora do formato `dataset.tabela`.
    pub fn validate(&self) -> Result<()> {
        if let Some(wf) = self.workflows.iter().find(|wf| wf.name.trim().is_empty()) {
            bail!("workflow entry with empty name (max_attempts = {})", wf.max_attempts);
        }
        for table in &self.tables {
            match table.split_once('.') {
                Some((dataset, name)) if !dataset.is_empty() && !name.is_empty() => {}
                _ => bail!("table `{table}` must be written as `dataset.table`"),
            }
        }
        Ok(())
    }

    pub fn workflow(&self, name: &str) -> Option<&WorkflowConfig> {
        self.workflows.iter().find(|wf| wf.name == name)
    }
}
