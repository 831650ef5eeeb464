//! Tipos de dados das execuções de Cloud Workflows e das saídas do Terraform.
//!
//! O mesmo formato JSON (camelCase) é retornado por
//! `gcloud workflows executions ... --format=json` e pela API REST, então
//! ambos os backends desserializam para [`Execution`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Uma execução de workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Nome completo do recurso
    /// (`projects/.../locations/.../workflows/.../executions/<id>`).
    pub name: String,
    /// Estado reportado pela API (ex.: "ACTIVE", "SUCCEEDED", "FAILED").
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Presente apenas quando a execução falhou.
    #[serde(default)]
    pub error: Option<ExecutionError>,
}

/// Detalhes de erro de uma execução com falha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub context: String,
}

/// Resposta do endpoint `executions.list` da API REST.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionList {
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Uma entrada de `terraform output -json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformOutput {
    #[serde(default)]
    pub sensitive: bool,
    pub value: serde_json::Value,
}

/// Todas as saídas de `terraform output -json`, indexadas por nome.
pub type TerraformOutputs = BTreeMap<String, TerraformOutput>;
