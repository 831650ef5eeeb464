//! Erros das ferramentas externas: subprocessos (`terraform`, `gcloud`, `bq`)
//! e a API REST de Workflow Executions.
//!
//! O `Display` de [`CommandError`] inclui o stderr completo da ferramenta,
//! pois é esse texto que as regras de erro transitório comparam.

use thiserror::Error;

/// Falha ao executar uma ferramenta de linha de comando.
#[derive(Debug, Error)]
pub enum CommandError {
    /// O processo nem chegou a iniciar (binário ausente, permissão negada).
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// O processo terminou com status diferente de zero.
    #[error("{program} failed ({}): {stderr}", describe_code(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

/// Erros que podem ocorrer ao consultar a API de Workflow Executions.
#[derive(Debug, Error)]
pub enum WorkflowsApiError {
    /// O servidor retornou HTTP 429.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Qualquer outro status HTTP de erro (ex.: 403 sem permissão, 404 workflow inexistente).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
