pub mod bq;
pub mod command;
pub mod error;
pub mod gcloud;
pub mod terraform;
pub mod types;
pub mod workflows_api;

pub use bq::Bq;
pub use command::{CommandRunner, SystemRunner};
pub use error::{CommandError, WorkflowsApiError};
pub use gcloud::{GcloudWorkflows, print_access_token};
pub use terraform::{Terraform, TerraformCommand};
pub use types::{Execution, ExecutionError, ExecutionList, TerraformOutput, TerraformOutputs};
pub use workflows_api::WorkflowsApi;
