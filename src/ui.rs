//! Interface de terminal do blueprint-verify: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner de progresso e `console` para cores.
//! O [`RunProgress`] acompanha visualmente os estágios de uma execução.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::report::{RunStatus, Stage, VerificationReport};

/// Indicador visual de progresso para uma execução no terminal.
///
/// Exibe um spinner durante cada estágio e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e estágios concluídos (amarelo).
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner com uma descrição da execução.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(description.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza o spinner para o estágio atual.
    pub fn stage(&self, stage: Stage) {
        self.pb.set_message(format!("{stage}"));
        self.pb
            .println(format!("  {} {stage}", self.yellow.apply_to("→")));
    }

    /// Finaliza o spinner e exibe o resultado final.
    pub fn complete(&self, report: &VerificationReport) {
        self.pb.finish_and_clear();
        match report.status {
            RunStatus::Passed => {
                println!("  {} Blueprint verified", self.green.apply_to("✓"));
            }
            _ => {
                let reason = report.error.as_deref().unwrap_or("unknown error");
                println!("  {} Verification failed: {reason}", self.red.apply_to("✗"));
            }
        }
    }

    /// Finaliza o spinner com uma mensagem simples de sucesso ou falha.
    pub fn finish(&self, ok: bool, message: &str) {
        self.pb.finish_and_clear();
        if ok {
            println!("  {} {message}", self.green.apply_to("✓"));
        } else {
            println!("  {} {message}", self.red.apply_to("✗"));
        }
    }

    /// Imprime o relatório da execução em JSON com estilo colorido.
    pub fn print_report(&self, report: &VerificationReport) {
        let status_style = match report.status {
            RunStatus::Passed => &self.green,
            RunStatus::Failed => &self.red,
            RunStatus::Running => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Verification Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}
