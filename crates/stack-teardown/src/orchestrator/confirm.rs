//! Operator confirmation before destructive work

use super::plan::DeletionPlan;
use stack_teardown_common::defaults::CONFIRM_TOKEN;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks whether a plan may be executed
#[allow(async_fn_in_trait)] // Internal trait, callers await on the same task
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer: Send + Sync {
    /// `Ok(true)` only on explicit approval
    async fn confirm(&self, plan: &DeletionPlan) -> std::io::Result<bool>;
}

/// Prints the plan and reads the confirmation token from stdin.
///
/// Anything other than the exact token (surrounding whitespace aside),
/// including end of input, is a refusal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    async fn confirm(&self, plan: &DeletionPlan) -> std::io::Result<bool> {
        let mut stdout = tokio::io::stdout();
        let prompt = format!(
            "{plan}\n\nThis will permanently delete {} resources.\nType '{CONFIRM_TOKEN}' to continue: ",
            plan.resource_count()
        );
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(is_confirmation(&line))
    }
}

fn is_confirmation(input: &str) -> bool {
    input.trim() == CONFIRM_TOKEN
}
