//! Batch driver
//!
//! Accounts are processed strictly one after another with a random pause
//! between them. A failing account never stops the batch; it shows up as a
//! failure line in the summary.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::DelayConfig;
use crate::error::SessionError;
use crate::models::AccountConfig;
use crate::notify::Notifier;
use crate::runlog::RunLog;
use crate::session::SessionManager;
use crate::steps::StepRange;
use crate::zepp::ZeppApi;

pub const NOTIFY_TITLE: &str = "Step runner";

/// Result of one account
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    /// Masked account identifier
    pub account: String,
    pub steps: u32,
    pub range: StepRange,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcomes: Vec<AccountOutcome>,
    pub finished_at: DateTime<Local>,
    /// Exported run log, complete once the batch has finished
    pub run_log: String,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Human-readable report sent as the notification body
    pub fn render(&self) -> String {
        let total = self.outcomes.len();
        let mut out = String::from("Step runner report\n\n");
        out.push_str(&format!("Succeeded: {}/{}\n", self.success_count(), total));
        out.push_str(&format!("Failed: {}/{}\n\n", self.failure_count(), total));

        if self.success_count() > 0 {
            out.push_str("Successes:\n");
            for o in self.outcomes.iter().filter(|o| o.success) {
                out.push_str(&format!("  {} - {} steps (range {})\n", o.account, o.steps, o.range));
            }
            out.push('\n');
        }

        if self.failure_count() > 0 {
            out.push_str("Failures:\n");
            for o in self.outcomes.iter().filter(|o| !o.success) {
                out.push_str(&format!("  {} - {}\n", o.account, o.message));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "Finished at: {}",
            self.finished_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out
    }
}

pub struct BatchRunner {
    sessions: SessionManager,
    api: Arc<dyn ZeppApi>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    delay: DelayConfig,
}

impl BatchRunner {
    pub fn new(
        sessions: SessionManager,
        api: Arc<dyn ZeppApi>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        delay: DelayConfig,
    ) -> Self {
        Self {
            sessions,
            api,
            notifier,
            clock,
            delay,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Fresh run log stamped by the runner's clock
    pub fn new_log(&self) -> RunLog {
        RunLog::new(self.clock.clone())
    }

    /// Process every account and deliver the summary
    pub async fn run(&self, accounts: &[AccountConfig], log: &mut RunLog) -> RunSummary {
        log.info(None, format!("Processing {} account(s)", accounts.len()));

        let mut outcomes = Vec::with_capacity(accounts.len());
        for (i, account) in accounts.iter().enumerate() {
            log.info(
                None,
                format!("======== Account {}/{} ========", i + 1, accounts.len()),
            );
            outcomes.push(self.process_account(account, log).await);

            if i + 1 < accounts.len() {
                let pause = self.delay.pick(&mut rand::thread_rng());
                log.info(
                    None,
                    format!("Waiting {:.1}s before the next account", pause.as_secs_f64()),
                );
                sleep(pause).await;
            }
        }

        let mut summary = RunSummary {
            outcomes,
            finished_at: self.clock.now().with_timezone(&Local),
            run_log: String::new(),
        };
        let report = summary.render();
        log.info(None, format!("\n{report}"));

        match self.notifier.send(NOTIFY_TITLE, &report).await {
            Ok(()) => log.success(None, "Notification sent"),
            Err(e) => log.error(None, format!("Notification failed: {e:#}")),
        }

        summary.run_log = log.export();
        summary
    }

    async fn process_account(&self, account: &AccountConfig, log: &mut RunLog) -> AccountOutcome {
        let tag = account.masked();
        let steps = account.steps.draw(&mut rand::thread_rng());
        let outcome = |success: bool, message: String| AccountOutcome {
            account: tag.clone(),
            steps,
            range: account.steps,
            success,
            message,
        };

        let session = match self.sessions.acquire_session(account, log).await {
            Ok(session) => session,
            Err(SessionError::MissingCredentials) => {
                log.error(Some(&tag), "Account or password is not configured");
                return outcome(false, SessionError::MissingCredentials.to_string());
            }
            Err(e) => return outcome(false, e.to_string()),
        };

        let today = self.clock.now().with_timezone(&Local).date_naive();
        match self
            .api
            .submit_steps(&session.app_token, &session.user_id, steps, today)
            .await
        {
            Ok(()) => {
                log.success(Some(&tag), format!("Submitted {steps} steps"));
                outcome(true, format!("submitted {steps} steps"))
            }
            Err(e) => {
                log.error(Some(&tag), format!("Step submission failed: {e}"));
                outcome(false, e.to_string())
            }
        }
    }
}

/// Run a batch on every firing of `schedule` until the scheduler is shut down
///
/// Firings that arrive while a batch is still running wait for it to finish.
pub async fn start_schedule(
    runner: Arc<BatchRunner>,
    accounts: Arc<Vec<AccountConfig>>,
    schedule: &str,
) -> Result<JobScheduler> {
    let running = Arc::new(Mutex::new(()));
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let runner = runner.clone();
        let accounts = accounts.clone();
        let running = running.clone();
        Box::pin(async move {
            let _guard = running.lock().await;
            info!("Scheduled batch started");
            let mut log = runner.new_log();
            let summary = runner.run(&accounts, &mut log).await;
            info!("Run log:\n{}", summary.run_log);
            if summary.failure_count() > 0 {
                error!(
                    "Scheduled batch finished with {} failure(s)",
                    summary.failure_count()
                );
            } else {
                info!("Scheduled batch finished");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started step runner scheduler with schedule: {}", schedule);
    Ok(scheduler)
}
