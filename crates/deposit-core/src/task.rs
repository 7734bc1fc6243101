use std::sync::Arc;
use std::time::Duration;

use deposit_collaborators::{
    with_session, Assembler, MetadataStore, Receipt, StoreEntity, Transport, TransportOptions, TransportResponse,
};
use deposit_primitives::{CopyStatus, Deposit, DepositStatus, DepositSubmission, Repository, RepositoryConfig, RepositoryCopy, ResourceId};
use tracing::{debug, info, instrument, warn};

use crate::critical::{perform, CriticalConfig, CriticalLocks};
use crate::errors::CriticalOutcome;
use crate::failure_channel::{FailureEvent, FailureReporter};
use crate::packager::Packager;
use crate::status_resolver::{self, StatusDocumentFetcher};

/// Everything [`DepositTask`] needs to process one deposit: the work
/// context carrying `{submission, depositSubmission, repository, deposit,
/// packager}` (§4.4). The submission itself is never read or written here —
/// only its id, for logging — so `submission_id` stands in for it.
#[derive(Clone)]
pub struct DepositWorkContext {
    pub submission_id: ResourceId,
    pub deposit_id: ResourceId,
    pub repository: Repository,
    pub deposit_submission: Arc<DepositSubmission>,
    pub packager: Packager,
}

/// Outcome of Phase A's `mutate` closure: either the transport produced a
/// response (successful or not — `TransportResponse::success` still has to
/// be checked), or the attempt never got that far (assembly failed, or the
/// transport could not even be opened).
enum PhaseAOutcome {
    Responded(TransportResponse),
    Failed(String),
}

enum PhaseAResult {
    Success(TransportResponse),
    NotEligible,
    Failed,
    UnexpectedError(String),
}

/// Runs on a worker thread dispatched by the [`crate::worker_pool::WorkerPool`]
/// (C9). Represents one atomic processing attempt for one deposit: Phase A
/// (physical transfer, critical) followed by Phase B (logical outcome, only
/// entered once Phase A has produced a structured receipt).
pub struct DepositTask {
    pub ctx: DepositWorkContext,
    pub store: Arc<dyn MetadataStore>,
    pub locks: CriticalLocks,
    pub failures: FailureReporter,
    pub critical_config: CriticalConfig,
    pub status_fetcher: Arc<dyn StatusDocumentFetcher>,
}

impl DepositTask {
    #[instrument(skip_all, fields(component = "deposit_task", deposit_id = %self.ctx.deposit_id))]
    pub async fn run(self) {
        match self.run_phase_a().await {
            PhaseAResult::Success(response) => {
                if let Err(reason) = self.run_phase_b(response).await {
                    warn!(error = %reason, "phase B encountered an unexpected error, marking deposit failed");
                    self.failures.report(FailureEvent::deposit(self.ctx.deposit_id.clone(), reason));
                }
            }
            PhaseAResult::NotEligible => {
                debug!("deposit was not eligible for processing (already advanced or terminal)");
            }
            PhaseAResult::Failed => {
                debug!("phase A failed; deposit left dirty for a later retry");
            }
            PhaseAResult::UnexpectedError(reason) => {
                warn!(error = %reason, "phase A critical interaction failed unexpectedly");
                self.failures.report(FailureEvent::deposit(self.ctx.deposit_id.clone(), reason));
            }
        }
    }

    /// Phase A (§4.4): builds the package, opens a transport session, sends
    /// it, and advances the deposit to `SUBMITTED` — all inside one critical
    /// interaction on the deposit.
    async fn run_phase_a(&self) -> PhaseAResult {
        let assembler = self.ctx.packager.assembler.clone();
        let transport = self.ctx.packager.transport.clone();
        let cfg = self.ctx.packager.cfg.clone();
        let transport_options = self.ctx.packager.transport_options.clone();
        let deposit_submission = self.ctx.deposit_submission.clone();

        let outcome = perform::<Deposit, PhaseAOutcome, _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| deposit.status.is_intermediate(),
            move |deposit: &mut Deposit| {
                let assembler = assembler.clone();
                let transport = transport.clone();
                let cfg = cfg.clone();
                let transport_options = transport_options.clone();
                let deposit_submission = deposit_submission.clone();

                async move {
                    match send_package(assembler.as_ref(), transport.as_ref(), &deposit_submission, &cfg, &transport_options)
                        .await
                    {
                        Ok(response) => {
                            deposit.status = DepositStatus::Submitted;
                            PhaseAOutcome::Responded(response)
                        }
                        Err(reason) => PhaseAOutcome::Failed(reason),
                    }
                }
            },
            |deposit: &Deposit, result: &PhaseAOutcome| {
                deposit.status == DepositStatus::Submitted
                    && matches!(result, PhaseAOutcome::Responded(response) if response.success)
            },
            &self.critical_config,
        )
        .await;

        match outcome {
            Ok(CriticalOutcome::Ok { result: PhaseAOutcome::Responded(response) }) => PhaseAResult::Success(response),
            Ok(CriticalOutcome::Ok { result: PhaseAOutcome::Failed(_) }) => {
                unreachable!("postcheck only accepts a successful response")
            }
            Ok(CriticalOutcome::PreconditionFailed) => PhaseAResult::NotEligible,
            Ok(CriticalOutcome::PostconditionFailed { result }) => {
                match &result {
                    PhaseAOutcome::Failed(reason) => debug!(error = %reason, "physical transfer failed"),
                    PhaseAOutcome::Responded(response) => {
                        debug!(error = ?response.error, "transport reported an unsuccessful send")
                    }
                }
                self.mark_dirty().await;
                PhaseAResult::Failed
            }
            Err(err) => PhaseAResult::UnexpectedError(err.to_string()),
        }
    }

    /// §4.4: "If Phase A fails for any reason, the task must ensure the
    /// deposit is left in a dirty (null) state — a separate short critical
    /// update clears status." Errors here are logged, not escalated: there
    /// is nothing further downstream of this to retry it.
    async fn mark_dirty(&self) {
        let outcome = perform::<Deposit, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| !deposit.status.is_terminal(),
            |deposit: &mut Deposit| {
                deposit.mark_dirty();
                async {}
            },
            |deposit: &Deposit, _: &()| deposit.status == DepositStatus::Dirty,
            &self.critical_config,
        )
        .await;

        if let Err(err) = outcome {
            warn!(error = %err, "failed to clear deposit back to dirty after a phase A failure");
        }
    }

    /// Phase B (§4.4): interprets the transport's receipt. Opaque receipts
    /// need nothing further. SWORD-style receipts need a status reference
    /// recorded, a settle sleep, and a resolve+map pass before the deposit
    /// can be advanced to a terminal status.
    async fn run_phase_b(&self, response: TransportResponse) -> Result<(), String> {
        let receipt = match response.receipt {
            Some(receipt) => receipt,
            None => return Ok(()),
        };

        let (alternate_link, atom_statement_link) = match receipt {
            Receipt::Opaque => {
                info!("opaque transport receipt; deposit remains SUBMITTED");
                return Ok(());
            }
            Receipt::Sword { alternate_link, atom_statement_link } => (alternate_link, atom_statement_link),
        };

        let cfg = &self.ctx.packager.cfg;
        let rewritten_statement_url = cfg.rewrite_statement_url(&atom_statement_link);

        // Only the status reference is recorded here. Whether a
        // RepositoryCopy ends up linked — and with what status — depends on
        // how resolution below turns out: a rejection never gets one
        // (spec.md:147-148, S4), while an acceptance or an
        // inconclusive/unmapped resolution does, so C7's postcheck stays
        // satisfiable on retry (§4.6, §9 Open Question 2).
        let link_outcome = perform::<Deposit, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| deposit.status == DepositStatus::Submitted,
            {
                let rewritten_statement_url = rewritten_statement_url.clone();
                move |deposit: &mut Deposit| {
                    deposit.status_ref = Some(rewritten_statement_url.clone());
                    async {}
                }
            },
            |deposit: &Deposit, _: &()| deposit.status_ref.is_some(),
            &self.critical_config,
        )
        .await
        .map_err(|err| err.to_string())?;

        match link_outcome {
            CriticalOutcome::Ok { .. } => {}
            CriticalOutcome::PreconditionFailed => {
                debug!("deposit was no longer SUBMITTED when recording the status reference; abandoning phase B");
                return Ok(());
            }
            CriticalOutcome::PostconditionFailed { .. } => {
                return Err("failed to record status reference on deposit".to_string());
            }
        }

        // Settle sleep: a workaround for endpoints that are effectively
        // synchronous but expose an async status API. Outside any critical
        // section, so a shutdown during the sleep simply abandons the task,
        // leaving the deposit with its statusRef already durably recorded
        // (§5 Cancellation).
        tokio::time::sleep(Duration::from_millis(cfg.settle_interval_ms)).await;

        let external_status = match status_resolver::resolve(self.status_fetcher.as_ref(), &rewritten_statement_url, cfg).await
        {
            Ok(status) => status,
            Err(err) => {
                info!(error = %err, "could not resolve deposit status yet; will retry via reconciliation");
                return self.link_pending_repository_copy().await;
            }
        };

        let internal_status = match cfg.status_mapping.lookup(&external_status) {
            Some(status) => status,
            None => {
                info!(%external_status, "external status has no mapping; will retry via reconciliation");
                return self.link_pending_repository_copy().await;
            }
        };

        match internal_status {
            DepositStatus::Accepted => self.finalize_accepted(&alternate_link).await,
            DepositStatus::Rejected => self.finalize_rejected().await,
            // Any other mapped value is not a meaningful resolution of a
            // status reference; leave the deposit SUBMITTED for a later
            // reconciliation pass.
            other => {
                info!(?other, "resolved status does not map to a terminal outcome; leaving deposit SUBMITTED");
                self.link_pending_repository_copy().await
            }
        }
    }

    /// Creates a RepositoryCopy and links it onto a deposit that is staying
    /// `SUBMITTED` for a later reconciliation pass (resolve failure,
    /// unmapped, or a mapped-but-non-terminal status). Without this, C7
    /// would find a status reference with no linked RepositoryCopy and fail
    /// its postcheck on every pass (§4.6, §9 Open Question 2) — unlike a
    /// rejection, which is terminal and so is never revisited by C7.
    async fn link_pending_repository_copy(&self) -> Result<(), String> {
        let copy = self
            .store
            .create_repository_copy(RepositoryCopy::new_in_progress(self.ctx.repository.id.clone()))
            .await
            .map_err(|err| err.to_string())?;

        let outcome = perform::<Deposit, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| deposit.status == DepositStatus::Submitted && deposit.repository_copy_id.is_none(),
            {
                let copy_id = copy.id.clone();
                move |deposit: &mut Deposit| {
                    deposit.repository_copy_id = Some(copy_id.clone());
                    async {}
                }
            },
            |deposit: &Deposit, _: &()| deposit.repository_copy_id.is_some(),
            &self.critical_config,
        )
        .await
        .map_err(|err| err.to_string())?;

        match outcome {
            CriticalOutcome::Ok { .. } | CriticalOutcome::PreconditionFailed => Ok(()),
            CriticalOutcome::PostconditionFailed { .. } => Err("failed to link pending repository copy".to_string()),
        }
    }

    /// Advances the deposit to `ACCEPTED`, creating and linking its
    /// RepositoryCopy as `COMPLETE` with `item_url` as the sole external id
    /// and access URL (spec.md:147-148).
    async fn finalize_accepted(&self, item_url: &str) -> Result<(), String> {
        let copy = self
            .store
            .create_repository_copy(RepositoryCopy::new_in_progress(self.ctx.repository.id.clone()))
            .await
            .map_err(|err| err.to_string())?;

        let deposit_outcome = perform::<Deposit, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| deposit.status == DepositStatus::Submitted,
            {
                let copy_id = copy.id.clone();
                move |deposit: &mut Deposit| {
                    deposit.status = DepositStatus::Accepted;
                    deposit.repository_copy_id = Some(copy_id.clone());
                    async {}
                }
            },
            |deposit: &Deposit, _: &()| {
                deposit.status == DepositStatus::Accepted && deposit.repository_copy_id.is_some()
            },
            &self.critical_config,
        )
        .await
        .map_err(|err| err.to_string())?;

        match deposit_outcome {
            CriticalOutcome::Ok { .. } => {}
            CriticalOutcome::PreconditionFailed => {
                debug!("deposit already advanced past SUBMITTED before finalization; leaving as-is");
                return Ok(());
            }
            CriticalOutcome::PostconditionFailed { .. } => {
                return Err("failed to advance deposit to ACCEPTED".to_string());
            }
        }

        self.update_copy_status(&copy.id, CopyStatus::Complete, Some(item_url.to_string())).await
    }

    /// Advances the deposit to `REJECTED`. No RepositoryCopy is created or
    /// linked: a rejected deposit never has one (spec.md:147-148, S4), and
    /// `REJECTED` is terminal so C7 will never revisit it looking for one.
    async fn finalize_rejected(&self) -> Result<(), String> {
        let deposit_outcome = perform::<Deposit, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            self.ctx.deposit_id.clone(),
            |deposit: &Deposit| deposit.status == DepositStatus::Submitted,
            |deposit: &mut Deposit| {
                deposit.status = DepositStatus::Rejected;
                async {}
            },
            |deposit: &Deposit, _: &()| deposit.status == DepositStatus::Rejected,
            &self.critical_config,
        )
        .await
        .map_err(|err| err.to_string())?;

        match deposit_outcome {
            CriticalOutcome::Ok { .. } | CriticalOutcome::PreconditionFailed => Ok(()),
            CriticalOutcome::PostconditionFailed { .. } => Err("failed to advance deposit to REJECTED".to_string()),
        }
    }

    /// Persists a RepositoryCopy's terminal `copy_status`, and — on
    /// acceptance — its sole external id and access URL.
    async fn update_copy_status(&self, copy_id: &ResourceId, copy_status: CopyStatus, item_url: Option<String>) -> Result<(), String> {
        let copy_outcome = perform::<RepositoryCopy, (), _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            copy_id.clone(),
            |_: &RepositoryCopy| true,
            move |copy: &mut RepositoryCopy| {
                copy.copy_status = copy_status;
                if let Some(item_url) = &item_url {
                    copy.external_ids = vec![item_url.clone()];
                    copy.access_url = Some(item_url.clone());
                }
                async {}
            },
            move |copy: &RepositoryCopy, _: &()| copy.copy_status == copy_status,
            &self.critical_config,
        )
        .await
        .map_err(|err| err.to_string())?;

        match copy_outcome {
            CriticalOutcome::Ok { .. } | CriticalOutcome::PreconditionFailed => Ok(()),
            CriticalOutcome::PostconditionFailed { .. } => Err("failed to update repository copy status".to_string()),
        }
    }
}

/// Assembles the package and transports it, returning the response on a
/// physically successful send. Any assembler or transport error collapses
/// into a single string reason — §7's `TransportFailed` is one error kind
/// regardless of which collaborator raised it.
async fn send_package(
    assembler: &dyn Assembler,
    transport: &dyn Transport,
    deposit_submission: &DepositSubmission,
    cfg: &RepositoryConfig,
    transport_options: &TransportOptions,
) -> Result<TransportResponse, String> {
    let package = assembler
        .assemble(deposit_submission, &cfg.assembler_options)
        .await
        .map_err(|err| err.to_string())?;

    let body = package.open();

    with_session(transport, transport_options, move |mut session| async move {
        let result = session.send(body, transport_options).await;
        (session, result)
    })
    .await
    .map_err(|err| err.to_string())
}
