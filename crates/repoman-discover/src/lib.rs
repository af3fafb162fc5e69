pub mod pulls;
pub mod reconcile;
pub mod scanner;

use repoman_core::error::RepomanError;
use repoman_core::models::org::OrganizationContext;
use repoman_host::{HostProvider, RepoFilter};

use crate::reconcile::{reconcile, ReconcileResult};
use crate::scanner::scan_local;

/// Scan the local root, list the remote owner, then reconcile.
///
/// The local scan runs first so a bad root fails without touching the network.
pub async fn discover(
    ctx: &OrganizationContext,
    provider: &dyn HostProvider,
    filter: RepoFilter,
) -> Result<ReconcileResult, RepomanError> {
    let local = scan_local(ctx.local_root())?;
    tracing::debug!(count = local.len(), root = %ctx.local_root().display(), "scanned local root");

    let remote = provider.list_repos(ctx.org(), filter).await?;
    tracing::debug!(count = remote.len(), org = ctx.org(), "listed remote repositories");

    let result = reconcile(&local, &remote);
    tracing::info!(
        both = result.both_count(),
        local_only = result.local_only_count(),
        remote_only = result.remote_only_count(),
        "reconciled"
    );
    Ok(result)
}
