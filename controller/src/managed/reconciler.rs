//! The reconcile pass shared by every managed kind.
//!
//! A pass initializes the resource, resolves its references, connects to AWS, observes the external
//! object and then runs at most one of create, update or delete. The outcome is recorded in the
//! `Synced` condition and the status is written back on every pass.
use super::external::{ExternalConnector, ExternalObservation};
use crate::error::{self, ReconcileError, Result};
use crate::options::ControllerOptions;
use crate::references::ResolveReferences;

use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use models::constants::{EKS_GROUP, FINALIZER, TAG_KIND, TAG_NAME, TAG_PROVIDER_CONFIG};
use models::managed::{Condition, Managed, ManagedResourceClient, ManagementAction, ResourceSpec};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// State shared by every reconcile of one controller.
pub struct Context<S, C> {
    pub store: S,
    pub connector: C,
    pub options: ControllerOptions,
}

impl<S, C> Context<S, C> {
    pub fn new(store: S, connector: C, options: ControllerOptions) -> Self {
        Context {
            store,
            connector,
            options,
        }
    }
}

/// The action a pass takes once the external object has been observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NextStep {
    Create,
    Update,
    Delete,
    /// Release the managed resource: the external object is gone or is being orphaned.
    Finalize,
    /// The external object is absent and may not be created.
    Missing,
    /// Nothing to do until the next poll.
    Idle,
}

/// Chooses what to do given the observation and the lifecycle policies of the resource.
pub fn next_step(
    deleting: bool,
    observation: &ExternalObservation,
    spec: &ResourceSpec,
) -> NextStep {
    if deleting {
        return if spec.should_delete_external() && observation.exists {
            NextStep::Delete
        } else {
            NextStep::Finalize
        };
    }
    if !observation.exists {
        return if spec.allows(ManagementAction::Create) {
            NextStep::Create
        } else {
            NextStep::Missing
        };
    }
    if !observation.up_to_date && spec.allows(ManagementAction::Update) {
        return NextStep::Update;
    }
    NextStep::Idle
}

/// The tags every external object carries to trace it back to its managed resource.
pub fn provider_tags<K: Managed>(managed: &K) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            TAG_KIND.to_string(),
            format!("{}.{}", K::kind(&()).to_lowercase(), EKS_GROUP),
        ),
        (TAG_NAME.to_string(), managed.name_any()),
        (
            TAG_PROVIDER_CONFIG.to_string(),
            managed.resource_spec().provider_config_name().to_string(),
        ),
    ])
}

/// Defaults the external name to the object name and merges the provider tags. Returns whether
/// the resource changed.
pub fn initialize<K: Managed>(managed: &mut K) -> bool {
    let mut changed = false;
    if managed.external_name().map_or(true, |name| name.is_empty()) {
        let name = managed.name_any();
        managed.set_external_name(&name);
        changed = true;
    }

    let provider_tags = provider_tags(managed);
    let tags = managed.tags_mut();
    for (key, value) in provider_tags {
        if tags.get(&key) != Some(&value) {
            tags.insert(key, value);
            changed = true;
        }
    }
    changed
}

fn has_finalizer<K: Managed>(managed: &K) -> bool {
    managed.finalizers().iter().any(|f| f == FINALIZER)
}

/// Adds the finalizer if missing and returns whether it was added.
fn add_finalizer<K: Managed>(managed: &mut K) -> bool {
    if has_finalizer(managed) {
        return false;
    }
    managed.finalizers_mut().push(FINALIZER.to_string());
    true
}

fn remove_finalizer<K: Managed>(managed: &mut K) {
    managed.finalizers_mut().retain(|f| f != FINALIZER);
}

/// Persists metadata and spec, keeping the status computed during this pass.
async fn persist<K: Managed, S: ManagedResourceClient>(managed: &mut K, store: &S) -> Result<()> {
    let updated = store
        .update_managed(managed)
        .await
        .context(error::UpdateManagedSnafu)?;
    let local = std::mem::replace(managed, updated);
    managed.copy_status_from(&local);
    Ok(())
}

/// How a pass ended.
enum Outcome {
    Requeue(Action),
    /// The finalizer was removed; the object may no longer exist.
    Released,
}

/// Reconciles one managed resource. Used as the reconcile function of a `kube` `Controller`.
#[instrument(skip(managed, ctx), fields(kind = %K::kind(&()), name = %managed.name_any()), err)]
pub async fn reconcile<K, S, C>(managed: Arc<K>, ctx: Arc<Context<S, C>>) -> Result<Action>
where
    K: Managed + ResolveReferences,
    S: ManagedResourceClient + 'static,
    C: ExternalConnector<K> + 'static,
{
    let mut managed = (*managed).clone();

    match reconcile_managed(&mut managed, &ctx).await {
        Ok(Outcome::Released) => Ok(Action::await_change()),
        Ok(Outcome::Requeue(action)) => {
            managed.set_condition(Condition::reconcile_success());
            ctx.store
                .update_managed_status(&managed)
                .await
                .context(error::UpdateManagedStatusSnafu)?;
            Ok(action)
        }
        Err(err) => {
            managed.set_condition(Condition::reconcile_error(err.to_string()));
            if let Err(status_err) = ctx.store.update_managed_status(&managed).await {
                event!(Level::WARN, error = %status_err, "Unable to record reconcile error");
            }
            Err(err)
        }
    }
}

/// Requeues a failed reconcile after the configured backoff.
pub fn error_policy<K, S, C>(
    managed: Arc<K>,
    error: &ReconcileError,
    ctx: Arc<Context<S, C>>,
) -> Action
where
    K: Managed,
{
    event!(
        Level::WARN,
        kind = %K::kind(&()),
        name = %managed.name_any(),
        %error,
        "Reconcile failed"
    );
    Action::requeue(ctx.options.error_backoff)
}

async fn reconcile_managed<K, S, C>(managed: &mut K, ctx: &Context<S, C>) -> Result<Outcome>
where
    K: Managed + ResolveReferences,
    S: ManagedResourceClient,
    C: ExternalConnector<K>,
{
    let deleting = managed.meta().deletion_timestamp.is_some();

    if deleting {
        if !has_finalizer(managed) {
            return Ok(Outcome::Released);
        }
        managed.set_condition(Condition::deleting());
        if !managed.resource_spec().should_delete_external() {
            event!(Level::INFO, "Orphaning external resource");
            return release(managed, ctx).await;
        }
    } else {
        if initialize(managed) {
            persist(managed, &ctx.store).await?;
        }
        if managed
            .resolve_references(&ctx.store)
            .await
            .context(error::ResolveReferencesSnafu)?
        {
            persist(managed, &ctx.store).await?;
        }
        if add_finalizer(managed) {
            persist(managed, &ctx.store).await?;
        }
    }

    let provider_config_name = managed.resource_spec().provider_config_name().to_string();
    let provider_config = ctx
        .store
        .get_provider_config(&provider_config_name)
        .await
        .context(error::GetProviderConfigSnafu {
            name: provider_config_name,
        })?;
    let external = ctx
        .connector
        .connect(managed, &provider_config)
        .await
        .context(error::ConnectSnafu)?;

    // Observe a copy so late-initialized values are only adopted when the policies permit it.
    let mut observed = managed.clone();
    let observation = external
        .observe(&mut observed)
        .await
        .context(error::ObserveSnafu)?;
    if observation.late_initialized
        && !deleting
        && managed
            .resource_spec()
            .allows(ManagementAction::LateInitialize)
    {
        event!(Level::DEBUG, "Persisting late-initialized spec");
        *managed = observed;
        persist(managed, &ctx.store).await?;
    } else {
        managed.copy_status_from(&observed);
    }

    let step = next_step(deleting, &observation, managed.resource_spec());
    event!(
        Level::DEBUG,
        ?step,
        exists = observation.exists,
        up_to_date = observation.up_to_date,
        "Observed external resource"
    );

    match step {
        NextStep::Delete => {
            external
                .delete(managed)
                .await
                .context(error::DeleteSnafu)?;
            event!(Level::INFO, "Deleting external resource");
            Ok(Outcome::Requeue(Action::requeue(ctx.options.short_wait)))
        }
        NextStep::Finalize => release(managed, ctx).await,
        NextStep::Missing => error::CreateNotPermittedSnafu.fail(),
        NextStep::Create => {
            external
                .create(managed)
                .await
                .context(error::CreateSnafu)?;
            event!(Level::INFO, "Creating external resource");
            Ok(Outcome::Requeue(Action::requeue(ctx.options.short_wait)))
        }
        NextStep::Update => {
            publish_connection_details(managed, &observation, ctx).await?;
            external
                .update(managed)
                .await
                .context(error::UpdateSnafu)?;
            event!(Level::INFO, "Updating external resource");
            Ok(Outcome::Requeue(Action::requeue(ctx.options.short_wait)))
        }
        NextStep::Idle => {
            publish_connection_details(managed, &observation, ctx).await?;
            Ok(Outcome::Requeue(Action::requeue(ctx.options.poll_interval)))
        }
    }
}

async fn publish_connection_details<K, S, C>(
    managed: &K,
    observation: &ExternalObservation,
    ctx: &Context<S, C>,
) -> Result<()>
where
    K: Managed,
    S: ManagedResourceClient,
{
    let target = match &managed.resource_spec().write_connection_secret_to_ref {
        Some(target) if !observation.connection_details.is_empty() => target,
        _ => return Ok(()),
    };
    let owner = match managed.controller_owner_ref(&()) {
        Some(owner) => owner,
        None => {
            event!(Level::WARN, "Managed resource has no uid, not publishing connection details");
            return Ok(());
        }
    };
    ctx.store
        .apply_connection_secret(target, owner, &observation.connection_details)
        .await
        .context(error::PublishConnectionDetailsSnafu)
}

/// Removes the connection secret and the finalizer so the managed resource can go away.
async fn release<K, S, C>(managed: &mut K, ctx: &Context<S, C>) -> Result<Outcome>
where
    K: Managed,
    S: ManagedResourceClient,
{
    if let Some(target) = &managed.resource_spec().write_connection_secret_to_ref {
        ctx.store
            .delete_connection_secret(target)
            .await
            .context(error::UnpublishConnectionDetailsSnafu)?;
    }
    remove_finalizer(managed);
    persist(managed, &ctx.store).await?;
    event!(Level::INFO, "Released managed resource");
    Ok(Outcome::Released)
}
