//! Navigation Dispatch: open extracted targets in the host's tabs.

use async_trait::async_trait;

use crate::error::{Error, Result, Warning};
use crate::pipeline::NavigationTarget;

/// The browsing contexts the viewer runs in.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Replace the page shown in the current context.
    async fn update_current(&self, url: &str) -> anyhow::Result<()>;

    /// Open `url` in a new background context.
    async fn open_background(&self, url: &str) -> anyhow::Result<()>;
}

/// Open the first target in place and every other one in a new context.
///
/// `search` and `hash` carry over as [`NavigationTarget::url_with`] allows.
/// Remaining targets are opened before the current page is replaced, since
/// replacing it ends the viewer. A refused background open does not stop the
/// others; each one comes back as a [`Warning::Navigation`]. Only a failure to
/// replace the current page is an error.
#[tracing::instrument(skip_all, fields(targets = targets.len()))]
pub async fn dispatch(
    targets: &[NavigationTarget],
    host: &dyn TabHost,
    search: &str,
    hash: &str,
) -> Result<Vec<Warning>> {
    let Some((first, rest)) = targets.split_first() else {
        return Err(Error::NoNavigableContent);
    };

    let mut refused = Vec::new();
    for target in rest {
        let url = target.url_with(search, hash);
        if let Err(e) = host.open_background(&url).await {
            tracing::warn!(unit = %target.unit, error = %e, "Background open refused");
            refused.push(Warning::Navigation {
                url,
                reason: format!("{e:#}"),
            });
        }
    }

    let url = first.url_with(search, hash);
    if let Err(e) = host.update_current(&url).await {
        return Err(Error::Navigation {
            url,
            reason: format!("{e:#}"),
        });
    }
    tracing::debug!(unit = %first.unit, refused = refused.len(), "Dispatched");
    Ok(refused)
}
