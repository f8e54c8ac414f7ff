//! The applet firewall.

use jcvm_asm::Fault;
use jcvm_types::AppletId;

/// Whether an object owned by `owner` may be touched from `current`.
///
/// This is the whole firewall decision: an object belongs to the context of
/// its creating applet, and only that context dereferences it. The one
/// escape hatch, invoking a Shareable instance across contexts, is decided
/// at the invoke site before any dereference happens.
pub(crate) fn check_access(owner: AppletId, current: AppletId) -> Result<(), Fault> {
    #[cfg(feature = "firewall-checks")]
    if owner != current {
        return Err(Fault::Security);
    }
    #[cfg(not(feature = "firewall-checks"))]
    let _ = (owner, current);
    Ok(())
}

/// Whether touching `owner`'s object from `current` crosses the firewall.
pub(crate) fn is_cross_context(owner: AppletId, current: AppletId) -> bool {
    owner != current
}
