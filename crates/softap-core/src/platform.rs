// ── Platform hooks ──

/// The tethering layer that owns the hotspot. The auto-disable timer asks
/// it to tear tethering down instead of stopping the AP directly.
pub trait TetheringControl: Send + Sync {
    fn request_stop(&self);
}

impl<F> TetheringControl for F
where
    F: Fn() + Send + Sync,
{
    fn request_stop(&self) {
        self();
    }
}
