//! The optional Descriptor component.

/// The Descriptor component, kept as an opaque bounds-checked view.
///
/// The runtime does not interpret it; off-card tooling and the stricter
/// dynamic checks may.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorComponent<'a> {
    info: &'a [u8],
}

impl<'a> DescriptorComponent<'a> {
    pub(crate) const fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// The raw info area.
    pub const fn info(&self) -> &'a [u8] {
        self.info
    }
}
