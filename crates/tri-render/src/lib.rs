// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the render loop needs from a backend once it is up.
///
/// Construction is backend specific. Teardown happens on `shutdown` or drop,
/// whichever comes first; calling `shutdown` again is a no-op.
pub trait Renderer {
    /// Runs one acquire/record/submit/present cycle. An error means the frame
    /// was skipped; the renderer stays usable.
    fn render(&mut self) -> Result<()>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn size(&self) -> RenderSize;
    fn shutdown(&mut self);
}
