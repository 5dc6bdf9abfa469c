//! Typed comparison options.
//!
//! Capture framing fields only tell the capture side how a screenshot was
//! taken; the comparison itself reads [`DiffOptions`] alone.

use crate::types::{Rect, Threshold};

/// How the candidate screenshot was (or should be) framed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CaptureOptions {
    /// Clip to the element's bounding box on the page instead of asking the
    /// element for its own screenshot
    pub use_clip: bool,
    /// Extra pixels around the element box; any padding implies clipping
    pub padding: u32,
    /// Capture the full scrollable page
    pub full_page: bool,
    /// Leave the default white background transparent
    pub omit_background: bool,
}

/// Instruction for the capture collaborator
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CaptureFraming {
    /// Screenshot the page, clipped to `rect`
    Clip { rect: Rect, omit_background: bool },
    /// Screenshot the handle itself
    Element {
        full_page: bool,
        omit_background: bool,
    },
}

impl CaptureOptions {
    /// True when the shot is a page clip rather than an element shot
    pub fn needs_clip(&self) -> bool {
        self.use_clip || self.padding > 0
    }

    /// Resolve framing against the element's bounding box
    pub fn framing(&self, bounding_box: Rect) -> CaptureFraming {
        if self.needs_clip() {
            CaptureFraming::Clip {
                rect: bounding_box.inflate(f64::from(self.padding)),
                omit_background: self.omit_background,
            }
        } else {
            CaptureFraming::Element {
                full_page: self.full_page,
                omit_background: self.omit_background,
            }
        }
    }
}

/// Options read by the pixel differ
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct DiffOptions {
    pub threshold: Threshold,
    /// Skip pixels that look like anti-aliasing in either image. Off by
    /// default: every pixel above the threshold counts.
    pub ignore_antialiasing: bool,
}

/// Everything a single snapshot assertion can be configured with
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SnapshotOptions {
    pub use_clip: bool,
    pub padding: u32,
    pub full_page: bool,
    pub omit_background: bool,
    pub threshold: Threshold,
    pub ignore_antialiasing: bool,
}

impl SnapshotOptions {
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_clip(mut self, use_clip: bool) -> Self {
        self.use_clip = use_clip;
        self
    }

    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    pub fn with_omit_background(mut self, omit_background: bool) -> Self {
        self.omit_background = omit_background;
        self
    }

    pub fn with_ignore_antialiasing(mut self, ignore: bool) -> Self {
        self.ignore_antialiasing = ignore;
        self
    }

    pub fn capture(&self) -> CaptureOptions {
        CaptureOptions {
            use_clip: self.use_clip,
            padding: self.padding,
            full_page: self.full_page,
            omit_background: self.omit_background,
        }
    }

    pub fn diff(&self) -> DiffOptions {
        DiffOptions {
            threshold: self.threshold,
            ignore_antialiasing: self.ignore_antialiasing,
        }
    }
}
