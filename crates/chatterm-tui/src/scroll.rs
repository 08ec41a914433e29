//! Scroll position of the message list.
//!
//! Scroll-to-bottom requests are deferred: they are recorded when made and
//! applied in [`ScrollState::after_render`], once the height of the freshly
//! rendered content is known.

/// How a scroll-to-bottom is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    /// Animate towards the bottom over several ticks.
    #[default]
    Smooth,
    /// Jump straight to the bottom.
    Instant,
}

/// Vertical scroll state for a list of wrapped lines.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    /// First visible line.
    offset: u16,
    content_height: u16,
    viewport_height: u16,
    /// Request waiting for the next render.
    pending: Option<ScrollBehavior>,
    /// Smooth scroll in progress.
    animating: bool,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    /// Ask for a scroll to the bottom once the next frame has been rendered.
    pub fn request_scroll_to_bottom(&mut self, behavior: ScrollBehavior) {
        self.pending = Some(behavior);
    }

    /// Record rendered sizes and apply any pending request.
    pub fn after_render(&mut self, content_height: u16, viewport_height: u16) {
        self.content_height = content_height;
        self.viewport_height = viewport_height;
        self.offset = self.offset.min(self.max_offset());

        if let Some(behavior) = self.pending.take() {
            self.scroll_to_bottom(behavior);
        }
    }

    /// Scroll to the bottom of the content measured by the last render.
    pub fn scroll_to_bottom(&mut self, behavior: ScrollBehavior) {
        match behavior {
            ScrollBehavior::Instant => {
                self.offset = self.max_offset();
                self.animating = false;
            }
            ScrollBehavior::Smooth => {
                self.animating = !self.is_at_bottom();
            }
        }
    }

    /// Advance a smooth scroll by one step. Returns true if the offset moved.
    ///
    /// Each step covers a third of the remaining distance (at least one line).
    pub fn tick(&mut self) -> bool {
        if !self.animating {
            return false;
        }
        let max = self.max_offset();
        if self.offset >= max {
            self.animating = false;
            return false;
        }
        let distance = max - self.offset;
        let step = distance.div_ceil(3).max(1);
        self.offset = (self.offset + step).min(max);
        if self.offset >= max {
            self.animating = false;
        }
        true
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.animating = false;
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.animating = false;
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
    }

    pub fn scroll_to_top(&mut self) {
        self.animating = false;
        self.offset = 0;
    }
}
