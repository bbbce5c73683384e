//! Static text inside a rectangle.

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::touch::TouchEventArgs;
use crate::ui::core::{DisplayObject, ObjectBase, UiContext};

/// A block of text, vertically centred in its rectangle.
///
/// A text block only takes part in touch dispatch when something listens to
/// its tap channel; otherwise touches fall through to whatever is beneath.
pub struct TextBlock {
    pub base: ObjectBase,
    text: heapless::String<64>,
    pub font: &'static MonoFont<'static>,
    pub font_color: Rgb565,
    pub alignment: Alignment,
    pressed: bool,
}

impl TextBlock {
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32, text: &str) -> Self {
        let mut block = Self {
            base: ObjectBase::new(name, x, y, width, height),
            text: heapless::String::new(),
            font: &FONT_6X10,
            font_color: Rgb565::BLACK,
            alignment: Alignment::Left,
            pressed: false,
        };
        block.set_text(text);
        block
    }

    /// Set the text alignment (Left, Center, or Right).
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_font_color(mut self, color: Rgb565) -> Self {
        self.font_color = color;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text. Anything past 64 bytes is dropped.
    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        for c in text.chars() {
            if self.text.push(c).is_err() {
                break;
            }
        }
    }

    fn wants_touch(&self) -> bool {
        self.base.tap.has_subscribers()
    }
}

impl DisplayObject for TextBlock {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn render(&mut self, ctx: &mut UiContext<'_>) {
        let rect = ctx.resolve(&self.base);
        let y = rect.center().y;
        let x = match self.alignment {
            Alignment::Left => rect.top_left.x,
            Alignment::Center => rect.center().x,
            Alignment::Right => rect.top_left.x + rect.size.width as i32 - 1,
        };
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(Baseline::Middle)
            .build();

        let mut target = ctx.target(self.base.alpha);
        let Ok(_) = Text::with_text_style(
            &self.text,
            Point::new(x, y),
            MonoTextStyle::new(self.font, self.font_color),
            text_style,
        )
        .draw(&mut target);
    }

    fn on_touch_down(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        if self.wants_touch() && ctx.resolve(&self.base).contains(e.point) {
            self.pressed = true;
            e.stop_propagation();
        }
    }

    fn on_touch_up(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        if !self.pressed {
            return;
        }
        self.pressed = false;
        if ctx.resolve(&self.base).contains(e.point) {
            self.base.fire_tap();
            e.stop_propagation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FrameBuffer;
    use crate::ui::core::FlushQueue;
    use alloc::rc::Rc;
    use core::cell::Cell;

    #[test]
    fn test_touch_falls_through_without_listeners() {
        let mut block = TextBlock::new("label", 0, 0, 100, 20, "Hello");
        let mut surface = FrameBuffer::new(Size::new(100, 20));
        let mut flushes = FlushQueue::new();
        let mut ctx = UiContext::new(&mut surface, &mut flushes);

        let mut e = TouchEventArgs::new(Point::new(5, 5));
        block.on_touch_down(&mut e, &mut ctx);
        assert!(e.propagate());

        let tapped = Rc::new(Cell::new(false));
        let flag = tapped.clone();
        block.base.tap.subscribe(move |_| flag.set(true));

        let mut e = TouchEventArgs::new(Point::new(5, 5));
        block.on_touch_down(&mut e, &mut ctx);
        assert!(!e.propagate());
        block.on_touch_up(&mut TouchEventArgs::new(Point::new(6, 6)), &mut ctx);
        assert!(tapped.get());
    }

    #[test]
    fn test_render_draws_text_pixels() {
        let mut block = TextBlock::new("label", 0, 0, 60, 20, "Hi").with_font_color(Rgb565::RED);
        let mut surface = FrameBuffer::new(Size::new(60, 20));
        let mut flushes = FlushQueue::new();
        {
            let mut ctx = UiContext::new(&mut surface, &mut flushes);
            block.render(&mut ctx);
        }
        let red = (0..12)
            .flat_map(|x| (0..20).map(move |y| Point::new(x, y)))
            .filter(|p| surface.pixel(*p) == Some(Rgb565::RED))
            .count();
        assert!(red > 0);
    }
}
