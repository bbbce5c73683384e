//! Push button with a centred label.

use embedded_graphics::mono_font::{MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyleBuilder, RoundedRectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use log::debug;

use crate::touch::TouchEventArgs;
use crate::ui::core::{DisplayObject, ObjectBase, UiContext};
use crate::ui::events::{EventChannel, TapEventArgs};

/// Button state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ButtonState {
    Normal,
    Pressed,
    Disabled,
}

/// Interactive button.
///
/// # Touch Behavior
/// - Down inside: pressed, fires `press`, claims the event
/// - Up inside while pressed: fires `release` then `tap`, claims the event
/// - Up outside while pressed: fires `release` only, lets the event pass
///
/// Disabled buttons keep being drawn (at half opacity) but the container
/// skips them during dispatch.
pub struct Button {
    pub base: ObjectBase,
    label: heapless::String<32>,
    pressed: bool,
    pub fill_color: Rgb565,
    pub pressed_color: Rgb565,
    pub font_color: Rgb565,
    pub border_color: Rgb565,
    border_radius: u32,
    pub press: EventChannel<TapEventArgs>,
    pub release: EventChannel<TapEventArgs>,
}

impl Button {
    /// Create a new button. Labels longer than 32 bytes are truncated.
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32, label: &str) -> Self {
        let mut button = Self {
            base: ObjectBase::new(name, x, y, width, height),
            label: heapless::String::new(),
            pressed: false,
            fill_color: Rgb565::new(24, 48, 24),
            pressed_color: Rgb565::new(10, 40, 28),
            font_color: Rgb565::BLACK,
            border_color: Rgb565::new(12, 24, 12),
            border_radius: 6,
            press: EventChannel::new(),
            release: EventChannel::new(),
        };
        button.set_label(label);
        button
    }

    /// Set the border radius for rounded corners. Default is 6 pixels.
    pub fn with_border_radius(mut self, radius: u32) -> Self {
        self.border_radius = radius;
        self
    }

    pub fn with_colors(mut self, fill: Rgb565, pressed: Rgb565, font: Rgb565) -> Self {
        self.fill_color = fill;
        self.pressed_color = pressed;
        self.font_color = font;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: &str) {
        self.label.clear();
        for c in label.chars() {
            if self.label.push(c).is_err() {
                break;
            }
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    fn state(&self) -> ButtonState {
        if !self.base.enabled {
            ButtonState::Disabled
        } else if self.pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Normal
        }
    }

    fn args(&self) -> TapEventArgs {
        TapEventArgs::new(self.base.id(), &self.base.name)
    }
}

impl DisplayObject for Button {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn render(&mut self, ctx: &mut UiContext<'_>) {
        let rect = ctx.resolve(&self.base);
        let (fill, alpha) = match self.state() {
            ButtonState::Normal => (self.fill_color, self.base.alpha),
            ButtonState::Pressed => (self.pressed_color, self.base.alpha),
            ButtonState::Disabled => (self.fill_color, self.base.alpha / 2),
        };

        let style = PrimitiveStyleBuilder::new()
            .fill_color(fill)
            .stroke_color(self.border_color)
            .stroke_width(1)
            .build();
        let mut target = ctx.target(alpha);

        // Draw button background with rounded corners
        let corner_radius = Size::new(self.border_radius, self.border_radius);
        let Ok(()) = RoundedRectangle::with_equal_corners(rect, corner_radius)
            .into_styled(style)
            .draw(&mut target);

        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        let Ok(_) = Text::with_text_style(
            &self.label,
            rect.center(),
            MonoTextStyle::new(&FONT_6X10, self.font_color),
            text_style,
        )
        .draw(&mut target);
    }

    fn on_touch_down(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        if ctx.resolve(&self.base).contains(e.point) {
            self.pressed = true;
            self.invalidate(ctx);
            let mut args = self.args();
            self.press.emit(&mut args);
            e.stop_propagation();
        }
    }

    fn on_touch_up(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        if !self.pressed {
            return;
        }
        self.pressed = false;
        self.invalidate(ctx);
        let mut args = self.args();
        self.release.emit(&mut args);

        if ctx.resolve(&self.base).contains(e.point) {
            debug!(" Button '{}' tapped", self.base.name);
            self.base.tap.emit(&mut args);
            e.stop_propagation();
        }
    }
}
