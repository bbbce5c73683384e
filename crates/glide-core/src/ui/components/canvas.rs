//! Free-form drawing surface that replays queued commands on render.

use alloc::vec::Vec;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Ellipse, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle};

use crate::ui::core::{DisplayObject, ObjectBase, UiContext};

/// One queued drawing operation, in canvas-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Line {
        start: Point,
        end: Point,
        color: Rgb565,
        width: u32,
    },
    Rectangle {
        area: Rectangle,
        fill: Option<Rgb565>,
        stroke: Option<(Rgb565, u32)>,
    },
    Ellipse {
        area: Rectangle,
        fill: Option<Rgb565>,
        stroke: Option<(Rgb565, u32)>,
    },
}

fn shape_style(fill: Option<Rgb565>, stroke: Option<(Rgb565, u32)>) -> PrimitiveStyle<Rgb565> {
    let mut builder = PrimitiveStyleBuilder::new();
    if let Some(color) = fill {
        builder = builder.fill_color(color);
    }
    if let Some((color, width)) = stroke {
        builder = builder.stroke_color(color).stroke_width(width);
    }
    builder.build()
}

/// A canvas never claims touches; it only draws.
pub struct Canvas {
    pub base: ObjectBase,
    commands: Vec<DrawCommand>,
}

impl Canvas {
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            base: ObjectBase::new(name, x, y, width, height),
            commands: Vec::new(),
        }
    }

    pub fn draw_line(&mut self, color: Rgb565, width: u32, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.commands.push(DrawCommand::Line {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
            color,
            width,
        });
    }

    pub fn draw_rectangle(&mut self, area: Rectangle, fill: Option<Rgb565>, stroke: Option<(Rgb565, u32)>) {
        self.commands.push(DrawCommand::Rectangle { area, fill, stroke });
    }

    pub fn draw_ellipse(&mut self, area: Rectangle, fill: Option<Rgb565>, stroke: Option<(Rgb565, u32)>) {
        self.commands.push(DrawCommand::Ellipse { area, fill, stroke });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl DisplayObject for Canvas {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn render(&mut self, ctx: &mut UiContext<'_>) {
        let origin = ctx.resolve(&self.base).top_left;
        let mut target = ctx.target(self.base.alpha);
        for command in self.commands.iter() {
            let Ok(()) = match *command {
                DrawCommand::Line {
                    start,
                    end,
                    color,
                    width,
                } => Line::new(start + origin, end + origin)
                    .into_styled(PrimitiveStyle::with_stroke(color, width))
                    .draw(&mut target),
                DrawCommand::Rectangle { area, fill, stroke } => {
                    Rectangle::new(area.top_left + origin, area.size)
                        .into_styled(shape_style(fill, stroke))
                        .draw(&mut target)
                }
                DrawCommand::Ellipse { area, fill, stroke } => {
                    Ellipse::new(area.top_left + origin, area.size)
                        .into_styled(shape_style(fill, stroke))
                        .draw(&mut target)
                }
            };
        }
    }

    fn dispose(&mut self) {
        self.commands = Vec::new();
    }
}
