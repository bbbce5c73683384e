//! The single physical screen surface.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::framebuffer::FrameBuffer;

/// LCD-sized composition surface paired with the display it flushes to.
///
/// Windows never write to the display directly: their surfaces are
/// composited in here and then pushed with [`Screen::flush`] or
/// [`Screen::flush_area`].
pub struct Screen<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    display: D,
    surface: FrameBuffer,
}

impl<D> Screen<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    pub fn new(display: D) -> Self {
        let size = display.bounding_box().size;
        Self {
            display,
            surface: FrameBuffer::new(size),
        }
    }

    /// Size of the physical LCD.
    pub fn size(&self) -> Size {
        self.surface.size()
    }

    pub fn bounds(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size())
    }

    /// Copy `src_area` of a window surface onto the screen at `dest`.
    pub fn compose(&mut self, dest: Point, src: &FrameBuffer, src_area: &Rectangle) {
        self.surface.blit(dest, src, src_area);
    }

    /// Push every changed pixel to the display.
    pub fn flush(&mut self) -> Result<(), D::Error> {
        self.surface.flush(&mut self.display)
    }

    /// Push one rectangle to the display. Off-screen parts are dropped, so
    /// an area entirely outside the LCD never reaches the device.
    pub fn flush_area(&mut self, area: &Rectangle) -> Result<(), D::Error> {
        self.surface.flush_area(&mut self.display, area)
    }

    pub fn surface(&self) -> &FrameBuffer {
        &self.surface
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}
