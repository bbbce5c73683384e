//! Heap-backed RGB565 surface with per-pixel change detection.
//!
//! Every window renders into one of these instead of the display. The
//! coordinator composites the visible part of a window's surface into the
//! screen surface, and only the rectangular region containing changed
//! pixels is pushed to the hardware display.

use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    /// Expand the dirty region to include the given pixel coordinate.
    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// What is left after the half-open pixel range `x0..x1`, `y0..y1` has
    /// been pushed. The result is still a bounding box, so it only shrinks
    /// when the pushed area spans a whole edge of it.
    fn subtract(self, x0: usize, y0: usize, x1: usize, y1: usize) -> Option<Self> {
        let spans_columns = x0 <= self.min_x && x1 > self.max_x;
        let spans_rows = y0 <= self.min_y && y1 > self.max_y;
        let mut rest = self;

        if spans_columns && spans_rows {
            return None;
        }
        if spans_columns {
            if y0 <= rest.min_y && y1 > rest.min_y {
                rest.min_y = y1;
            } else if y0 <= rest.max_y && y1 > rest.max_y {
                rest.max_y = y0 - 1;
            }
        } else if spans_rows {
            if x0 <= rest.min_x && x1 > rest.min_x {
                rest.min_x = x1;
            } else if x0 <= rest.max_x && x1 > rest.max_x {
                rest.max_x = x0 - 1;
            }
        }
        Some(rest)
    }
}

/// Blend `src` over `dst` with the given opacity (0 = transparent, 255 = opaque).
pub fn blend(src: Rgb565, dst: Rgb565, alpha: u8) -> Rgb565 {
    match alpha {
        255 => src,
        0 => dst,
        a => {
            let a = a as u16;
            let mix = |s: u8, d: u8| ((s as u16 * a + d as u16 * (255 - a) + 127) / 255) as u8;
            Rgb565::new(
                mix(src.r(), dst.r()),
                mix(src.g(), dst.g()),
                mix(src.b(), dst.b()),
            )
        }
    }
}

/// Clip `area` against a surface of `size`, returning pixel index ranges.
fn clip(area: &Rectangle, size: Size) -> Option<(usize, usize, usize, usize)> {
    let bounds = Rectangle::new(Point::zero(), size);
    let visible = area.intersection(&bounds);
    if visible.is_zero_sized() {
        return None;
    }
    let x0 = visible.top_left.x as usize;
    let y0 = visible.top_left.y as usize;
    Some((
        x0,
        y0,
        x0 + visible.size.width as usize,
        y0 + visible.size.height as usize,
    ))
}

/// Off-screen RGB565 surface implementing `DrawTarget<Color = Rgb565>`.
///
/// Drawing outside the surface is clipped. After [`FrameBuffer::release`]
/// the surface has no pixels left and every draw becomes a no-op.
pub struct FrameBuffer {
    size: Size,
    pixels: Vec<Rgb565>,
    dirty: Option<DirtyRect>,
}

impl FrameBuffer {
    /// Allocate a new surface filled with black pixels.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![Rgb565::BLACK; size.width as usize * size.height as usize],
            dirty: None,
        }
    }

    /// Change the surface size, keeping the pixels of the overlapping area.
    pub fn resize(&mut self, size: Size) {
        if size == self.size {
            return;
        }
        let mut pixels = vec![Rgb565::BLACK; size.width as usize * size.height as usize];
        let keep_w = self.size.width.min(size.width) as usize;
        let keep_h = self.size.height.min(size.height) as usize;
        if !self.pixels.is_empty() {
            for y in 0..keep_h {
                let src = y * self.size.width as usize;
                let dst = y * size.width as usize;
                pixels[dst..dst + keep_w].copy_from_slice(&self.pixels[src..src + keep_w]);
            }
        }
        debug!(
            "Resized surface {}x{} -> {}x{}",
            self.size.width, self.size.height, size.width, size.height
        );
        self.size = size;
        self.pixels = pixels;
        self.dirty = None;
    }

    /// Free the pixel storage. Calling this twice is harmless.
    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.size = Size::zero();
        self.dirty = None;
    }

    pub fn is_released(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Read back a single pixel.
    pub fn pixel(&self, point: Point) -> Option<Rgb565> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        let (x, y) = (point.x as usize, point.y as usize);
        if x >= self.size.width as usize || y >= self.size.height as usize {
            return None;
        }
        self.pixels.get(y * self.size.width as usize + x).copied()
    }

    /// Write a single pixel, expanding the dirty rect only if the color changed.
    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb565) {
        let idx = y * self.size.width as usize + x;
        if self.pixels[idx] != color {
            self.pixels[idx] = color;
            match &mut self.dirty {
                Some(rect) => rect.expand(x, y),
                None => self.dirty = Some(DirtyRect::from_point(x, y)),
            }
        }
    }

    #[inline]
    fn blend_pixel(&mut self, x: usize, y: usize, color: Rgb565, alpha: u8) {
        let idx = y * self.size.width as usize + x;
        let blended = blend(color, self.pixels[idx], alpha);
        self.set_pixel(x, y, blended);
    }

    /// Fill `area` with `color` at the given opacity.
    pub fn fill_rect_alpha(&mut self, area: &Rectangle, color: Rgb565, alpha: u8) {
        let Some((x0, y0, x1, y1)) = clip(area, self.size) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_pixel(x, y, color, alpha);
            }
        }
    }

    /// Borrow the surface as a draw target that blends everything drawn
    /// through it at `alpha`.
    pub fn blended(&mut self, alpha: u8) -> Blended<'_> {
        Blended {
            target: self,
            alpha,
        }
    }

    /// Copy `src_area` of `src` so that its top-left corner lands on `dest`.
    pub fn blit(&mut self, dest: Point, src: &FrameBuffer, src_area: &Rectangle) {
        let Some((sx0, sy0, sx1, sy1)) = clip(src_area, src.size) else {
            return;
        };
        // Shift the destination by however much of the source was clipped away.
        let dx = dest.x + (sx0 as i32 - src_area.top_left.x);
        let dy = dest.y + (sy0 as i32 - src_area.top_left.y);
        let w = self.size.width as i32;
        let h = self.size.height as i32;
        let stride = src.size.width as usize;

        for sy in sy0..sy1 {
            let ty = dy + (sy - sy0) as i32;
            if ty < 0 || ty >= h {
                continue;
            }
            for sx in sx0..sx1 {
                let tx = dx + (sx - sx0) as i32;
                if tx < 0 || tx >= w {
                    continue;
                }
                let color = src.pixels[sy * stride + sx];
                self.set_pixel(tx as usize, ty as usize, color);
            }
        }
    }

    /// Scale all of `src` into `dest_area` (nearest neighbour) at `alpha`.
    pub fn draw_stretched(&mut self, dest_area: &Rectangle, src: &FrameBuffer, alpha: u8) {
        self.draw_stretched_within(dest_area, src, alpha, dest_area);
    }

    /// Like [`FrameBuffer::draw_stretched`] but only touches pixels inside `within`.
    pub fn draw_stretched_within(
        &mut self,
        dest_area: &Rectangle,
        src: &FrameBuffer,
        alpha: u8,
        within: &Rectangle,
    ) {
        if src.is_released() || dest_area.is_zero_sized() {
            return;
        }
        let Some((x0, y0, x1, y1)) = clip(&dest_area.intersection(within), self.size) else {
            return;
        };
        let dw = dest_area.size.width as i64;
        let dh = dest_area.size.height as i64;
        let sw = src.size.width as i64;
        let sh = src.size.height as i64;

        for y in y0..y1 {
            let sy = ((y as i64 - dest_area.top_left.y as i64) * sh / dh) as usize;
            for x in x0..x1 {
                let sx = ((x as i64 - dest_area.top_left.x as i64) * sw / dw) as usize;
                let color = src.pixels[sy * sw as usize + sx];
                self.blend_pixel(x, y, color, alpha);
            }
        }
    }

    /// Flush the dirty region to a hardware display, then reset the dirty state.
    ///
    /// Only the bounding rectangle of changed pixels is sent via
    /// `fill_contiguous`. If nothing changed, this is a no-op.
    pub fn flush<D>(&mut self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let Some(rect) = self.dirty.take() else {
            return Ok(());
        };

        let width = rect.max_x - rect.min_x + 1;
        let height = rect.max_y - rect.min_y + 1;

        debug!(
            "Flushing {}x{} dirty region at ({}, {})",
            width, height, rect.min_x, rect.min_y
        );

        let area = Rectangle::new(
            Point::new(rect.min_x as i32, rect.min_y as i32),
            Size::new(width as u32, height as u32),
        );
        self.push(display, &area)
    }

    /// Push one rectangle of the surface to the display regardless of
    /// whether it changed. The rectangle is clipped to the surface, and the
    /// pushed pixels no longer count as dirty.
    pub fn flush_area<D>(&mut self, display: &mut D, area: &Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let Some((x0, y0, x1, y1)) = clip(area, self.size) else {
            return Ok(());
        };
        let area = Rectangle::new(
            Point::new(x0 as i32, y0 as i32),
            Size::new((x1 - x0) as u32, (y1 - y0) as u32),
        );
        debug!(
            "Flushing {}x{} area at ({}, {})",
            area.size.width, area.size.height, area.top_left.x, area.top_left.y
        );
        self.push(display, &area)?;
        self.dirty = self.dirty.and_then(|dirty| dirty.subtract(x0, y0, x1, y1));
        Ok(())
    }

    fn push<D>(&self, display: &mut D, area: &Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let pixels = &self.pixels;
        let stride = self.size.width as usize;
        let min_x = area.top_left.x as usize;
        let width = area.size.width as usize;
        let min_y = area.top_left.y as usize;
        let max_y = min_y + area.size.height as usize;
        let pixel_iter = (min_y..max_y).flat_map(move |y| {
            let row_start = y * stride + min_x;
            pixels[row_start..row_start + width].iter().copied()
        });

        display.fill_contiguous(area, pixel_iter)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.size.width as i32;
        let h = self.size.height as i32;

        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && coord.x < w && coord.y < h {
                self.set_pixel(coord.x as usize, coord.y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let w = self.size.width as i32;
        let h = self.size.height as i32;

        let mut colors = colors.into_iter();
        for row in 0..area.size.height as i32 {
            let y = area.top_left.y + row;
            for col in 0..area.size.width as i32 {
                let x = area.top_left.x + col;
                if let Some(color) = colors.next()
                    && x >= 0
                    && y >= 0
                    && x < w
                    && y < h
                {
                    self.set_pixel(x as usize, y as usize, color);
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        if let Some((x0, y0, x1, y1)) = clip(area, self.size) {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.set_pixel(x, y, color);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let area = Rectangle::new(Point::zero(), self.size);
        self.fill_solid(&area, color)
    }
}

/// Draw target adapter that alpha-blends every pixel onto a [`FrameBuffer`].
pub struct Blended<'a> {
    target: &'a mut FrameBuffer,
    alpha: u8,
}

impl OriginDimensions for Blended<'_> {
    fn size(&self) -> Size {
        self.target.size
    }
}

impl DrawTarget for Blended<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        if self.alpha == 255 {
            return self.target.draw_iter(pixels);
        }
        let w = self.target.size.width as i32;
        let h = self.target.size.height as i32;
        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && coord.x < w && coord.y < h {
                self.target
                    .blend_pixel(coord.x as usize, coord.y as usize, color, self.alpha);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        self.target.fill_rect_alpha(area, color, self.alpha);
        Ok(())
    }
}
