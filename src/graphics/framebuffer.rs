use super::image::Image;

fn fill_image<T: Sized + Copy>(attachment: &mut Image<T>, value: T) {
    for (x, y) in attachment.coordinates() {
        attachment.exchange(x, y, value);
    }
}

/// Render target generic over the color texel type, so a geometry pass can
/// write `{normal, position}` records while a lighting pass writes float RGBA.
pub struct Framebuffer<T: Sized + Copy> {
    width: usize,
    height: usize,

    color: Image<T>,
    depth: Option<Image<f32>>,
}

pub struct ClearValue<T> {
    pub color: T,
    pub depth: f32,
}

impl<T: Sized + Copy> Framebuffer<T> {
    pub fn new(width: usize, height: usize, has_depth: bool, background: T) -> Framebuffer<T> {
        Framebuffer {
            width,
            height,

            color: Image::filled(width, height, background),
            depth: match has_depth {
                true => Some(Image::filled(width, height, 1.0)),
                false => None,
            },
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn color_attachment(&self) -> &Image<T> {
        &self.color
    }

    pub fn depth_attachment(&self) -> &Option<Image<f32>> {
        &self.depth
    }

    /// Hands the finished color image to the next pass.
    pub fn into_color(self) -> Image<T> {
        self.color
    }

    pub fn clear(&mut self, value: &ClearValue<T>) {
        fill_image(&mut self.color, value.color);

        if let Some(depth) = &mut self.depth {
            fill_image(depth, value.depth);
        }
    }

    pub fn set_color(&mut self, x: usize, y: usize, value: T) {
        self.color.exchange(x, y, value);
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.depth.as_ref().and_then(|image| image.at(x, y).copied())
    }

    pub fn set_depth(&mut self, x: usize, y: usize, value: f32) {
        if let Some(depth) = &mut self.depth {
            depth.exchange(x, y, value);
        }
    }
}
