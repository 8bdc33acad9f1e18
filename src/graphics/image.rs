use std::iter::{self, Iterator};
use std::mem;

pub struct Image<T: Sized> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Sized + Default> Image<T> {
    pub fn new(width: usize, height: usize) -> Image<T> {
        let total_pixels = width * height;

        Image {
            data: Vec::from_iter(iter::repeat_with(|| T::default()).take(total_pixels)),
            width,
            height,
        }
    }
}

impl<T: Sized + Copy> Image<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Image<T> {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }
}

impl<T: Sized> Image<T> {
    pub fn from_fn<F: FnMut(usize, usize) -> T>(width: usize, height: usize, mut f: F) -> Image<T> {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }

        Image {
            data,
            width,
            height,
        }
    }

    fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            None
        } else {
            Some(y * self.width + x)
        }
    }

    pub fn at<'a>(&'a self, x: usize, y: usize) -> Option<&'a T> {
        self.index_of(x, y).map(|index| &self.data[index])
    }

    pub fn exchange(&mut self, x: usize, y: usize, value: T) -> Option<T> {
        self.index_of(x, y).map(|index| {
            let mut other = value;
            mem::swap(&mut other, &mut self.data[index]);

            other
        })
    }

    /// Nearest-texel fetch with normalized coordinates, clamped to the edge.
    /// Returns None only for an empty image.
    pub fn sample<'a>(&'a self, u: f32, v: f32) -> Option<&'a T> {
        if self.width == 0 || self.height == 0 {
            return None;
        }

        let x = ((u * self.width as f32).floor() as isize).clamp(0, self.width as isize - 1);
        let y = ((v * self.height as f32).floor() as isize).clamp(0, self.height as isize - 1);

        self.at(x as usize, y as usize)
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn coordinates(&self) -> CoordinateIterator {
        CoordinateIterator::new(0, 0, self.width, self.height)
    }
}

pub struct CoordinateIterator {
    pixel_index: usize,

    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl CoordinateIterator {
    pub(crate) fn new(x: usize, y: usize, width: usize, height: usize) -> CoordinateIterator {
        CoordinateIterator {
            pixel_index: 0,
            x,
            y,
            width,
            height,
        }
    }
}

impl Iterator for CoordinateIterator {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let total_pixels = self.width * self.height;
        if self.pixel_index >= total_pixels {
            return None;
        }

        let x = self.x + self.pixel_index % self.width;
        let y = self.y + self.pixel_index / self.width;
        self.pixel_index += 1;

        Some((x, y))
    }
}
