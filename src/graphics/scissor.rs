use super::image::CoordinateIterator;

#[derive(Debug, Clone)]
pub struct Scissor {
    pub x: usize,
    pub y: usize,

    pub width: usize,
    pub height: usize,
}

impl Scissor {
    /// Iterates framebuffer coordinates, not rectangle-local ones.
    pub fn coordinates(&self) -> CoordinateIterator {
        CoordinateIterator::new(self.x, self.y, self.width, self.height)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let x1 = self.x + self.width;
        let y1 = self.y + self.height;

        x >= self.x && x < x1 && y >= self.y && y < y1
    }

    pub fn intersect_with(&self, other: &Scissor) -> Option<Scissor> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);

        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Scissor {
                x: x0,
                y: y0,

                width: x1 - x0,
                height: y1 - y0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_offset_by_origin() {
        let scissor = Scissor {
            x: 2,
            y: 3,
            width: 2,
            height: 1,
        };

        let all: Vec<(usize, usize)> = scissor.coordinates().collect();
        assert_eq!(all, vec![(2, 3), (3, 3)]);
    }

    #[test]
    fn disjoint_rectangles_do_not_intersect() {
        let a = Scissor {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let b = Scissor {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        };

        assert!(a.intersect_with(&b).is_none());
    }

    #[test]
    fn intersection_is_the_overlap() {
        let a = Scissor {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let b = Scissor {
            x: 2,
            y: 1,
            width: 4,
            height: 4,
        };

        let overlap = a.intersect_with(&b).unwrap();
        assert_eq!(overlap.x, 2);
        assert_eq!(overlap.y, 1);
        assert_eq!(overlap.width, 2);
        assert_eq!(overlap.height, 3);
    }
}
