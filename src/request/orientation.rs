use image::DynamicImage;

use super::image::Size;

/// EXIF orientation tag values (1..=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExifOrientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Left,
    RightMirrored,
    Right,
}

impl ExifOrientation {
    pub fn from_tag(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            2 => Some(Self::UpMirrored),
            3 => Some(Self::Down),
            4 => Some(Self::DownMirrored),
            5 => Some(Self::LeftMirrored),
            6 => Some(Self::Left),
            7 => Some(Self::RightMirrored),
            8 => Some(Self::Right),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Left => 6,
            Self::RightMirrored => 7,
            Self::Right => 8,
        }
    }

    /// True for the four orientations that turn the image on its side
    pub fn dimensions_swapped(self) -> bool {
        matches!(
            self,
            Self::LeftMirrored | Self::Left | Self::RightMirrored | Self::Right
        )
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::UpMirrored | Self::DownMirrored | Self::LeftMirrored | Self::RightMirrored
        )
    }

    /// Displayed size of an image whose stored pixels have size `raw`.
    pub fn displayed_size(self, raw: Size) -> Size {
        if self.dimensions_swapped() {
            raw.swapped()
        } else {
            raw
        }
    }

    /// Transform stored pixels so the image displays upright.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Up => image,
            Self::UpMirrored => image.fliph(),
            Self::Down => image.rotate180(),
            Self::DownMirrored => image.flipv(),
            Self::LeftMirrored => image.rotate90().fliph(),
            Self::Left => image.rotate90(),
            Self::RightMirrored => image.rotate270().fliph(),
            Self::Right => image.rotate270(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ExifOrientation; 8] = [
        ExifOrientation::Up,
        ExifOrientation::UpMirrored,
        ExifOrientation::Down,
        ExifOrientation::DownMirrored,
        ExifOrientation::LeftMirrored,
        ExifOrientation::Left,
        ExifOrientation::RightMirrored,
        ExifOrientation::Right,
    ];

    #[test]
    fn test_tag_mapping() {
        for orientation in ALL {
            assert_eq!(ExifOrientation::from_tag(orientation.tag()), Some(orientation));
        }
        assert_eq!(ExifOrientation::from_tag(0), None);
        assert_eq!(ExifOrientation::from_tag(9), None);
    }

    #[test]
    fn test_apply_swaps_dimensions_only_when_rotating() {
        for orientation in ALL {
            let oriented = orientation.apply(DynamicImage::new_rgb8(10, 20));
            let expected = orientation.displayed_size(Size::new(10, 20));
            assert_eq!((oriented.width(), oriented.height()), (expected.width, expected.height));
            assert_eq!(
                oriented.width() == 20,
                orientation.dimensions_swapped(),
                "{orientation:?}"
            );
        }
    }

    #[test]
    fn test_left_rotates_clockwise() {
        // Stored pixels of a "left" image must be turned 90° clockwise to display upright.
        let mut image = image::RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let oriented = ExifOrientation::Left.apply(DynamicImage::ImageRgb8(image)).into_rgb8();

        assert_eq!(oriented.dimensions(), (1, 2));
        assert_eq!(oriented.get_pixel(0, 0), &image::Rgb([255, 0, 0]));
    }
}
