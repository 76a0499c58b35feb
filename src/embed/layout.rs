//! Canvas sizing rules.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Track the container width, optionally keeping the build's aspect ratio.
    Responsive { maintain_aspect_ratio: bool },
    Fixed,
}

impl Sizing {
    pub fn new(responsive: bool, maintain_aspect_ratio: bool) -> Self {
        if responsive {
            Sizing::Responsive {
                maintain_aspect_ratio,
            }
        } else {
            Sizing::Fixed
        }
    }

    /// Rendered canvas size for a container of `container_width` pixels and a
    /// build configured at `width` x `height`.
    pub fn canvas_size(&self, container_width: f64, width: u32, height: u32) -> Size {
        match *self {
            Sizing::Fixed => Size {
                width: width.into(),
                height: height.into(),
            },
            Sizing::Responsive {
                maintain_aspect_ratio: true,
            } if width > 0 => Size {
                width: container_width,
                height: container_width * (f64::from(height) / f64::from(width)),
            },
            Sizing::Responsive { .. } => Size {
                width: container_width,
                height: container_width,
            },
        }
    }
}
