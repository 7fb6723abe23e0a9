//! Image Map: address → owning binary image → friendly library label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::BinaryImage;

/// Bucket a library label falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    SystemLibrary,
    ObjcRuntime,
    Dispatch,
    UiKit,
    CoreFoundation,
    Foundation,
    QuartzCore,
    GraphicsServices,
    DynamicLinker,
    /// Not a recognised platform library; the label is the image basename.
    Other,
}

impl LibraryKind {
    /// Whether this is one of the recognised operating-system buckets.
    pub fn is_platform(&self) -> bool {
        !matches!(self, LibraryKind::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryLabel {
    pub kind: LibraryKind,
    pub name: String,
}

impl LibraryLabel {
    /// Apply the ordered label rules to an image basename; first rule wins.
    pub fn from_basename(base: &str) -> Self {
        let (kind, name) = if base.starts_with("libsystem_") {
            (LibraryKind::SystemLibrary, "libsystem_*")
        } else if base.starts_with("libobjc") {
            (LibraryKind::ObjcRuntime, "libobjc (Obj-C Runtime)")
        } else if base.starts_with("libdispatch") {
            (LibraryKind::Dispatch, "libdispatch (GCD)")
        } else if base.contains("UIKit") {
            (LibraryKind::UiKit, "UIKit")
        } else if base.contains("CoreFoundation") {
            (LibraryKind::CoreFoundation, "CoreFoundation")
        } else if base.contains("Foundation") {
            (LibraryKind::Foundation, "Foundation")
        } else if base.contains("QuartzCore") {
            (LibraryKind::QuartzCore, "QuartzCore")
        } else if base.contains("GraphicsServices") {
            (LibraryKind::GraphicsServices, "GraphicsServices")
        } else if base.to_lowercase().contains("dyld") {
            (LibraryKind::DynamicLinker, "dyld (dynamic linker)")
        } else {
            return Self { kind: LibraryKind::Other, name: base.to_string() };
        };
        Self { kind, name: name.to_string() }
    }
}

impl fmt::Display for LibraryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lookup structure over a report's loaded images.
///
/// Images are kept sorted by base address for binary search. When any two
/// ranges overlap the map scans in declaration order instead, so the first
/// declared image always wins.
#[derive(Debug, Clone)]
pub struct ImageMap<'a> {
    images: &'a [BinaryImage],
    /// Indices into `images` of non-empty images, sorted by `image_addr`.
    sorted: Vec<usize>,
    overlapping: bool,
}

impl<'a> ImageMap<'a> {
    pub fn new(images: &'a [BinaryImage]) -> Self {
        let mut sorted: Vec<usize> =
            (0..images.len()).filter(|&i| images[i].image_size > 0).collect();
        sorted.sort_by_key(|&i| (images[i].image_addr, i));
        let overlapping = sorted.windows(2).any(|pair| {
            let (a, b) = (&images[pair[0]], &images[pair[1]]);
            a.image_addr.saturating_add(a.image_size) > b.image_addr
        });
        Self { images, sorted, overlapping }
    }

    /// The image owning `address`, if any.
    pub fn image_for(&self, address: u64) -> Option<&'a BinaryImage> {
        let images = self.images;
        if self.overlapping {
            return images.iter().find(|img| img.contains(address));
        }
        let pos = self.sorted.partition_point(|&i| images[i].image_addr <= address);
        let candidate = &images[*self.sorted.get(pos.checked_sub(1)?)?];
        candidate.contains(address).then_some(candidate)
    }

    /// Friendly label for the library owning `address`.
    pub fn label_for(&self, address: u64) -> Option<LibraryLabel> {
        self.image_for(address).map(|img| LibraryLabel::from_basename(img.basename()))
    }
}

/// Free-function form of [`ImageMap::label_for`] for one-off lookups.
pub fn image_for(address: u64, images: &[BinaryImage]) -> Option<LibraryLabel> {
    ImageMap::new(images).label_for(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, addr: u64, size: u64) -> BinaryImage {
        BinaryImage { name: name.into(), image_addr: addr, image_size: size, uuid: String::new() }
    }

    #[test]
    fn label_rules_apply_in_order() {
        assert_eq!(LibraryLabel::from_basename("libsystem_kernel.dylib").name, "libsystem_*");
        assert_eq!(LibraryLabel::from_basename("UIKitCore").kind, LibraryKind::UiKit);
        // CoreFoundation must win over the broader Foundation rule.
        assert_eq!(LibraryLabel::from_basename("CoreFoundation").kind, LibraryKind::CoreFoundation);
        assert_eq!(LibraryLabel::from_basename("Foundation").kind, LibraryKind::Foundation);
        assert_eq!(LibraryLabel::from_basename("dyld_sim").kind, LibraryKind::DynamicLinker);
        let other = LibraryLabel::from_basename("MatrixTestApp");
        assert_eq!(other.kind, LibraryKind::Other);
        assert_eq!(other.name, "MatrixTestApp");
    }

    #[test]
    fn sorted_lookup_respects_half_open_ranges() {
        let images = vec![
            image("/usr/lib/libobjc.A.dylib", 0x3000, 0x1000),
            image("/app/MatrixTestApp", 0x1000, 0x1000),
        ];
        let map = ImageMap::new(&images);
        assert_eq!(map.image_for(0x1000).map(|i| i.basename()), Some("MatrixTestApp"));
        assert_eq!(map.image_for(0x1fff).map(|i| i.basename()), Some("MatrixTestApp"));
        assert!(map.image_for(0x2000).is_none());
        assert!(map.image_for(0x0fff).is_none());
        assert_eq!(map.label_for(0x3500).map(|l| l.kind), Some(LibraryKind::ObjcRuntime));
        assert!(map.image_for(0x4000).is_none());
    }

    #[test]
    fn overlapping_ranges_pick_first_declared() {
        let images = vec![image("Second", 0x1800, 0x1000), image("First", 0x1000, 0x1000)];
        let map = ImageMap::new(&images);
        assert_eq!(map.image_for(0x1900).map(|i| i.basename()), Some("Second"));
        assert_eq!(map.image_for(0x1200).map(|i| i.basename()), Some("First"));
    }

    #[test]
    fn zero_sized_images_never_match() {
        let images = vec![image("Empty", 0x1000, 0), image("Real", 0x1000, 0x10)];
        assert_eq!(image_for(0x1000, &images).map(|l| l.name), Some("Real".to_string()));
    }
}
