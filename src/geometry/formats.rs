// Standard floppy formats, compiled in as a static lookup table.

use super::Geometry;
use crate::hardware::Encoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskFormat {
    pub name: &'static str,
    pub description: &'static str,
    pub geometry: Geometry,
    pub encoding: Encoding,
}

impl DiskFormat {
    pub fn image_size(&self) -> u64 {
        self.geometry.total_bytes()
    }
}

pub static FORMATS: &[DiskFormat] = &[
    DiskFormat {
        name: "250k-fm",
        description: "8\" SSSD IBM 3740",
        geometry: Geometry::new(77, 1, 26, 128),
        encoding: Encoding::Fm,
    },
    DiskFormat {
        name: "160k",
        description: "5.25\" SSDD 8 sectors",
        geometry: Geometry::new(40, 1, 8, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "180k",
        description: "5.25\" SSDD 9 sectors",
        geometry: Geometry::new(40, 1, 9, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "320k",
        description: "5.25\" DSDD 8 sectors",
        geometry: Geometry::new(40, 2, 8, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "360k",
        description: "5.25\" DSDD 9 sectors",
        geometry: Geometry::new(40, 2, 9, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "1.2m",
        description: "5.25\" DSHD",
        geometry: Geometry::new(80, 2, 15, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "720k",
        description: "3.5\" DSDD",
        geometry: Geometry::new(80, 2, 9, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "1.44m",
        description: "3.5\" DSHD",
        geometry: Geometry::new(80, 2, 18, 512),
        encoding: Encoding::Mfm,
    },
    DiskFormat {
        name: "2.88m",
        description: "3.5\" DSED",
        geometry: Geometry::new(80, 2, 36, 512),
        encoding: Encoding::Mfm,
    },
];

/// Find a format by name, case-insensitively
pub fn find(name: &str) -> Option<&'static DiskFormat> {
    FORMATS.iter().find(|f| f.name.eq_ignore_ascii_case(name.trim()))
}

/// Guess the format of a raw sector image from its size in bytes
pub fn infer_format(image_size: u64) -> Option<&'static DiskFormat> {
    FORMATS.iter().find(|f| f.image_size() == image_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_is_valid() {
        for format in FORMATS {
            assert!(
                format.geometry.validate().is_ok(),
                "{} has an invalid geometry",
                format.name
            );
        }
    }

    #[test]
    fn test_image_sizes_are_unique() {
        let mut sizes: Vec<u64> = FORMATS.iter().map(|f| f.image_size()).collect();
        sizes.sort_unstable();
        sizes.dedup();
        assert_eq!(sizes.len(), FORMATS.len());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let format = find("1.44M").unwrap();
        assert_eq!(format.geometry.total_sectors, 2880);
        assert!(find("5m").is_none());
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(infer_format(737_280).unwrap().name, "720k");
        assert_eq!(infer_format(1_474_560).unwrap().name, "1.44m");
        assert_eq!(infer_format(256_256).unwrap().encoding, Encoding::Fm);
        assert!(infer_format(1_000_000).is_none());
    }
}
