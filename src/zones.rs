//! Zone geometry and per-frame occupancy.

use std::ops::Range;

/// Number of emulated IR sensors across the frame width.
pub const ZONE_COUNT: usize = 6;

/// Column ranges of the six zones for a given frame width.
///
/// Zones 0..4 are `width / 6` columns wide; zone 5 takes the remainder, so the
/// ranges are disjoint and cover every column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneLayout {
    width: u32,
    zone_width: usize,
}

impl ZoneLayout {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            zone_width: width as usize / ZONE_COUNT,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Columns belonging to `zone`. Panics if `zone >= ZONE_COUNT`.
    pub fn columns(&self, zone: usize) -> Range<usize> {
        assert!(zone < ZONE_COUNT, "zone index {} out of range", zone);
        let start = zone * self.zone_width;
        let end = if zone == ZONE_COUNT - 1 {
            self.width as usize
        } else {
            start + self.zone_width
        };
        start..end
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        (0..ZONE_COUNT).map(move |zone| (zone, self.columns(zone)))
    }
}

/// Classifier output for one frame pair: is each zone occupied?
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneOccupancy([bool; ZONE_COUNT]);

impl ZoneOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_occupied(&self, zone: usize) -> bool {
        self.0[zone]
    }

    pub fn set(&mut self, zone: usize, occupied: bool) {
        self.0[zone] = occupied;
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&occupied| occupied)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.0.iter().copied().enumerate()
    }

    pub fn as_array(&self) -> [bool; ZONE_COUNT] {
        self.0
    }
}

impl From<[bool; ZONE_COUNT]> for ZoneOccupancy {
    fn from(zones: [bool; ZONE_COUNT]) -> Self {
        Self(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_every_column() {
        for width in 0..=500u32 {
            let layout = ZoneLayout::new(width);
            let total: usize = layout.iter().map(|(_, cols)| cols.len()).sum();
            assert_eq!(total, width as usize, "width {}", width);
            assert_eq!(
                layout.columns(5).len(),
                (width - 5 * (width / 6)) as usize
            );

            let mut next = 0;
            for (_, cols) in layout.iter() {
                assert_eq!(cols.start, next, "zones must be contiguous");
                next = cols.end;
            }
        }
    }

    #[test]
    fn last_zone_absorbs_remainder() {
        let layout = ZoneLayout::new(125);
        assert_eq!(layout.columns(0), 0..20);
        assert_eq!(layout.columns(4), 80..100);
        assert_eq!(layout.columns(5), 100..125);
    }

    #[test]
    fn narrow_frames_collapse_into_last_zone() {
        let layout = ZoneLayout::new(4);
        for zone in 0..5 {
            assert!(layout.columns(zone).is_empty());
        }
        assert_eq!(layout.columns(5), 0..4);
    }

    #[test]
    fn occupancy_accessors() {
        let mut occ = ZoneOccupancy::new();
        assert!(!occ.any());
        occ.set(3, true);
        assert!(occ.is_occupied(3));
        assert!(occ.any());
        assert_eq!(
            occ.as_array(),
            [false, false, false, true, false, false]
        );
        assert_eq!(ZoneOccupancy::from(occ.as_array()), occ);
    }
}
