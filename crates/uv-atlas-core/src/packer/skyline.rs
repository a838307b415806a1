use super::GridBin;
use crate::config::SkylineHeuristic;
use crate::model::GridRect;

#[derive(Clone, Copy, Debug)]
struct SkylineNode {
    x: u32,
    y: u32,
    w: u32,
}

impl SkylineNode {
    #[inline]
    fn left(&self) -> u32 {
        self.x
    }
    #[inline]
    fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
}

/// Skyline bin on the integer grid. Rectangles are never rotated.
pub struct SkylineBin {
    border: GridRect,
    skylines: Vec<SkylineNode>,
    heuristic: SkylineHeuristic,
}

impl SkylineBin {
    pub fn new(side: u32, heuristic: SkylineHeuristic) -> Self {
        Self {
            border: GridRect::new(0, 0, side, side),
            skylines: vec![SkylineNode { x: 0, y: 0, w: side }],
            heuristic,
        }
    }

    fn can_put(&self, mut i: usize, w: u32, h: u32) -> Option<GridRect> {
        let mut rect = GridRect::new(self.skylines[i].x, 0, w, h);
        let mut width_left = rect.w;
        loop {
            rect.y = rect.y.max(self.skylines[i].y);
            if !self.border.contains(&rect) {
                return None;
            }
            if self.skylines[i].w >= width_left {
                return Some(rect);
            }
            width_left -= self.skylines[i].w;
            i += 1;
            if i >= self.skylines.len() {
                return None;
            }
        }
    }

    fn find_skyline(&self, w: u32, h: u32) -> Option<(usize, GridRect)> {
        match self.heuristic {
            SkylineHeuristic::BottomLeft => self.find_bottom_left(w, h),
            SkylineHeuristic::MinWaste => self.find_min_waste(w, h),
        }
    }

    fn find_bottom_left(&self, w: u32, h: u32) -> Option<(usize, GridRect)> {
        let mut best: Option<(u32, u32, usize, GridRect)> = None;
        for i in 0..self.skylines.len() {
            if let Some(r) = self.can_put(i, w, h) {
                let key = (r.bottom(), self.skylines[i].w);
                if best.is_none_or(|(bb, bw, ..)| key < (bb, bw)) {
                    best = Some((key.0, key.1, i, r));
                }
            }
        }
        best.map(|(.., idx, r)| (idx, r))
    }

    fn wasted_area_for(&self, start: usize, r: &GridRect) -> u64 {
        let mut area: u64 = 0;
        let mut width_left = r.w;
        let mut i = start;
        while width_left > 0 && i < self.skylines.len() {
            let seg = &self.skylines[i];
            let use_w = width_left.min(seg.w);
            if r.y > seg.y {
                area += (r.y - seg.y) as u64 * use_w as u64;
            }
            width_left -= use_w;
            i += 1;
        }
        area
    }

    fn find_min_waste(&self, w: u32, h: u32) -> Option<(usize, GridRect)> {
        let mut best: Option<(u64, u32, usize, GridRect)> = None;
        for i in 0..self.skylines.len() {
            if let Some(r) = self.can_put(i, w, h) {
                let key = (self.wasted_area_for(i, &r), r.bottom());
                if best.is_none_or(|(bw, bb, ..)| key < (bw, bb)) {
                    best = Some((key.0, key.1, i, r));
                }
            }
        }
        best.map(|(.., idx, r)| (idx, r))
    }

    fn split(&mut self, index: usize, rect: &GridRect) {
        // A segment at y == side is full height; can_put rejects it through the border check.
        let skyline = SkylineNode {
            x: rect.x,
            y: rect.y + rect.h,
            w: rect.w,
        };
        debug_assert!(skyline.right() <= self.border.right());

        self.skylines.insert(index, skyline);

        let i = index + 1;
        while i < self.skylines.len() {
            if self.skylines[i - 1].left() > self.skylines[i].left()
                || self.skylines[i].left() > self.skylines[i - 1].right()
            {
                break;
            }
            let shrink = self.skylines[i - 1].right() - self.skylines[i].left() + 1;
            if self.skylines[i].w <= shrink {
                self.skylines.remove(i);
            } else {
                self.skylines[i].x += shrink;
                self.skylines[i].w -= shrink;
                break;
            }
        }
    }

    fn merge(&mut self) {
        let mut i = 1;
        while i < self.skylines.len() {
            if self.skylines[i - 1].y == self.skylines[i].y {
                let w = self.skylines[i].w;
                self.skylines[i - 1].w = self.skylines[i - 1].w.saturating_add(w);
                self.skylines.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

impl GridBin for SkylineBin {
    fn insert(&mut self, w: u32, h: u32) -> Option<GridRect> {
        if w == 0 || h == 0 {
            return None;
        }
        let (i, place) = self.find_skyline(w, h)?;
        self.split(i, &place);
        self.merge();
        Some(place)
    }
}
