use super::GridBin;
use crate::config::MaxRectsHeuristic;
use crate::model::GridRect;

/// MaxRects free-list bin on the integer grid. Rectangles are never rotated.
pub struct MaxRectsBin {
    border: GridRect,
    free: Vec<GridRect>,
    used: Vec<GridRect>,
    heuristic: MaxRectsHeuristic,
}

impl MaxRectsBin {
    pub fn new(side: u32, heuristic: MaxRectsHeuristic) -> Self {
        let border = GridRect::new(0, 0, side, side);
        Self {
            border,
            free: vec![border],
            used: Vec::new(),
            heuristic,
        }
    }

    fn right_ex(r: &GridRect) -> u32 {
        r.x + r.w
    }
    fn bottom_ex(r: &GridRect) -> u32 {
        r.y + r.h
    }

    fn intersects(a: &GridRect, b: &GridRect) -> bool {
        !(a.x >= Self::right_ex(b)
            || b.x >= Self::right_ex(a)
            || a.y >= Self::bottom_ex(b)
            || b.y >= Self::bottom_ex(a))
    }

    fn place_rect(&mut self, node: &GridRect) {
        let mut new_free: Vec<GridRect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if Self::intersects(&fr, node) {
                self.free.swap_remove(i);
                Self::split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        self.prune_new_vs_old(&mut new_free);
        Self::prune_within(&mut new_free);
        self.free.extend(new_free);
        self.used.push(*node);
    }

    fn split_free_node(fr: GridRect, node: &GridRect, out: &mut Vec<GridRect>) {
        let fr_x2 = Self::right_ex(&fr);
        let fr_y2 = Self::bottom_ex(&fr);
        let n_x2 = Self::right_ex(node);
        let n_y2 = Self::bottom_ex(node);

        // left
        if node.x > fr.x && node.x < fr_x2 {
            out.push(GridRect::new(fr.x, fr.y, node.x - fr.x, fr.h));
        }
        // right
        if n_x2 < fr_x2 {
            out.push(GridRect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
        }
        // top
        if node.y > fr.y && node.y < fr_y2 {
            out.push(GridRect::new(fr.x, fr.y, fr.w, node.y - fr.y));
        }
        // bottom
        if n_y2 < fr_y2 {
            out.push(GridRect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
        }
    }

    fn prune_new_vs_old(&mut self, new_free: &mut Vec<GridRect>) {
        new_free.retain(|nr| nr.w > 0 && nr.h > 0 && !self.free.iter().any(|of| of.contains(nr)));
        let mut i = 0;
        while i < self.free.len() {
            if new_free.iter().any(|nr| nr.contains(&self.free[i])) {
                self.free.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn prune_within(v: &mut Vec<GridRect>) {
        let mut i = 0;
        while i < v.len() {
            let a = v[i];
            let dominated = v
                .iter()
                .enumerate()
                .any(|(j, b)| j != i && b.contains(&a) && (a != *b || j < i));
            if dominated {
                v.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn score(&self, fr: &GridRect, w: u32, h: u32) -> (i64, i64) {
        let leftover_h = fr.w as i64 - w as i64;
        let leftover_v = fr.h as i64 - h as i64;
        let short_fit = leftover_h.abs().min(leftover_v.abs());
        let long_fit = leftover_h.abs().max(leftover_v.abs());
        let area_fit = fr.w as i64 * fr.h as i64 - w as i64 * h as i64;
        match self.heuristic {
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::BottomLeft => (fr.y as i64 + h as i64, fr.x as i64),
            MaxRectsHeuristic::ContactPoint => {
                let contact = self.contact_point_score(fr.x, fr.y, w, h);
                (-(contact as i64), area_fit)
            }
        }
    }

    fn find_position(&self, w: u32, h: u32) -> Option<GridRect> {
        let mut best: Option<(i64, i64, u32, u32, GridRect)> = None;
        for fr in &self.free {
            if fr.w < w || fr.h < h {
                continue;
            }
            if fr.w == w && fr.h == h {
                return Some(GridRect::new(fr.x, fr.y, w, h));
            }
            let (s1, s2) = self.score(fr, w, h);
            // tie-break: smaller top side, then smaller x
            let top = fr.y.saturating_add(h);
            let key = (s1, s2, top, fr.x);
            let better = match &best {
                None => true,
                Some((b1, b2, bt, bx, _)) => key < (*b1, *b2, *bt, *bx),
            };
            if better {
                best = Some((s1, s2, top, fr.x, GridRect::new(fr.x, fr.y, w, h)));
            }
        }
        best.map(|(.., rect)| rect)
    }

    fn contact_point_score(&self, x: u32, y: u32, w: u32, h: u32) -> u32 {
        let node = GridRect::new(x, y, w, h);
        let mut score = 0u32;
        if node.x == self.border.x {
            score += node.h;
        }
        if node.y == self.border.y {
            score += node.w;
        }
        if Self::right_ex(&node) == Self::right_ex(&self.border) {
            score += node.h;
        }
        if Self::bottom_ex(&node) == Self::bottom_ex(&self.border) {
            score += node.w;
        }
        for u in &self.used {
            if node.x == Self::right_ex(u) || u.x == Self::right_ex(&node) {
                score += overlap_1d(node.y, Self::bottom_ex(&node), u.y, Self::bottom_ex(u));
            }
            if node.y == Self::bottom_ex(u) || u.y == Self::bottom_ex(&node) {
                score += overlap_1d(node.x, Self::right_ex(&node), u.x, Self::right_ex(u));
            }
        }
        score
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    let start = a1.max(b1);
    let end = a2.min(b2);
    end.saturating_sub(start)
}

impl GridBin for MaxRectsBin {
    fn insert(&mut self, w: u32, h: u32) -> Option<GridRect> {
        if w == 0 || h == 0 {
            return None;
        }
        let place = self.find_position(w, h)?;
        self.place_rect(&place);
        Some(place)
    }
}
