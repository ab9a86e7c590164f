/// External connected components of a color mask
///
/// Only outermost shapes are reported. A shape sitting inside the hole of another
/// shape belongs to that outer shape, and holes count toward the outer shape's
/// filled area.
///
/// Two passes:
/// 1. Flood the off-pixels reachable from the image border (4-connected); these
///    are "outside".
/// 2. Everything not outside (on-pixels plus enclosed holes) is labeled with
///    8-connectivity. Each label is one external shape with its interior filled.
use super::color::ColorMask;

/// One external shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// On-pixels plus enclosed holes
    pub filled_area: u64,
    /// On-pixels only
    pub on_pixels: u64,
}

/// Per-pixel labels plus the component table.
///
/// `label_at` returns `Some(i)` for pixels belonging to `components[i]`.
#[derive(Debug, Clone)]
pub struct ComponentMap {
    width: u32,
    labels: Vec<u32>,
    components: Vec<Component>,
}

impl ComponentMap {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn label_at(&self, x: u32, y: u32) -> Option<usize> {
        match self.labels[y as usize * self.width as usize + x as usize] {
            0 => None,
            label => Some(label as usize - 1),
        }
    }
}

const NEIGHBORS_4: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const NEIGHBORS_8: [(i64, i64); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

pub fn external_components(mask: &ColorMask) -> ComponentMap {
    let width = mask.width();
    let height = mask.height();
    let w = width as i64;
    let h = height as i64;
    let on = mask.as_slice();
    let n = on.len();

    if n == 0 {
        return ComponentMap {
            width,
            labels: Vec::new(),
            components: Vec::new(),
        };
    }

    let index = |x: i64, y: i64| (y * w + x) as usize;

    // Pass 1: outside background
    let mut outside = vec![false; n];
    let mut stack: Vec<(i64, i64)> = Vec::new();
    let seed = |x: i64, y: i64, outside: &mut Vec<bool>, stack: &mut Vec<(i64, i64)>| {
        let i = index(x, y);
        if on[i] == 0 && !outside[i] {
            outside[i] = true;
            stack.push((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut outside, &mut stack);
        seed(x, h - 1, &mut outside, &mut stack);
    }
    for y in 0..h {
        seed(0, y, &mut outside, &mut stack);
        seed(w - 1, y, &mut outside, &mut stack);
    }
    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in NEIGHBORS_4 {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            let i = index(nx, ny);
            if on[i] == 0 && !outside[i] {
                outside[i] = true;
                stack.push((nx, ny));
            }
        }
    }

    // Pass 2: label filled shapes
    let mut labels = vec![0u32; n];
    let mut components = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            let start = index(sx, sy);
            if outside[start] || labels[start] != 0 {
                continue;
            }

            let label = components.len() as u32 + 1;
            labels[start] = label;
            stack.push((sx, sy));

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);
            let mut filled_area = 0u64;
            let mut on_pixels = 0u64;

            while let Some((x, y)) = stack.pop() {
                filled_area += 1;
                if on[index(x, y)] != 0 {
                    on_pixels += 1;
                }
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                for (dx, dy) in NEIGHBORS_8 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let i = index(nx, ny);
                    if !outside[i] && labels[i] == 0 {
                        labels[i] = label;
                        stack.push((nx, ny));
                    }
                }
            }

            components.push(Component {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
                filled_area,
                on_pixels,
            });
        }
    }

    ComponentMap {
        width,
        labels,
        components,
    }
}
