use crate::keys::{KeyColor, KeyRef, KeySet, precedes_black};

pub const BLACK_KEY_WIDTH_RATIO: f32 = 0.6;
pub const BLACK_KEY_HEIGHT_RATIO: f32 = 0.6;

/// Half-open screen rectangle: the right and bottom edges are outside.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KeyRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl KeyRect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) * 0.5
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && x >= self.left
            && x < self.right
            && y >= self.top
            && y < self.bottom
    }
}

#[derive(Clone, Debug, Default)]
pub struct KeyboardLayout {
    white: Vec<KeyRect>,
    black: Vec<KeyRect>,
}

impl KeyboardLayout {
    pub fn white(&self) -> &[KeyRect] {
        &self.white
    }

    pub fn black(&self) -> &[KeyRect] {
        &self.black
    }

    pub fn rect(&self, key: KeyRef) -> Option<&KeyRect> {
        match key.color {
            KeyColor::White => self.white.get(key.slot),
            KeyColor::Black => self.black.get(key.slot),
        }
    }

    /// Black keys sit on top, so they are tested first.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<KeyRef> {
        if let Some(slot) = self.black.iter().position(|rect| rect.contains(x, y)) {
            return Some(KeyRef::black(slot));
        }
        self.white
            .iter()
            .position(|rect| rect.contains(x, y))
            .map(KeyRef::white)
    }
}

pub fn compute_layout(keys: &KeySet, width: f32, height: f32) -> KeyboardLayout {
    let white_count = keys.white_notes().len();
    let black_count = keys.black_notes().len();
    let usable = width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0;
    if !usable || white_count == 0 {
        return KeyboardLayout {
            white: vec![KeyRect::default(); white_count],
            black: vec![KeyRect::default(); black_count],
        };
    }

    let white_width = width / white_count as f32;
    let white: Vec<KeyRect> = (0..white_count)
        .map(|index| {
            KeyRect::new(
                index as f32 * white_width,
                0.0,
                (index + 1) as f32 * white_width,
                height,
            )
        })
        .collect();

    let black_width = white_width * BLACK_KEY_WIDTH_RATIO;
    let black_height = height * BLACK_KEY_HEIGHT_RATIO;
    let mut black: Vec<KeyRect> = keys.white_notes()[..white_count - 1]
        .iter()
        .zip(&white)
        .filter(|(note, _)| precedes_black(**note))
        .map(|(_, rect)| {
            let x = rect.right - black_width / 2.0;
            KeyRect::new(x, 0.0, x + black_width, black_height)
        })
        .take(black_count)
        .collect();
    black.resize(black_count, KeyRect::default());

    KeyboardLayout {
        white,
        black,
    }
}
