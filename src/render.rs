use macroquad::{prelude::*, text::measure_text};

use crate::{
    keys::{KeyColor, NOTES_PER_OCTAVE, note_name, pitch_class},
    layout::KeyRect,
};

const LABEL_FONT_SIZE: u16 = 22;

const IVORY: Color = Color {
    r: 0.96,
    g: 0.95,
    b: 0.91,
    a: 1.0,
};
const EBONY: Color = Color {
    r: 0.06,
    g: 0.05,
    b: 0.05,
    a: 1.0,
};
const AMBER: Color = Color {
    r: 0.98,
    g: 0.66,
    b: 0.12,
    a: 1.0,
};
const AMBER_DARK: Color = Color {
    r: 0.62,
    g: 0.38,
    b: 0.05,
    a: 1.0,
};
const OUTLINE: Color = Color {
    r: 0.15,
    g: 0.15,
    b: 0.15,
    a: 1.0,
};
pub const BACKGROUND: Color = Color {
    r: 0.02,
    g: 0.02,
    b: 0.02,
    a: 1.0,
};

/// Everything a renderer needs to paint one key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyVisual {
    pub note: usize,
    pub color: KeyColor,
    pub rect: KeyRect,
    pub pressed: bool,
}

pub trait KeyRenderer {
    fn draw_key(&mut self, key: &KeyVisual);
}

/// Paints keys with macroquad shapes. The keyboard fills the window.
pub struct QuadRenderer;

impl KeyRenderer for QuadRenderer {
    fn draw_key(&mut self, key: &KeyVisual) {
        let rect = Rect::new(
            key.rect.left,
            key.rect.top,
            key.rect.width(),
            key.rect.height(),
        );
        if rect.w <= 0.0 || rect.h <= 0.0 {
            return;
        }
        let fill = match (key.color, key.pressed) {
            (KeyColor::White, false) => IVORY,
            (KeyColor::White, true) => AMBER,
            (KeyColor::Black, false) => EBONY,
            (KeyColor::Black, true) => AMBER_DARK,
        };
        draw_rectangle(rect.x, rect.y, rect.w, rect.h, fill);
        draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 2.0, OUTLINE);
        if key.color == KeyColor::White && pitch_class(key.note) == 0 {
            let octave = 2 + key.note / NOTES_PER_OCTAVE;
            draw_label(&format!("{}{octave}", note_name(key.note)), &key.rect);
        }
    }
}

fn draw_label(text: &str, rect: &KeyRect) {
    let measure = measure_text(text, None, LABEL_FONT_SIZE, 1.0);
    let x = rect.center_x() - measure.width * 0.5;
    let y = rect.bottom - measure.height;
    draw_text_ex(
        text,
        x,
        y,
        TextParams {
            font_size: LABEL_FONT_SIZE,
            color: OUTLINE,
            ..Default::default()
        },
    );
}
