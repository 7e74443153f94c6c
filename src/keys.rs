pub const KEY_COUNT: usize = 25;
pub const NOTES_PER_OCTAVE: usize = 12;

const BLACK_PITCH_CLASSES: [usize; 5] = [1, 3, 6, 8, 10];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyColor {
    White,
    Black,
}

impl KeyColor {
    pub fn label(&self) -> &'static str {
        match self {
            KeyColor::White => "white",
            KeyColor::Black => "black",
        }
    }
}

/// A key addressed by its colour and its position among keys of that colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub color: KeyColor,
    pub slot: usize,
}

impl KeyRef {
    pub fn white(slot: usize) -> Self {
        Self {
            color: KeyColor::White,
            slot,
        }
    }

    pub fn black(slot: usize) -> Self {
        Self {
            color: KeyColor::Black,
            slot,
        }
    }
}

pub fn pitch_class(note: usize) -> usize {
    note % NOTES_PER_OCTAVE
}

pub fn is_black(note: usize) -> bool {
    BLACK_PITCH_CLASSES.contains(&pitch_class(note))
}

pub fn color_of(note: usize) -> KeyColor {
    if is_black(note) {
        KeyColor::Black
    } else {
        KeyColor::White
    }
}

/// True for C, D, F, G and A: the white keys followed by a black key.
pub fn precedes_black(note: usize) -> bool {
    matches!(pitch_class(note), 0 | 2 | 5 | 7 | 9)
}

pub fn note_name(note: usize) -> &'static str {
    const NAMES: [&str; NOTES_PER_OCTAVE] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    NAMES[pitch_class(note)]
}

/// Index tables that translate between note numbers and per-colour slots.
#[derive(Clone, Debug)]
pub struct KeySet {
    white_notes: Vec<usize>,
    black_notes: Vec<usize>,
}

impl KeySet {
    pub fn new(count: usize) -> Self {
        let (black_notes, white_notes): (Vec<usize>, Vec<usize>) =
            (0..count).partition(|note| is_black(*note));
        Self {
            white_notes,
            black_notes,
        }
    }

    pub fn len(&self) -> usize {
        self.white_notes.len() + self.black_notes.len()
    }

    pub fn white_notes(&self) -> &[usize] {
        &self.white_notes
    }

    pub fn black_notes(&self) -> &[usize] {
        &self.black_notes
    }

    pub fn note(&self, key: KeyRef) -> Option<usize> {
        match key.color {
            KeyColor::White => self.white_notes.get(key.slot).copied(),
            KeyColor::Black => self.black_notes.get(key.slot).copied(),
        }
    }

    pub fn key_for_note(&self, note: usize) -> Option<KeyRef> {
        let table = match color_of(note) {
            KeyColor::White => &self.white_notes,
            KeyColor::Black => &self.black_notes,
        };
        table
            .iter()
            .position(|candidate| *candidate == note)
            .map(|slot| KeyRef {
                color: color_of(note),
                slot,
            })
    }
}

impl Default for KeySet {
    fn default() -> Self {
        Self::new(KEY_COUNT)
    }
}
