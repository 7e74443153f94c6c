use std::collections::HashSet;

use macroquad::input::{Touch, TouchPhase as QuadPhase};
use macroquad::prelude::*;

use crate::contacts::ContactId;

/// Contact id used for the left mouse button.
pub const MOUSE_CONTACT_ID: ContactId = ContactId::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactSample {
    pub id: ContactId,
    pub x: f32,
    pub y: f32,
}

impl ContactSample {
    pub fn new(id: ContactId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TouchBatch {
    pub phase: TouchPhase,
    pub contacts: Vec<ContactSample>,
}

impl TouchBatch {
    pub fn new(phase: TouchPhase, contacts: Vec<ContactSample>) -> Self {
        Self { phase, contacts }
    }

    pub fn cancel() -> Self {
        Self::new(TouchPhase::Cancel, Vec::new())
    }
}

/// Turns per-frame macroquad touch and mouse state into batches.
///
/// macroquad reports one entry per touch id each frame, so a tap that starts
/// and lifts inside a single frame only shows up as `Ended`. Ids seen in
/// earlier frames are kept in `live` to tell those taps apart.
#[derive(Debug, Default)]
pub struct TouchInput {
    live: HashSet<ContactId>,
}

impl TouchInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups one frame of platform touches into batches, in the order
    /// start, move, end. A cancelled touch turns the whole frame into a cancel.
    pub fn touch_batches(&mut self, touches: &[Touch]) -> Vec<TouchBatch> {
        if touches
            .iter()
            .any(|touch| touch.phase == QuadPhase::Cancelled)
        {
            self.live.clear();
            return vec![TouchBatch::cancel()];
        }

        let mut started = Vec::new();
        let mut moved = Vec::new();
        let mut ended = Vec::new();
        for touch in touches {
            let sample = ContactSample::new(touch.id, touch.position.x, touch.position.y);
            match touch.phase {
                QuadPhase::Started => {
                    self.live.insert(touch.id);
                    started.push(sample);
                }
                QuadPhase::Moved | QuadPhase::Stationary => {
                    self.live.insert(touch.id);
                    moved.push(sample);
                }
                QuadPhase::Ended => {
                    if !self.live.remove(&touch.id) {
                        started.push(sample);
                    }
                    ended.push(sample);
                }
                QuadPhase::Cancelled => {}
            }
        }

        [
            (TouchPhase::Start, started),
            (TouchPhase::Move, moved),
            (TouchPhase::End, ended),
        ]
        .into_iter()
        .filter(|(_, contacts)| !contacts.is_empty())
        .map(|(phase, contacts)| TouchBatch::new(phase, contacts))
        .collect()
    }

    /// Reads this frame's touch and mouse state from macroquad.
    pub fn poll(&mut self) -> Vec<TouchBatch> {
        let mut batches = self.touch_batches(&touches());
        let (x, y) = mouse_position();
        batches.extend(mouse_batches(
            vec2(x, y),
            is_mouse_button_pressed(MouseButton::Left),
            is_mouse_button_down(MouseButton::Left),
            is_mouse_button_released(MouseButton::Left),
        ));
        batches
    }
}

/// Maps the left button onto one contact. Pressed and released in the same
/// frame means a click when the button is up again, and a release followed
/// by a new press when it is still down.
pub fn mouse_batches(
    position: Vec2,
    mouse_pressed: bool,
    mouse_down: bool,
    mouse_released: bool,
) -> Vec<TouchBatch> {
    let batch = |phase| {
        TouchBatch::new(
            phase,
            vec![ContactSample::new(MOUSE_CONTACT_ID, position.x, position.y)],
        )
    };
    match (mouse_pressed, mouse_down, mouse_released) {
        (true, false, true) => vec![batch(TouchPhase::Start), batch(TouchPhase::End)],
        (true, true, true) => vec![batch(TouchPhase::End), batch(TouchPhase::Start)],
        (true, _, false) => vec![batch(TouchPhase::Start)],
        (false, _, true) => vec![batch(TouchPhase::End)],
        (false, true, false) => vec![batch(TouchPhase::Move)],
        (false, false, false) => Vec::new(),
    }
}
