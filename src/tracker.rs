use log::{debug, info};

use crate::{
    contacts::{ContactId, ContactTable},
    input::{TouchBatch, TouchPhase},
    keys::{KeyColor, KeyRef, KeySet},
    layout::{KeyboardLayout, compute_layout},
    render::{KeyRenderer, KeyVisual},
    sound::{NotePlayer, StreamId},
};

/// What a touch event did to the keyboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// Some key changed its pressed state, so the host should redraw.
    pub changed: bool,
    /// Contacts that landed on a key. The host forwards these as clicks.
    pub activations: usize,
}

impl Response {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            activations: 0,
        }
    }

    pub fn merge(self, other: Response) -> Self {
        Self {
            changed: self.changed || other.changed,
            activations: self.activations + other.activations,
        }
    }
}

/// Maps touch contacts onto keys and keeps pressed flags and note
/// playback in step with them.
pub struct TouchTracker<P: NotePlayer> {
    keys: KeySet,
    layout: KeyboardLayout,
    white_pressed: Vec<bool>,
    black_pressed: Vec<bool>,
    contacts: ContactTable,
    streams: Vec<Option<StreamId>>,
    player: P,
}

impl<P: NotePlayer> TouchTracker<P> {
    pub fn new(keys: KeySet, player: P) -> Self {
        let white_pressed = vec![false; keys.white_notes().len()];
        let black_pressed = vec![false; keys.black_notes().len()];
        let streams = vec![None; keys.len()];
        Self {
            layout: compute_layout(&keys, 0.0, 0.0),
            keys,
            white_pressed,
            black_pressed,
            contacts: ContactTable::new(),
            streams,
            player,
        }
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn on_size_changed(&mut self, width: f32, height: f32) {
        self.layout = compute_layout(&self.keys, width, height);
        info!("keyboard resized to {width}x{height}");
    }

    pub fn handle(&mut self, batch: &TouchBatch) -> Response {
        match batch.phase {
            TouchPhase::Start => batch.contacts.iter().fold(Response::default(), |acc, c| {
                acc.merge(self.on_contact_start(c.id, c.x, c.y))
            }),
            TouchPhase::Move => batch.contacts.iter().fold(Response::default(), |acc, c| {
                acc.merge(self.on_contact_move(c.id, c.x, c.y))
            }),
            TouchPhase::End => batch
                .contacts
                .iter()
                .fold(Response::default(), |acc, c| acc.merge(self.on_contact_end(c.id))),
            TouchPhase::Cancel => self.on_contacts_cancelled(),
        }
    }

    pub fn on_contact_start(&mut self, id: ContactId, x: f32, y: f32) -> Response {
        let Some(key) = self.layout.hit_test(x, y) else {
            return Response::default();
        };
        let mut changed = false;
        match self.contacts.key_of(id) {
            Some(current) if current == key => return Response::default(),
            Some(_) => changed |= self.release(id),
            None => {}
        }
        changed |= self.press(key, id);
        let activations = usize::from(self.contacts.key_of(id) == Some(key));
        Response {
            changed,
            activations,
        }
    }

    pub fn on_contact_move(&mut self, id: ContactId, x: f32, y: f32) -> Response {
        let Some(current) = self.contacts.key_of(id) else {
            return Response::default();
        };
        let inside = self
            .layout
            .rect(current)
            .is_some_and(|rect| rect.contains(x, y));
        if inside {
            return Response::default();
        }
        let mut changed = self.release(id);
        if let Some(key) = self.layout.hit_test(x, y) {
            changed |= self.press(key, id);
        }
        Response::changed(changed)
    }

    pub fn on_contact_end(&mut self, id: ContactId) -> Response {
        Response::changed(self.release(id))
    }

    pub fn on_contacts_cancelled(&mut self) -> Response {
        let mut changed = false;
        for flag in self
            .white_pressed
            .iter_mut()
            .chain(self.black_pressed.iter_mut())
        {
            changed |= *flag;
            *flag = false;
        }
        self.contacts.clear();
        self.stop_all();
        debug!("touch cancelled, all keys released");
        Response::changed(changed)
    }

    pub fn is_pressed(&self, key: KeyRef) -> bool {
        self.pressed_flag(key).copied().unwrap_or(false)
    }

    pub fn is_note_pressed(&self, note: usize) -> bool {
        self.keys
            .key_for_note(note)
            .is_some_and(|key| self.is_pressed(key))
    }

    pub fn pressed_notes(&self) -> Vec<usize> {
        (0..self.keys.len())
            .filter(|note| self.is_note_pressed(*note))
            .collect()
    }

    pub fn active_stream(&self, note: usize) -> Option<StreamId> {
        self.streams.get(note).copied().flatten()
    }

    /// White keys first so black keys end up on top.
    pub fn draw<R: KeyRenderer>(&self, renderer: &mut R) {
        let layers = [
            (KeyColor::White, self.layout.white(), self.keys.white_notes()),
            (KeyColor::Black, self.layout.black(), self.keys.black_notes()),
        ];
        for (color, rects, notes) in layers {
            for (slot, (rect, note)) in rects.iter().zip(notes).enumerate() {
                renderer.draw_key(&KeyVisual {
                    note: *note,
                    color,
                    rect: *rect,
                    pressed: self.is_pressed(KeyRef { color, slot }),
                });
            }
        }
    }

    fn press(&mut self, key: KeyRef, id: ContactId) -> bool {
        if !self.contacts.bind(id, key) {
            debug!("no free contact slot for contact {id}");
            return false;
        }
        let Some(flag) = self.pressed_flag_mut(key) else {
            return false;
        };
        if *flag {
            return false;
        }
        *flag = true;
        if let Some(note) = self.keys.note(key) {
            debug!("press {} key {note} (contact {id})", key.color.label());
            self.start_note(note);
        }
        true
    }

    fn release(&mut self, id: ContactId) -> bool {
        let Some(key) = self.contacts.unbind(id) else {
            return false;
        };
        if self.contacts.is_held(key) {
            return false;
        }
        let Some(flag) = self.pressed_flag_mut(key) else {
            return false;
        };
        if !*flag {
            return false;
        }
        *flag = false;
        if let Some(note) = self.keys.note(key) {
            debug!("release {} key {note} (contact {id})", key.color.label());
            self.stop_note(note);
        }
        true
    }

    fn start_note(&mut self, note: usize) {
        let Some(stream) = self.player.play(note) else {
            return;
        };
        if let Some(slot) = self.streams.get_mut(note) {
            if let Some(previous) = slot.replace(stream) {
                self.player.stop(previous);
            }
        }
    }

    fn stop_note(&mut self, note: usize) {
        if let Some(stream) = self.streams.get_mut(note).and_then(Option::take) {
            self.player.stop(stream);
        }
    }

    fn stop_all(&mut self) {
        for slot in self.streams.iter_mut() {
            if let Some(stream) = slot.take() {
                self.player.stop(stream);
            }
        }
    }

    fn pressed_flag(&self, key: KeyRef) -> Option<&bool> {
        match key.color {
            KeyColor::White => self.white_pressed.get(key.slot),
            KeyColor::Black => self.black_pressed.get(key.slot),
        }
    }

    fn pressed_flag_mut(&mut self, key: KeyRef) -> Option<&mut bool> {
        match key.color {
            KeyColor::White => self.white_pressed.get_mut(key.slot),
            KeyColor::Black => self.black_pressed.get_mut(key.slot),
        }
    }
}

impl<P: NotePlayer> Drop for TouchTracker<P> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{contacts::MAX_CONTACTS, input::ContactSample, layout::KeyRect};

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Play(usize, StreamId),
        Stop(StreamId),
    }

    /// Records every call; notes listed in `missing` have no loaded sound.
    #[derive(Clone, Default)]
    struct RecordingPlayer {
        calls: Rc<RefCell<Vec<Call>>>,
        missing: Vec<usize>,
        next: u64,
    }

    impl RecordingPlayer {
        fn plays(&self) -> Vec<usize> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    Call::Play(note, _) => Some(*note),
                    Call::Stop(_) => None,
                })
                .collect()
        }

        fn stops(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| matches!(call, Call::Stop(_)))
                .count()
        }
    }

    impl NotePlayer for RecordingPlayer {
        fn play(&mut self, note: usize) -> Option<StreamId> {
            if self.missing.contains(&note) {
                return None;
            }
            self.next += 1;
            let stream = StreamId(self.next);
            self.calls.borrow_mut().push(Call::Play(note, stream));
            Some(stream)
        }

        fn stop(&mut self, stream: StreamId) {
            self.calls.borrow_mut().push(Call::Stop(stream));
        }
    }

    fn tracker() -> TouchTracker<RecordingPlayer> {
        let mut tracker = TouchTracker::new(KeySet::default(), RecordingPlayer::default());
        tracker.on_size_changed(1000.0, 300.0);
        tracker
    }

    fn white_center(tracker: &TouchTracker<RecordingPlayer>, slot: usize) -> (f32, f32) {
        let rect = tracker.layout().white()[slot];
        (rect.center_x(), 250.0)
    }

    fn black_center(tracker: &TouchTracker<RecordingPlayer>, slot: usize) -> (f32, f32) {
        let rect = tracker.layout().black()[slot];
        (rect.center_x(), 50.0)
    }

    #[test]
    fn start_presses_and_plays() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 0);
        let response = tracker.on_contact_start(1, x, y);
        assert_eq!(
            response,
            Response {
                changed: true,
                activations: 1
            }
        );
        assert!(tracker.is_note_pressed(0));
        assert_eq!(tracker.player().plays(), vec![0]);
        assert!(tracker.active_stream(0).is_some());
    }

    #[test]
    fn repeated_start_is_idempotent() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 1);
        tracker.on_contact_start(1, x, y);
        let again = tracker.on_contact_start(1, x + 1.0, y);
        assert_eq!(again, Response::default());
        assert_eq!(tracker.player().plays(), vec![2]);
        assert_eq!(tracker.contacts.len(), 1);
    }

    #[test]
    fn repeated_start_elsewhere_moves_the_contact() {
        let mut tracker = tracker();
        let (ax, ay) = white_center(&tracker, 0);
        let (bx, by) = white_center(&tracker, 1);
        tracker.on_contact_start(1, ax, ay);
        tracker.on_contact_start(1, bx, by);
        assert_eq!(tracker.pressed_notes(), vec![2]);
        assert_eq!(tracker.contacts.len(), 1);
    }

    #[test]
    fn miss_is_ignored() {
        let mut tracker = tracker();
        assert_eq!(tracker.on_contact_start(1, -5.0, 10.0), Response::default());
        assert_eq!(tracker.on_contact_start(1, 500.0, 300.0), Response::default());
        assert!(tracker.pressed_notes().is_empty());
        assert!(tracker.player().calls.borrow().is_empty());
    }

    #[test]
    fn chord_presses_every_key() {
        let mut tracker = tracker();
        let points = [
            white_center(&tracker, 0),
            white_center(&tracker, 2),
            white_center(&tracker, 4),
            black_center(&tracker, 3),
        ];
        for (id, (x, y)) in points.iter().enumerate() {
            tracker.on_contact_start(id as ContactId, *x, *y);
        }
        assert_eq!(tracker.pressed_notes(), vec![0, 4, 7, 8]);
        assert_eq!(tracker.player().plays().len(), 4);
    }

    #[test]
    fn glide_releases_before_pressing() {
        let mut tracker = tracker();
        let (ax, ay) = white_center(&tracker, 0);
        let (bx, by) = white_center(&tracker, 1);
        tracker.on_contact_start(9, ax, ay);
        let response = tracker.on_contact_move(9, bx, by);
        assert!(response.changed);
        assert_eq!(response.activations, 0);

        let calls = tracker.player().calls.borrow().clone();
        let Call::Play(_, first) = calls[0] else {
            panic!("expected play first");
        };
        assert_eq!(calls[1..], [Call::Stop(first), Call::Play(2, StreamId(2))]);
        assert_eq!(tracker.pressed_notes(), vec![2]);
    }

    #[test]
    fn move_within_key_is_a_no_op() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 3);
        tracker.on_contact_start(1, x, y);
        assert_eq!(tracker.on_contact_move(1, x + 2.0, y - 2.0), Response::default());
        assert_eq!(tracker.player().calls.borrow().len(), 1);
    }

    #[test]
    fn white_key_holds_when_sliding_under_black_overlap() {
        let mut tracker = tracker();
        let boundary = tracker.layout().white()[0].right;
        tracker.on_contact_start(1, boundary - 25.0, 250.0);
        tracker.on_contact_move(1, boundary - 5.0, 50.0);
        assert_eq!(tracker.pressed_notes(), vec![0]);
    }

    #[test]
    fn sliding_off_the_keyboard_releases() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 14);
        tracker.on_contact_start(1, x, y);
        let response = tracker.on_contact_move(1, 1200.0, y);
        assert!(response.changed);
        assert!(tracker.pressed_notes().is_empty());
        assert_eq!(tracker.on_contact_move(1, x, y), Response::default());
        assert!(tracker.pressed_notes().is_empty());
    }

    #[test]
    fn untracked_contact_move_is_ignored() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 5);
        assert_eq!(tracker.on_contact_move(42, x, y), Response::default());
        assert!(tracker.pressed_notes().is_empty());
    }

    #[test]
    fn end_releases_and_stops() {
        let mut tracker = tracker();
        let (x, y) = black_center(&tracker, 0);
        tracker.on_contact_start(3, x, y);
        assert!(tracker.is_pressed(KeyRef::black(0)));
        assert!(tracker.on_contact_end(3).changed);
        assert!(!tracker.is_pressed(KeyRef::black(0)));
        assert_eq!(tracker.player().stops(), 1);
        assert_eq!(tracker.active_stream(1), None);
    }

    #[test]
    fn unknown_end_is_ignored() {
        let mut tracker = tracker();
        assert_eq!(tracker.on_contact_end(77), Response::default());
        assert!(tracker.player().calls.borrow().is_empty());
    }

    #[test]
    fn shared_key_stays_down_until_last_contact_lifts() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 2);
        tracker.on_contact_start(1, x, y);
        let second = tracker.on_contact_start(2, x, y);
        assert!(!second.changed);
        assert_eq!(second.activations, 1);
        assert_eq!(tracker.player().plays(), vec![4]);

        assert!(!tracker.on_contact_end(1).changed);
        assert!(tracker.is_note_pressed(4));
        assert!(tracker.on_contact_end(2).changed);
        assert!(!tracker.is_note_pressed(4));
        assert_eq!(tracker.player().stops(), 1);
    }

    #[test]
    fn cancel_clears_everything() {
        let mut tracker = tracker();
        for slot in 0..4 {
            let (x, y) = white_center(&tracker, slot);
            tracker.on_contact_start(slot as ContactId, x, y);
        }
        let (x, y) = black_center(&tracker, 2);
        tracker.on_contact_start(10, x, y);

        assert!(tracker.on_contacts_cancelled().changed);
        assert!(tracker.pressed_notes().is_empty());
        assert!(tracker.contacts.is_empty());
        assert_eq!(tracker.player().stops(), 5);
        assert!((0..25).all(|note| tracker.active_stream(note).is_none()));
        assert_eq!(tracker.on_contacts_cancelled(), Response::default());
    }

    #[test]
    fn black_key_wins_on_overlap() {
        let mut tracker = tracker();
        let boundary = tracker.layout().white()[0].right;
        tracker.on_contact_start(1, boundary - 2.0, 20.0);
        assert_eq!(tracker.pressed_notes(), vec![1]);
    }

    #[test]
    fn missing_sound_still_presses_visually() {
        let player = RecordingPlayer {
            missing: vec![0],
            ..RecordingPlayer::default()
        };
        let mut tracker = TouchTracker::new(KeySet::default(), player);
        tracker.on_size_changed(1000.0, 300.0);
        let (x, y) = white_center(&tracker, 0);
        assert!(tracker.on_contact_start(1, x, y).changed);
        assert!(tracker.is_note_pressed(0));
        assert_eq!(tracker.active_stream(0), None);
        assert!(tracker.on_contact_end(1).changed);
        assert_eq!(tracker.player().stops(), 0);
    }

    #[test]
    fn resize_uses_fresh_geometry() {
        let mut tracker = tracker();
        let old_x = tracker.layout().white()[14].center_x();
        tracker.on_size_changed(500.0, 300.0);
        assert_eq!(tracker.on_contact_start(1, old_x, 250.0), Response::default());
        tracker.on_contact_start(2, 490.0, 250.0);
        assert_eq!(tracker.pressed_notes(), vec![24]);
    }

    #[test]
    fn held_contact_is_checked_against_the_new_geometry() {
        let mut tracker = tracker();
        let (old_x, y) = white_center(&tracker, 14);
        tracker.on_contact_start(1, old_x, y);
        tracker.on_size_changed(500.0, 300.0);
        assert_eq!(tracker.pressed_notes(), vec![24]);

        let response = tracker.on_contact_move(1, old_x, y);
        assert_eq!(response, Response::changed(true));
        assert!(tracker.pressed_notes().is_empty());
        assert_eq!(tracker.player().plays(), vec![24]);
        assert_eq!(tracker.player().stops(), 1);
    }

    #[test]
    fn held_contact_slides_onto_the_key_now_under_it() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 0);
        tracker.on_contact_start(1, x, y);
        tracker.on_size_changed(500.0, 300.0);

        // The old centre is the edge between the first two white keys at 500 wide.
        tracker.on_contact_move(1, x + 5.0, y);
        assert_eq!(tracker.pressed_notes(), vec![2]);
        assert_eq!(tracker.player().plays(), vec![0, 2]);
        assert_eq!(tracker.player().stops(), 1);
    }

    #[test]
    fn held_contact_inside_its_resized_key_is_a_no_op() {
        let mut tracker = tracker();
        let (x, y) = white_center(&tracker, 14);
        tracker.on_contact_start(1, x, y);
        tracker.on_size_changed(500.0, 300.0);

        let (new_x, _) = white_center(&tracker, 14);
        assert_eq!(tracker.on_contact_move(1, new_x, y), Response::default());
        assert_eq!(tracker.pressed_notes(), vec![24]);
        assert_eq!(tracker.player().stops(), 0);
    }

    #[test]
    fn start_beyond_contact_capacity_is_ignored() {
        let mut tracker = tracker();
        for id in 0..MAX_CONTACTS as ContactId {
            let (x, y) = white_center(&tracker, id as usize);
            assert_eq!(tracker.on_contact_start(id, x, y).activations, 1);
        }
        let (x, y) = white_center(&tracker, MAX_CONTACTS);
        let response = tracker.on_contact_start(99, x, y);
        assert_eq!(response, Response::default());
        assert_eq!(tracker.player().plays().len(), MAX_CONTACTS);
        assert_eq!(tracker.pressed_notes().len(), MAX_CONTACTS);
        assert!(!tracker.is_pressed(KeyRef::white(MAX_CONTACTS)));

        // A freed slot is available again.
        tracker.on_contact_end(0);
        assert_eq!(tracker.on_contact_start(99, x, y).activations, 1);
    }

    #[test]
    fn no_hits_before_first_resize() {
        let mut tracker = TouchTracker::new(KeySet::default(), RecordingPlayer::default());
        assert_eq!(tracker.on_contact_start(1, 10.0, 10.0), Response::default());
    }

    #[test]
    fn batches_dispatch_by_phase() {
        let mut tracker = tracker();
        let (ax, ay) = white_center(&tracker, 0);
        let (bx, by) = white_center(&tracker, 6);
        let start = TouchBatch::new(
            TouchPhase::Start,
            vec![ContactSample::new(1, ax, ay), ContactSample::new(2, bx, by)],
        );
        assert_eq!(tracker.handle(&start).activations, 2);
        assert_eq!(tracker.pressed_notes(), vec![0, 11]);

        let end = TouchBatch::new(TouchPhase::End, vec![ContactSample::new(2, bx, by)]);
        assert!(tracker.handle(&end).changed);
        assert_eq!(tracker.pressed_notes(), vec![0]);

        assert!(tracker.handle(&TouchBatch::cancel()).changed);
        assert!(tracker.pressed_notes().is_empty());
    }

    #[test]
    fn drop_stops_active_streams() {
        let player = RecordingPlayer::default();
        let calls = player.calls.clone();
        {
            let mut tracker = TouchTracker::new(KeySet::default(), player);
            tracker.on_size_changed(1000.0, 300.0);
            tracker.on_contact_start(1, 10.0, 250.0);
        }
        assert_eq!(calls.borrow().last(), Some(&Call::Stop(StreamId(1))));
    }

    #[derive(Default)]
    struct RecordingRenderer {
        drawn: Vec<(usize, KeyColor, bool, KeyRect)>,
    }

    impl KeyRenderer for RecordingRenderer {
        fn draw_key(&mut self, key: &KeyVisual) {
            self.drawn.push((key.note, key.color, key.pressed, key.rect));
        }
    }

    #[test]
    fn draw_paints_white_then_black() {
        let mut tracker = tracker();
        let (x, y) = black_center(&tracker, 0);
        tracker.on_contact_start(1, x, y);
        let mut renderer = RecordingRenderer::default();
        tracker.draw(&mut renderer);

        assert_eq!(renderer.drawn.len(), 25);
        assert!(renderer.drawn[..15].iter().all(|key| key.1 == KeyColor::White));
        assert!(renderer.drawn[15..].iter().all(|key| key.1 == KeyColor::Black));
        let pressed: Vec<usize> = renderer
            .drawn
            .iter()
            .filter(|key| key.2)
            .map(|key| key.0)
            .collect();
        assert_eq!(pressed, vec![1]);
        assert_eq!(renderer.drawn[15].3, tracker.layout().black()[0]);
    }
}
