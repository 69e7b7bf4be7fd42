//! Session: the per-frame driver
//!
//! Owns the simulation, fog, audio engine and collaborators, and runs one
//! frame in a fixed order: background fade, fog recovery, obstacles, ball,
//! trail, ball glow, preview, ripples. Input arrives between frames through
//! `&mut self`.

use glam::Vec2;

use crate::assets::BackgroundLoader;
use crate::audio::{AudioBackend, AudioEngine, HitSound, NoteObserver, TriggerOutcome};
use crate::consts::{
    LINE_ERASE_ALPHA, LINE_HIT_SCORE, POINT_HIT_SCORE, RIPPLE_ERASE_ALPHA, WALL_VOLUME,
};
use crate::fog::FogLayer;
use crate::renderer::scene::{
    ball_vertices, glow_factor, obstacle_vertices, preview_vertices, trail_stamp,
};
use crate::renderer::{Batch, Blend, FramePlan};
use crate::schedule::Timeline;
use crate::score::{ScoreBoard, ScoreService};
use crate::settings::{Settings, Tuning};
use crate::sim::{
    ObstacleId, SimEvent, SimState, Stroke, StrokeOutcome, prune_obstacles, prune_ripples,
    step_ball,
};

/// Delay between the start action and unlocking audio (ms)
const ACTIVATE_DELAY_MS: f64 = 100.0;
/// Drones follow activation after this long (ms)
const DRONE_DELAY_MS: f64 = 100.0;
/// Start message fade-out (ms)
const START_MESSAGE_MS: f64 = 2_000.0;

/// Deferred steps of the start sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    ActivateAudio,
    PlayStartTone,
    StartDrones,
    /// The host should hide the start message
    HideStartMessage,
}

/// Result of one frame
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub plan: FramePlan,
    /// Collisions this frame
    pub events: Vec<SimEvent>,
    /// Start-sequence steps that came due this frame
    pub actions: Vec<SessionAction>,
}

/// The running toy
pub struct Session<B: AudioBackend> {
    pub sim: SimState,
    pub fog: FogLayer,
    audio: AudioEngine<B>,
    score: Box<dyn ScoreService>,
    background: BackgroundLoader,
    timeline: Timeline<SessionAction>,
    stroke: Option<Stroke>,
    settings: Settings,
    started: bool,
}

impl<B: AudioBackend> Session<B> {
    pub fn new(
        canvas: Vec2,
        tuning: Tuning,
        settings: Settings,
        backend: Option<B>,
        seed: u64,
    ) -> Self {
        let fog = FogLayer::new(canvas, tuning.fog_scale, tuning.fog_initial_alpha);
        let mut audio = AudioEngine::new(backend, &tuning, canvas, seed.wrapping_add(1));
        audio.set_volume(settings.effective_volume());
        log::info!(
            "Session {}x{} (seed {}, {} voices)",
            canvas.x,
            canvas.y,
            seed,
            tuning.max_voices
        );
        Self {
            sim: SimState::new(canvas, tuning, seed),
            fog,
            audio,
            score: Box::new(ScoreBoard::new()),
            background: BackgroundLoader::new(),
            timeline: Timeline::new(),
            stroke: None,
            settings,
            started: false,
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.sim.tuning
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Adopt new preferences; the master level follows immediately
    pub fn set_settings(&mut self, settings: Settings) {
        self.audio.set_volume(settings.effective_volume());
        self.settings = settings;
    }

    pub fn audio(&self) -> &AudioEngine<B> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioEngine<B> {
        &mut self.audio
    }

    pub fn set_observer(&mut self, observer: Box<dyn NoteObserver>) {
        self.audio.set_observer(observer);
    }

    pub fn set_score_service(&mut self, score: Box<dyn ScoreService>) {
        self.score = score;
    }

    pub fn score(&self) -> &dyn ScoreService {
        self.score.as_ref()
    }

    pub fn background(&self) -> &BackgroundLoader {
        &self.background
    }

    pub fn background_mut(&mut self) -> &mut BackgroundLoader {
        &mut self.background
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    /// The explicit start action (first user gesture)
    pub fn start(&mut self, now_ms: f64) {
        if self.started {
            return;
        }
        self.started = true;
        self.stroke = None;

        let activate = now_ms + ACTIVATE_DELAY_MS;
        self.timeline.schedule(activate, SessionAction::ActivateAudio);
        self.timeline.schedule(activate, SessionAction::PlayStartTone);
        self.timeline
            .schedule(activate + DRONE_DELAY_MS, SessionAction::StartDrones);
        self.timeline
            .schedule(now_ms + START_MESSAGE_MS, SessionAction::HideStartMessage);
        log::info!("Session started");
    }

    /// Canvas size changed
    pub fn resize(&mut self, canvas: Vec2) {
        self.sim.resize(canvas);
        self.fog.resize(canvas);
        self.audio.resize(canvas);
        self.stroke = None;
    }

    /// Clear the world and score, keep audio running
    pub fn reset(&mut self) {
        self.sim.reset();
        self.fog.reset();
        self.score.reset();
        self.stroke = None;
    }

    pub fn pointer_down(&mut self, pos: Vec2, now_ms: f64) {
        if !self.started {
            return;
        }
        self.stroke = Some(Stroke::begin(pos, now_ms));
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        if let Some(stroke) = self.stroke.as_mut() {
            stroke.extend(pos);
        }
    }

    /// Finish the current stroke; returns the obstacle it created
    pub fn pointer_up(&mut self, now_ms: f64) -> Option<ObstacleId> {
        let stroke = self.stroke.take()?;
        match stroke.finish(now_ms) {
            StrokeOutcome::Marker(center) => {
                let radius = self.sim.tuning.point_radius();
                let id = self.sim.obstacles.add_point(center, radius, now_ms);
                log::debug!("marker {:?} at ({:.0}, {:.0})", id, center.x, center.y);
                Some(id)
            }
            StrokeOutcome::Line { points, start_ms } => {
                let count = points.len();
                let id = self.sim.obstacles.add_line(points, start_ms);
                log::debug!("line {:?} from {} points", id, count);
                id
            }
            StrokeOutcome::Discarded => None,
        }
    }

    /// Run one frame at `now_ms`
    pub fn frame(&mut self, now_ms: f64) -> FrameOutput {
        let actions = self.timeline.drain_due(now_ms);
        for action in &actions {
            self.run_action(*action, now_ms);
        }

        let mut plan = FramePlan {
            background_alpha: self.background.fade_alpha(now_ms),
            ..Default::default()
        };

        let tuning = &self.sim.tuning;
        self.fog.recover(tuning.refog_alpha, tuning.refog_interval);

        self.clear_new_obstacles();
        plan.under_fog.push(Batch {
            blend: Blend::Alpha,
            vertices: obstacle_vertices(&self.sim.obstacles, now_ms, &self.sim.tuning),
        });
        prune_obstacles(&mut self.sim, now_ms);
        self.score.retain(&self.sim.obstacles.live_ids());

        let events = step_ball(&mut self.sim, now_ms);
        for event in &events {
            self.award(event);
            // Silent until the start action
            if self.started {
                self.sound(event, now_ms);
            }
        }
        self.audio.follow_ball(self.sim.ball.pos);

        if self.settings.trails {
            self.clear_trail();
        }

        let glow = glow_factor(now_ms);
        let ball = &self.sim.ball;
        let tuning = &self.sim.tuning;
        plan.under_fog.push(Batch {
            blend: Blend::Additive,
            vertices: ball_vertices(ball, glow, tuning),
        });
        self.fog.clear_circle(
            ball.pos,
            (ball.size + tuning.ball_clear_padding) * glow,
            u8::MAX,
        );

        let preview = self.stroke.as_ref().and_then(Stroke::preview_segment);
        plan.over_fog.push(Batch {
            blend: Blend::Alpha,
            vertices: preview_vertices(preview, tuning),
        });

        self.clear_ripples(now_ms);

        FrameOutput {
            plan,
            events,
            actions,
        }
    }

    fn run_action(&mut self, action: SessionAction, now_ms: f64) {
        log::debug!("{:?}", action);
        match action {
            SessionAction::ActivateAudio => self.audio.activate(),
            SessionAction::PlayStartTone => {
                self.audio.play_start_tone(now_ms);
            }
            SessionAction::StartDrones => self.audio.start_drones(),
            SessionAction::HideStartMessage => {}
        }
    }

    /// One-time fog wipe where new obstacles appeared
    fn clear_new_obstacles(&mut self) {
        let weight = self.sim.tuning.line_main_weight;
        for line in self.sim.obstacles.lines_mut() {
            if line.fog_cleared || line.points.len() < 2 {
                continue;
            }
            let (a, b) = line.endpoints();
            self.fog.clear_stroke(a, b, weight, LINE_ERASE_ALPHA);
            line.fog_cleared = true;
        }

        let radius = self.sim.tuning.point_radius() * 0.5;
        for point in self.sim.obstacles.points_mut() {
            if point.fog_cleared {
                continue;
            }
            self.fog
                .clear_ring(point.center, radius, weight, LINE_ERASE_ALPHA);
            point.fog_cleared = true;
        }
    }

    /// Obstacles pay out once each
    fn award(&mut self, event: &SimEvent) {
        let (id, points) = match event {
            SimEvent::LineHit { id, consecutive, .. } => (*id, LINE_HIT_SCORE * consecutive),
            SimEvent::MarkerHit { id, volume, .. } => {
                (*id, (POINT_HIT_SCORE * volume).round() as u32)
            }
            SimEvent::WallHit { .. } => return,
        };
        if self.score.add(id, points) {
            log::debug!("+{} (total {})", points, self.score.total());
        }
    }

    fn sound(&mut self, event: &SimEvent, now_ms: f64) -> TriggerOutcome {
        match *event {
            SimEvent::WallHit { pos, length } => self.audio.play_hit(
                &HitSound {
                    length,
                    pos,
                    consecutive: 1,
                    age_ms: 0.0,
                    volume: WALL_VOLUME,
                },
                now_ms,
            ),
            SimEvent::LineHit {
                pos,
                length,
                consecutive,
                volume,
                age_ms,
                ..
            } => self.audio.play_hit(
                &HitSound {
                    length,
                    pos,
                    consecutive,
                    age_ms,
                    volume,
                },
                now_ms,
            ),
            SimEvent::MarkerHit { pos, volume, .. } => self.audio.play_marker(pos, volume),
        }
    }

    /// Trail stamps shrink and fade with age (newest last in the buffer)
    fn clear_trail(&mut self) {
        let trail = &self.sim.ball.trail;
        let len = trail.len();
        let size = self.sim.ball.size;
        for (i, pos) in trail.iter().enumerate() {
            let (diameter, alpha) = trail_stamp(len - 1 - i, len, size);
            self.fog.clear_circle(*pos, diameter, alpha.round() as u8);
        }
    }

    fn clear_ripples(&mut self, now_ms: f64) {
        let tuning = &self.sim.tuning;
        let strength = (RIPPLE_ERASE_ALPHA * 255.0).round() as u8;
        for ripple in &self.sim.ripples {
            let radius = ripple.radius(now_ms, tuning.ripple_max_radius);
            self.fog
                .clear_ring(ripple.origin, radius, tuning.ripple_thickness, strength);
        }
        prune_ripples(&mut self.sim, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::audio::RecordingBackend;

    struct CountNotes(Rc<RefCell<usize>>);

    impl NoteObserver for CountNotes {
        fn note_played(&mut self, _name: &str, _length: f32, _freq: f32) {
            *self.0.borrow_mut() += 1;
        }
    }

    fn session() -> Session<RecordingBackend> {
        Session::new(
            Vec2::new(800.0, 600.0),
            Tuning::desktop(),
            Settings::default(),
            Some(RecordingBackend::new()),
            3,
        )
    }

    #[test]
    fn test_strokes_ignored_before_start() {
        let mut s = session();
        s.pointer_down(Vec2::new(100.0, 100.0), 0.0);
        assert!(!s.is_drawing());
        assert_eq!(s.pointer_up(50.0), None);
    }

    #[test]
    fn test_start_sequence_order() {
        let mut s = session();
        s.start(1_000.0);
        s.start(1_050.0);

        assert!(s.frame(1_050.0).actions.is_empty());
        assert_eq!(
            s.frame(1_100.0).actions,
            vec![SessionAction::ActivateAudio, SessionAction::PlayStartTone]
        );
        assert!(s.audio().is_activated());
        assert_eq!(s.frame(1_200.0).actions, vec![SessionAction::StartDrones]);
        assert_eq!(
            s.frame(3_000.0).actions,
            vec![SessionAction::HideStartMessage]
        );
    }

    #[test]
    fn test_new_obstacle_clears_fog_once() {
        let mut s = session();
        s.start(0.0);
        s.sim.obstacles.add_point(Vec2::new(100.0, 100.0), 6.0, 0.0);
        let radius = s.tuning().point_radius() * 0.5;
        let on_ring = Vec2::new(100.0 + radius, 100.0);

        let before = s.fog.alpha_at(on_ring);
        s.frame(16.0);
        let after = s.fog.alpha_at(on_ring);
        assert!(after < before);
        assert!(s.sim.obstacles.points().all(|p| p.fog_cleared));
    }

    #[test]
    fn test_ball_clears_fog_under_it() {
        let mut s = session();
        s.frame(0.0);
        assert!(s.fog.alpha_at(s.sim.ball.pos) < s.tuning().fog_initial_alpha);
    }

    #[test]
    fn test_line_hit_scores_once() {
        let mut s = session();
        s.start(0.0);
        let id = s
            .sim
            .obstacles
            .add_line(vec![Vec2::new(350.0, 320.0), Vec2::new(450.0, 320.0)], 0.0)
            .unwrap();
        s.sim.ball.pos = Vec2::new(400.0, 300.0);
        s.sim.ball.vel = Vec2::new(0.0, 1.5);

        let out = s.frame(16.0);
        assert!(matches!(out.events[0], SimEvent::LineHit { id: hit, .. } if hit == id));
        assert_eq!(s.score().total(), 10);

        s.sim.ball.pos = Vec2::new(400.0, 300.0);
        s.sim.ball.vel = Vec2::new(0.0, 1.5);
        s.frame(32.0);
        assert_eq!(s.score().total(), 10);
    }

    #[test]
    fn test_no_sound_before_start() {
        let mut s = session();
        let notes = Rc::new(RefCell::new(0usize));
        s.set_observer(Box::new(CountNotes(notes.clone())));
        s.sim.ball.pos = Vec2::new(400.0, 300.0);
        s.sim.ball.vel = Vec2::new(1.5, 1.5);

        let mut walls = 0;
        for frame in 0..2_000 {
            let out = s.frame(frame as f64 * 16.0);
            walls += out
                .events
                .iter()
                .filter(|e| matches!(e, SimEvent::WallHit { .. }))
                .count();
        }
        assert!(walls > 0);
        assert_eq!(s.audio().backend().unwrap().started().count(), 0);
        assert_eq!(*notes.borrow(), 0);
    }

    #[test]
    fn test_trails_toggle() {
        let mut s = session();
        s.sim.ball.trail.push_back(Vec2::new(50.0, 50.0));
        s.set_settings(Settings {
            trails: false,
            ..Settings::default()
        });
        s.frame(0.0);
        let untouched = s.fog.alpha_at(Vec2::new(50.0, 550.0));
        assert_eq!(s.fog.alpha_at(Vec2::new(50.0, 50.0)), untouched);
    }
}
