//! Web Audio backend
//!
//! Graph, built once:
//!
//! ```text
//! voice: osc -> gain -> panner -> input
//! input -> dry ----------------------------+
//! input -> delay (<-> feedback) -> mix ----+-> pre_fx -> reverb -> wet -> bus pan -> master
//! input -> chorus delay (LFO) -> mix ------+
//! drone: osc -> gain -> panner ------------------------------------------------------> master
//! master -> limiter -> destination
//! ```

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use web_sys::{
    AudioBuffer, AudioContext, AudioContextState, AudioNode, AudioParam, ConvolverNode, DelayNode,
    DynamicsCompressorNode, GainNode, OscillatorNode, OscillatorType, StereoPannerNode,
};

use super::backend::{AudioBackend, AudioError, BusParams, DronePan, DroneSpec};
use super::voice::{Curve, Envelope, SILENCE, VoiceId, VoiceSpec};
use crate::settings::Tuning;

const DRY_LEVEL: f32 = 0.5;
const CHORUS_DELAY: f32 = 0.0035;
const CHORUS_DEPTH: f32 = 0.0035;
const REVERB_LEVEL: f32 = 1.0;
/// Smoothing time constant for bus parameter changes (seconds)
const BUS_SMOOTHING: f64 = 0.05;
/// Fade applied when a voice is cut short (seconds)
const STEAL_FADE: f64 = 0.015;

fn node_err(node: &'static str) -> impl FnOnce(wasm_bindgen::JsValue) -> AudioError {
    move |e| AudioError::Node {
        node,
        detail: format!("{:?}", e),
    }
}

fn create_gain(
    ctx: &AudioContext,
    value: f32,
    label: &'static str,
) -> Result<GainNode, AudioError> {
    let g = GainNode::new(ctx).map_err(node_err(label))?;
    g.gain().set_value(value);
    Ok(g)
}

fn create_panner(
    ctx: &AudioContext,
    pan: f32,
    label: &'static str,
) -> Result<StereoPannerNode, AudioError> {
    let p = StereoPannerNode::new(ctx).map_err(node_err(label))?;
    p.pan().set_value(pan.clamp(-1.0, 1.0));
    Ok(p)
}

fn connect(
    from: &AudioNode,
    to: &AudioNode,
    names: (&'static str, &'static str),
) -> Result<(), AudioError> {
    from.connect_with_audio_node(to)
        .map(|_| ())
        .map_err(|_| AudioError::Connect {
            from: names.0,
            to: names.1,
        })
}

/// Apply envelope steps to a parameter, offset by `start`
fn schedule(param: &AudioParam, envelope: &Envelope, start: f64) {
    for s in &envelope.steps {
        let t = start + s.at;
        let res = match s.curve {
            Curve::Set => param.set_value_at_time(s.value, t),
            Curve::Linear => param.linear_ramp_to_value_at_time(s.value, t),
            Curve::Exponential => {
                param.exponential_ramp_to_value_at_time(s.value.max(SILENCE * 0.1), t)
            }
        };
        if let Err(e) = res {
            log::debug!("Automation step at {:.3}s rejected: {:?}", t, e);
        }
    }
}

fn glide(param: &AudioParam, value: f32, now: f64) {
    param.set_target_at_time(value, now, BUS_SMOOTHING).ok();
}

/// Procedural stereo reverb tail: noise under a squared linear decay
fn impulse_response(ctx: &AudioContext, seconds: f32) -> Result<AudioBuffer, AudioError> {
    let sr = ctx.sample_rate();
    let len = ((sr * seconds) as u32).max(1);
    let ir = ctx.create_buffer(2, len, sr).map_err(node_err("impulse buffer"))?;
    let mut rng = Pcg32::seed_from_u64(0x6c61_7373);
    for ch in 0..2 {
        let mut buf: Vec<f32> = (0..len)
            .map(|i| {
                let decay = 1.0 - i as f32 / len as f32;
                rng.random_range(-1.0f32..=1.0) * decay * decay
            })
            .collect();
        ir.copy_to_channel(&mut buf, ch as i32)
            .map_err(node_err("impulse channel"))?;
    }
    Ok(ir)
}

struct Voice {
    osc: OscillatorNode,
    gain: GainNode,
}

struct Drone {
    // Held so the nodes stay alive with the context
    _osc: OscillatorNode,
    _gain: GainNode,
    panner: StereoPannerNode,
}

/// Web Audio implementation of [`AudioBackend`]
pub struct WebAudioBackend {
    ctx: AudioContext,
    input: GainNode,
    delay: DelayNode,
    delay_mix: GainNode,
    delay_feedback: GainNode,
    chorus_lfo: OscillatorNode,
    bus_panner: StereoPannerNode,
    master: GainNode,
    voices: HashMap<VoiceId, Voice>,
    drones: Vec<Drone>,
}

impl WebAudioBackend {
    /// Create the context and build the shared bus
    pub fn new(tuning: &Tuning) -> Result<Self, AudioError> {
        let ctx = AudioContext::new().map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;

        let input = create_gain(&ctx, 1.0, "input")?;
        let dry = create_gain(&ctx, DRY_LEVEL, "dry")?;
        let pre_fx = create_gain(&ctx, 1.0, "pre-fx")?;

        // Echo with feedback loop
        let delay = ctx
            .create_delay_with_max_delay_time(1.0)
            .map_err(node_err("delay"))?;
        delay.delay_time().set_value(tuning.delay_time_range.0);
        let delay_mix = create_gain(&ctx, tuning.delay_mix_range.0, "delay mix")?;
        let delay_feedback = create_gain(&ctx, tuning.delay_feedback_range.0, "delay feedback")?;

        // Chorus: short delay wobbled by an LFO
        let chorus = ctx
            .create_delay_with_max_delay_time(0.05)
            .map_err(node_err("chorus delay"))?;
        chorus.delay_time().set_value(CHORUS_DELAY);
        let chorus_mix = create_gain(&ctx, tuning.chorus_mix, "chorus mix")?;
        let chorus_lfo = OscillatorNode::new(&ctx).map_err(node_err("chorus lfo"))?;
        chorus_lfo.set_type(OscillatorType::Sine);
        chorus_lfo.frequency().set_value(1.0);
        let chorus_depth = create_gain(&ctx, CHORUS_DEPTH, "chorus depth")?;

        let reverb = ConvolverNode::new(&ctx).map_err(node_err("reverb"))?;
        reverb.set_normalize(true);
        reverb.set_buffer(Some(&impulse_response(&ctx, tuning.reverb_seconds)?));
        let reverb_gain = create_gain(&ctx, REVERB_LEVEL, "reverb gain")?;
        let bus_panner = create_panner(&ctx, 0.0, "bus panner")?;

        let master = create_gain(&ctx, 0.0, "master")?;
        let limiter = DynamicsCompressorNode::new(&ctx).map_err(node_err("limiter"))?;
        limiter.threshold().set_value(-3.0);
        limiter.knee().set_value(1.0);
        limiter.ratio().set_value(12.0);
        limiter.attack().set_value(0.002);
        limiter.release().set_value(0.02);

        connect(&input, &dry, ("input", "dry"))?;
        connect(&dry, &pre_fx, ("dry", "pre-fx"))?;
        connect(&input, &delay, ("input", "delay"))?;
        connect(&delay, &delay_feedback, ("delay", "feedback"))?;
        connect(&delay_feedback, &delay, ("feedback", "delay"))?;
        connect(&delay, &delay_mix, ("delay", "delay mix"))?;
        connect(&delay_mix, &pre_fx, ("delay mix", "pre-fx"))?;
        connect(&input, &chorus, ("input", "chorus"))?;
        connect(&chorus, &chorus_mix, ("chorus", "chorus mix"))?;
        connect(&chorus_mix, &pre_fx, ("chorus mix", "pre-fx"))?;
        connect(&chorus_lfo, &chorus_depth, ("lfo", "depth"))?;
        chorus_depth
            .connect_with_audio_param(&chorus.delay_time())
            .map_err(|_| AudioError::Connect {
                from: "depth",
                to: "chorus time",
            })?;
        connect(&pre_fx, &reverb, ("pre-fx", "reverb"))?;
        connect(&reverb, &reverb_gain, ("reverb", "reverb gain"))?;
        connect(&reverb_gain, &bus_panner, ("reverb gain", "bus panner"))?;
        connect(&bus_panner, &master, ("bus panner", "master"))?;
        connect(&master, &limiter, ("master", "limiter"))?;
        connect(&limiter, &ctx.destination(), ("limiter", "destination"))?;

        chorus_lfo.start().map_err(node_err("chorus lfo start"))?;

        log::info!(
            "Audio bus ready ({} Hz, {:.0}s reverb)",
            ctx.sample_rate(),
            tuning.reverb_seconds
        );

        Ok(Self {
            ctx,
            input,
            delay,
            delay_mix,
            delay_feedback,
            chorus_lfo,
            bus_panner,
            master,
            voices: HashMap::new(),
            drones: Vec::new(),
        })
    }

    fn build_voice(&self, voice: &VoiceSpec) -> Result<Voice, AudioError> {
        let osc = OscillatorNode::new(&self.ctx).map_err(node_err("voice osc"))?;
        osc.set_type(OscillatorType::Sine);
        osc.frequency().set_value(voice.freq);
        let gain = create_gain(&self.ctx, 0.0, "voice gain")?;
        let panner = create_panner(&self.ctx, voice.pan, "voice panner")?;

        connect(&osc, &gain, ("voice osc", "voice gain"))?;
        connect(&gain, &panner, ("voice gain", "voice panner"))?;
        connect(&panner, &self.input, ("voice panner", "input"))?;

        schedule(&gain.gain(), &voice.envelope, voice.start_at);
        osc.start_with_when(voice.start_at)
            .map_err(node_err("voice start"))?;
        if let Some(end) = voice.ends_at() {
            osc.stop_with_when(end).ok();
        }
        Ok(Voice { osc, gain })
    }
}

impl AudioBackend for WebAudioBackend {
    fn now(&self) -> f64 {
        self.ctx.current_time()
    }

    fn is_running(&self) -> bool {
        self.ctx.state() == AudioContextState::Running
    }

    fn resume(&mut self) {
        if self.ctx.state() != AudioContextState::Suspended {
            return;
        }
        match self.ctx.resume() {
            Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = wasm_bindgen_futures::JsFuture::from(promise).await {
                    log::warn!("Audio resume rejected: {:?}", e);
                }
            }),
            Err(e) => log::warn!("Audio resume failed: {:?}", e),
        }
    }

    fn start_voice(&mut self, voice: &VoiceSpec) -> Result<(), AudioError> {
        let built = self.build_voice(voice)?;
        self.voices.insert(voice.id, built);
        Ok(())
    }

    fn stop_voice(&mut self, id: VoiceId, at: f64) {
        let Some(voice) = self.voices.remove(&id) else {
            return;
        };
        let gain = voice.gain.gain();
        gain.cancel_scheduled_values(at).ok();
        gain.set_target_at_time(0.0, at, STEAL_FADE / 3.0).ok();
        voice.osc.stop_with_when(at + STEAL_FADE).ok();
    }

    fn release_voice(&mut self, id: VoiceId) {
        self.voices.remove(&id);
    }

    fn set_bus(&mut self, params: &BusParams) {
        let now = self.now();
        glide(&self.delay.delay_time(), params.delay_time, now);
        glide(&self.delay_mix.gain(), params.delay_mix, now);
        glide(&self.delay_feedback.gain(), params.delay_feedback, now);
        glide(&self.chorus_lfo.frequency(), params.chorus_rate, now);
        glide(&self.bus_panner.pan(), params.pan, now);
    }

    fn automate_master(&mut self, envelope: &Envelope, start: f64) {
        let gain = self.master.gain();
        gain.cancel_scheduled_values(start).ok();
        schedule(&gain, envelope, start);
    }

    fn start_drone(&mut self, drone: &DroneSpec, start: f64) -> Result<usize, AudioError> {
        let osc = OscillatorNode::new(&self.ctx).map_err(node_err("drone osc"))?;
        osc.set_type(OscillatorType::Sine);
        osc.frequency().set_value(drone.freq);
        let gain = create_gain(&self.ctx, 0.0, "drone gain")?;
        let pan = match drone.pan {
            DronePan::Fixed(p) => p,
            DronePan::FollowBall => 0.0,
        };
        let panner = create_panner(&self.ctx, pan, "drone panner")?;

        connect(&osc, &gain, ("drone osc", "drone gain"))?;
        connect(&gain, &panner, ("drone gain", "drone panner"))?;
        connect(&panner, &self.master, ("drone panner", "master"))?;

        schedule(&gain.gain(), &drone.envelope, start);
        osc.start_with_when(start).map_err(node_err("drone start"))?;

        self.drones.push(Drone {
            _osc: osc,
            _gain: gain,
            panner,
        });
        Ok(self.drones.len() - 1)
    }

    fn set_drone_pan(&mut self, index: usize, pan: f32) {
        let now = self.now();
        if let Some(drone) = self.drones.get(index) {
            glide(&drone.panner.pan(), pan.clamp(-1.0, 1.0), now);
        }
    }
}
