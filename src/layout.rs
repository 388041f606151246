//! Force-directed layout for the knowledge graph.
//!
//! The integrator follows d3-force: each tick cools `alpha` toward
//! `alpha_target`, accumulates link, many-body and centering forces into
//! velocities, then applies velocity decay and moves every particle. Pinned
//! particles (the one being dragged) sit exactly on their pin.
//!
//! Nothing here owns a timer. Callers drive the simulation with
//! [`ForceSimulation::step`] from whatever clock they have (see
//! [`crate::animation`]) and call [`ForceSimulation::stop`] on teardown.

use crate::config::LayoutConfig;
use crate::graph::KnowledgeGraph;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One animation frame at 60 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_micros(16_667);
const MAX_TICKS_PER_STEP: usize = 8;
const DRAG_ALPHA_TARGET: f64 = 0.3;
const DISTANCE_MIN2: f64 = 1.0;
const JIGGLE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub width: f64,
    pub height: f64,
    pub link_distance: f64,
    pub charge_strength: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayoutParams {
    fn from(config: &LayoutConfig) -> Self {
        let alpha_min: f64 = 0.001;
        Self {
            width: config.width,
            height: config.height,
            link_distance: config.link_distance,
            charge_strength: config.charge_strength,
            alpha_min,
            // reaches alpha_min from 1.0 in 300 ticks
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationState {
    Running,
    /// Cooled below `alpha_min`; a drag wakes it up again.
    Settled,
    /// Torn down; never ticks again.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPosition {
    pub source: usize,
    pub target: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Midpoint, where the relationship label is drawn.
    pub label_x: f64,
    pub label_y: f64,
}

/// Snapshot of the layout after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub tick: u64,
    pub alpha: f64,
    pub state: SimulationState,
    pub nodes: Vec<NodePosition>,
    pub links: Vec<LinkPosition>,
}

#[derive(Debug, Clone)]
struct Spring {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

pub struct ForceSimulation {
    params: LayoutParams,
    ids: Vec<String>,
    index: HashMap<String, usize>,
    particles: Vec<Particle>,
    links: Vec<(usize, usize)>,
    springs: Vec<Spring>,
    alpha: f64,
    alpha_target: f64,
    active_drags: usize,
    state: SimulationState,
    tick: u64,
}

impl ForceSimulation {
    /// Returns `None` for a graph without entities; there is nothing to lay out.
    pub fn new(graph: &KnowledgeGraph, params: LayoutParams) -> Option<Self> {
        if graph.is_empty() {
            return None;
        }

        let ids: Vec<String> = graph.entities().map(|e| e.id.clone()).collect();
        let index = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();

        let particles = (0..ids.len())
            .map(|i| {
                // phyllotaxis arrangement
                let radius = 10.0 * (0.5 + i as f64).sqrt();
                let angle = i as f64 * std::f64::consts::PI * (3.0 - 5f64.sqrt());
                Particle {
                    x: radius * angle.cos(),
                    y: radius * angle.sin(),
                    vx: 0.0,
                    vy: 0.0,
                    fx: None,
                    fy: None,
                }
            })
            .collect();

        let links: Vec<(usize, usize)> = graph
            .links()
            .map(|(s, t, _)| (s.index(), t.index()))
            .collect();

        let degrees = graph.degrees();
        let springs = links
            .iter()
            .filter(|(s, t)| s != t)
            .map(|&(source, target)| {
                let (ds, dt) = (degrees[source] as f64, degrees[target] as f64);
                Spring {
                    source,
                    target,
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        Some(Self {
            params,
            ids,
            index,
            particles,
            links,
            springs,
            alpha: 1.0,
            alpha_target: 0.0,
            active_drags: 0,
            state: SimulationState::Running,
            tick: 0,
        })
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Advance by the ticks that fit in `dt` (at least one, at most a
    /// handful) and return the resulting frame. Does nothing once settled or
    /// stopped.
    pub fn step(&mut self, dt: Duration) -> Frame {
        let wanted = (dt.as_secs_f64() / TICK_INTERVAL.as_secs_f64()).round() as usize;
        for _ in 0..wanted.clamp(1, MAX_TICKS_PER_STEP) {
            if self.state != SimulationState::Running {
                break;
            }
            self.tick();
        }
        self.frame()
    }

    /// Tick until the simulation settles or `max_ticks` have run.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> Frame {
        for _ in 0..max_ticks {
            if self.state != SimulationState::Running {
                break;
            }
            self.tick();
        }
        self.frame()
    }

    /// Tear down: no further ticks, drags are ignored.
    pub fn stop(&mut self) {
        self.state = SimulationState::Stopped;
        self.active_drags = 0;
        self.alpha_target = 0.0;
        for p in &mut self.particles {
            p.fx = None;
            p.fy = None;
        }
    }

    /// Pin `id` where it is and reheat. Returns false for unknown ids or a
    /// stopped simulation.
    pub fn drag_start(&mut self, id: &str) -> bool {
        if self.state == SimulationState::Stopped {
            return false;
        }
        let Some(&i) = self.index.get(id) else {
            return false;
        };

        // A node that is already pinned counts as a single drag
        if self.particles[i].fx.is_none() {
            if self.active_drags == 0 {
                self.alpha_target = DRAG_ALPHA_TARGET;
                self.state = SimulationState::Running;
            }
            self.active_drags += 1;
        }

        let p = &mut self.particles[i];
        p.fx = Some(p.x);
        p.fy = Some(p.y);
        true
    }

    pub fn drag_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        if self.state == SimulationState::Stopped {
            return false;
        }
        match self.index.get(id) {
            Some(&i) if self.particles[i].fx.is_some() => {
                self.particles[i].fx = Some(x);
                self.particles[i].fy = Some(y);
                true
            }
            _ => false,
        }
    }

    /// Release the pin and let the layout cool down again.
    pub fn drag_end(&mut self, id: &str) -> bool {
        if self.state == SimulationState::Stopped {
            return false;
        }
        match self.index.get(id) {
            Some(&i) if self.particles[i].fx.is_some() => {
                self.particles[i].fx = None;
                self.particles[i].fy = None;
                self.active_drags = self.active_drags.saturating_sub(1);
                if self.active_drags == 0 {
                    self.alpha_target = 0.0;
                }
                true
            }
            _ => false,
        }
    }

    pub fn frame(&self) -> Frame {
        let nodes = self
            .ids
            .iter()
            .zip(&self.particles)
            .map(|(id, p)| NodePosition {
                id: id.clone(),
                x: p.x,
                y: p.y,
            })
            .collect();

        let links = self
            .links
            .iter()
            .map(|&(source, target)| {
                let (a, b) = (&self.particles[source], &self.particles[target]);
                LinkPosition {
                    source,
                    target,
                    x1: a.x,
                    y1: a.y,
                    x2: b.x,
                    y2: b.y,
                    label_x: (a.x + b.x) / 2.0,
                    label_y: (a.y + b.y) / 2.0,
                }
            })
            .collect();

        Frame {
            tick: self.tick,
            alpha: self.alpha,
            state: self.state,
            nodes,
            links,
        }
    }

    fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;

        self.apply_links();
        self.apply_charge();
        self.apply_center();

        let keep = 1.0 - self.params.velocity_decay;
        for p in &mut self.particles {
            match p.fx {
                Some(fx) => {
                    p.x = fx;
                    p.vx = 0.0;
                }
                None => {
                    p.vx *= keep;
                    p.x += p.vx;
                }
            }
            match p.fy {
                Some(fy) => {
                    p.y = fy;
                    p.vy = 0.0;
                }
                None => {
                    p.vy *= keep;
                    p.y += p.vy;
                }
            }
        }

        self.tick += 1;
        if self.alpha < self.params.alpha_min {
            self.state = SimulationState::Settled;
        }
    }

    fn apply_links(&mut self) {
        for spring in &self.springs {
            let (s, t) = (&self.particles[spring.source], &self.particles[spring.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            let mut y = t.y + t.vy - s.y - s.vy;
            if x == 0.0 {
                x = jiggle(spring.source, spring.target);
            }
            if y == 0.0 {
                y = jiggle(spring.target, spring.source);
            }

            let distance = (x * x + y * y).sqrt();
            let l = (distance - self.params.link_distance) / distance * self.alpha * spring.strength;
            let (x, y) = (x * l, y * l);

            let b = spring.bias;
            let target = &mut self.particles[spring.target];
            target.vx -= x * b;
            target.vy -= y * b;
            let source = &mut self.particles[spring.source];
            source.vx += x * (1.0 - b);
            source.vy += y * (1.0 - b);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.params.charge_strength;
        let alpha = self.alpha;
        let positions: Vec<(f64, f64)> = self.particles.iter().map(|p| (p.x, p.y)).collect();

        let deltas: Vec<(f64, f64)> = (0..positions.len())
            .into_par_iter()
            .map(|i| {
                let (xi, yi) = positions[i];
                let mut dvx = 0.0;
                let mut dvy = 0.0;
                for (j, &(xj, yj)) in positions.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let mut x = xj - xi;
                    let mut y = yj - yi;
                    if x == 0.0 {
                        x = jiggle(i, j);
                    }
                    if y == 0.0 {
                        y = jiggle(j, i);
                    }
                    let mut l = x * x + y * y;
                    if l < DISTANCE_MIN2 {
                        l = (DISTANCE_MIN2 * l).sqrt();
                    }
                    dvx += x * strength * alpha / l;
                    dvy += y * strength * alpha / l;
                }
                (dvx, dvy)
            })
            .collect();

        for (p, (dvx, dvy)) in self.particles.iter_mut().zip(deltas) {
            p.vx += dvx;
            p.vy += dvy;
        }
    }

    fn apply_center(&mut self) {
        let n = self.particles.len() as f64;
        let (sx, sy) = self
            .particles
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let dx = sx / n - self.params.width / 2.0;
        let dy = sy / n - self.params.height / 2.0;
        for p in &mut self.particles {
            p.x -= dx;
            p.y -= dy;
        }
    }
}

/// Tiny deterministic offset separating coincident particles. Antisymmetric
/// in its arguments so pairwise forces still cancel.
fn jiggle(a: usize, b: usize) -> f64 {
    let d = a as f64 - b as f64;
    if d == 0.0 {
        JIGGLE
    } else {
        d * JIGGLE
    }
}
