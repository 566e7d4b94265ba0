//! Discrete-event simulation of a CEC bus shared by several engines.
//!
//! The line is wired-AND: it is high only while nobody pulls it low. Time
//! advances from one armed deadline to the next; every level change is
//! delivered as an edge to the other nodes whose capture is armed for it.
#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal_1::digital::{ErrorType, InputPin, OutputPin};
use soft_cec::cec::timing::Ticks;
use soft_cec::cec::{
    CaptureEdge, CecEngine, CecPort, Completion, EdgeCapture, SendError, NO_TIMEOUT,
};

#[derive(Default)]
struct Bus {
    now: u64,
    /// One slot per node plus one for injected noise.
    pulled_low: Vec<bool>,
    falling_edges: Vec<u64>,
}

impl Bus {
    fn level(&self) -> bool {
        !self.pulled_low.iter().any(|&low| low)
    }
}

type SharedBus = Rc<RefCell<Bus>>;

pub struct SimLine {
    bus: SharedBus,
    id: usize,
}

impl ErrorType for SimLine {
    type Error = Infallible;
}

impl OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.bus.borrow_mut().pulled_low[self.id] = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.bus.borrow_mut().pulled_low[self.id] = false;
        Ok(())
    }
}

impl InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.bus.borrow().level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.bus.borrow().level())
    }
}

pub struct SimCapture {
    bus: SharedBus,
    start: u64,
    armed: Option<(CaptureEdge, Option<u64>)>,
    event_at: Option<u64>,
}

impl SimCapture {
    fn deadline(&self) -> Option<u64> {
        self.armed.and_then(|(_, deadline)| deadline)
    }

    fn waits_for(&self, edge: CaptureEdge) -> bool {
        matches!(self.armed, Some((armed, _)) if armed == edge)
    }

    fn fire(&mut self, at: u64) {
        self.armed = None;
        self.event_at = Some(at);
    }
}

impl EdgeCapture for SimCapture {
    fn arm(&mut self, edge: CaptureEdge, timeout: Ticks) {
        self.start = self.bus.borrow().now;
        let deadline = (timeout != NO_TIMEOUT).then(|| self.start + u64::from(timeout));
        self.armed = Some((edge, deadline));
    }

    fn elapsed(&self) -> Ticks {
        let now = self.event_at.unwrap_or_else(|| self.bus.borrow().now);
        (now - self.start) as Ticks
    }

    fn stop(&mut self) {
        self.armed = None;
    }
}

pub struct Node {
    pub engine: CecEngine,
    pub port: CecPort<SimLine, SimCapture>,
    pub completions: Vec<(u64, Completion)>,
}

pub struct Sim {
    bus: SharedBus,
    pub nodes: Vec<Node>,
}

const MAX_EVENTS: usize = 1_000_000;

impl Sim {
    /// One enabled node per logical address.
    pub fn new(addrs: &[u8]) -> Self {
        let bus = Rc::new(RefCell::new(Bus {
            pulled_low: vec![false; addrs.len() + 1],
            ..Default::default()
        }));
        let nodes = addrs
            .iter()
            .enumerate()
            .map(|(id, &addr)| {
                let mut engine = CecEngine::new();
                engine.set_logical_address(addr).unwrap();
                let mut port = CecPort::new(
                    SimLine {
                        bus: bus.clone(),
                        id,
                    },
                    SimCapture {
                        bus: bus.clone(),
                        start: 0,
                        armed: None,
                        event_at: None,
                    },
                );
                engine.set_enabled(&mut port, true);
                Node {
                    engine,
                    port,
                    completions: Vec::new(),
                }
            })
            .collect();
        Self { bus, nodes }
    }

    pub fn now(&self) -> u64 {
        self.bus.borrow().now
    }

    fn level(&self) -> bool {
        self.bus.borrow().level()
    }

    fn noise_id(&self) -> usize {
        self.nodes.len()
    }

    pub fn send(&mut self, node: usize, msg: &[u8]) -> Result<(), SendError> {
        let before = self.level();
        let n = &mut self.nodes[node];
        let res = n.engine.send(&mut n.port, msg);
        self.settle(node, before);
        res
    }

    pub fn set_enabled(&mut self, node: usize, enable: bool) {
        let before = self.level();
        let n = &mut self.nodes[node];
        n.engine.set_enabled(&mut n.port, enable);
        self.settle(node, before);
    }

    /// Pulls the line low from outside for `low` ticks.
    pub fn glitch(&mut self, low: u64) {
        let noise = self.noise_id();
        let before = self.level();
        self.bus.borrow_mut().pulled_low[noise] = true;
        self.settle(noise, before);
        self.run_until(self.now() + low);
        let before = self.level();
        self.bus.borrow_mut().pulled_low[noise] = false;
        self.settle(noise, before);
    }

    /// Processes every deadline up to and including `t`.
    pub fn run_until(&mut self, t: u64) {
        for _ in 0..MAX_EVENTS {
            if !self.step(t) {
                let mut bus = self.bus.borrow_mut();
                bus.now = bus.now.max(t);
                return;
            }
        }
        panic!("bus did not settle");
    }

    /// Runs until every node waits for an edge without a deadline.
    pub fn run(&mut self) {
        for _ in 0..MAX_EVENTS {
            if !self.step(u64::MAX) {
                return;
            }
        }
        panic!("bus did not settle");
    }

    pub fn completions(&self, node: usize) -> Vec<Completion> {
        self.nodes[node]
            .completions
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Time of the first completion of `node`.
    pub fn completed_at(&self, node: usize) -> Option<u64> {
        self.nodes[node].completions.first().map(|&(t, _)| t)
    }

    pub fn falling_edges(&self) -> Vec<u64> {
        self.bus.borrow().falling_edges.clone()
    }

    fn step(&mut self, limit: u64) -> bool {
        let next = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.port.capture.deadline().map(|t| (t, id)))
            .min();
        let Some((t, id)) = next else {
            return false;
        };
        if t > limit {
            return false;
        }

        self.bus.borrow_mut().now = t;
        let before = self.level();
        let n = &mut self.nodes[id];
        n.port.capture.fire(t);
        let completion = n.engine.on_timeout(&mut n.port);
        n.port.capture.event_at = None;
        self.record(id, completion);
        self.settle(id, before);
        true
    }

    fn settle(&mut self, causer: usize, before: bool) {
        let after = self.level();
        if before == after {
            return;
        }
        let now = self.now();
        let edge = if after {
            CaptureEdge::Rising
        } else {
            self.bus.borrow_mut().falling_edges.push(now);
            CaptureEdge::Falling
        };

        let targets: Vec<usize> = (0..self.nodes.len())
            .filter(|&id| id != causer && self.nodes[id].port.capture.waits_for(edge))
            .collect();
        for id in targets {
            let before = self.level();
            let n = &mut self.nodes[id];
            n.port.capture.fire(now);
            let completion = n.engine.on_capture(&mut n.port);
            n.port.capture.event_at = None;
            self.record(id, completion);
            self.settle(id, before);
        }
    }

    fn record(&mut self, node: usize, completion: Option<Completion>) {
        if let Some(c) = completion {
            let now = self.now();
            self.nodes[node].completions.push((now, c));
        }
    }
}

/// Received completion for `bytes`.
pub fn received(bytes: &[u8]) -> Completion {
    Completion::Received(bytes.iter().copied().collect())
}
