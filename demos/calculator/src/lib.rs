use std::sync::Arc;

use decoy_rt::{contract, inject, subject};

#[contract]
pub trait MultiplierService: Send + Sync {
    fn multiply(&self, a: i32, b: i32) -> i32;
}

#[contract]
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct RealMultiplier;

impl MultiplierService for RealMultiplier {
    fn multiply(&self, a: i32, b: i32) -> i32 {
        a * b
    }
}

#[subject]
pub struct Calculator {
    #[inject]
    service: Arc<dyn MultiplierService>,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            service: Arc::new(RealMultiplier),
        }
    }

    pub fn square(&self, x: i32) -> i32 {
        self.service.multiply(x, x)
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

#[subject]
pub struct Greeter {
    greeting: String,
}

impl Greeter {
    #[inject]
    pub fn new(greeting: String) -> Self {
        Self { greeting }
    }

    pub fn greet(&self, who: &str) -> String {
        format!("{}{who}", self.greeting)
    }
}

#[subject]
#[derive(Default)]
pub struct Receipt {
    clock: Option<Arc<dyn Clock>>,
    lines: Vec<String>,
}

impl Receipt {
    #[inject]
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = Some(clock);
    }

    pub fn add(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn stamp(&self) -> String {
        let at = self.clock.as_ref().map(|c| c.now()).unwrap_or_default();
        format!("{} 项 @ {at}", self.lines.len())
    }
}

include!(concat!(env!("OUT_DIR"), "/decoy_gen.rs"));
