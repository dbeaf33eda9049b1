use std::time::{
    Duration,
    Instant,
};

use log::{
    debug,
    info,
    trace,
};

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    INFO,
    DEBUG,
    TRACE,
}

impl LogLevel {
    fn as_log_level(&self) -> log::Level {
        match self {
            LogLevel::INFO => log::Level::Info,
            LogLevel::DEBUG => log::Level::Debug,
            LogLevel::TRACE => log::Level::Trace,
        }
    }
}

/// Logs how long a named pipeline stage took.
pub struct ContextTimer {
    start: Instant,
    name: String,
    level: LogLevel,
    pub cumtime: Duration,
}

impl ContextTimer {
    pub fn new(
        name: &str,
        report_start: bool,
        level: LogLevel,
    ) -> ContextTimer {
        let out = ContextTimer {
            start: Instant::now(),
            name: name.to_string(),
            level,
            cumtime: Duration::new(0, 0),
        };
        if report_start {
            log::log!(out.level.as_log_level(), "Started: '{}'", out.name);
        }
        out
    }

    pub fn stop(
        &mut self,
        report: bool,
    ) -> Duration {
        let duration = self.start.elapsed();
        self.cumtime += duration;
        self.start = Instant::now();
        if report {
            self.report();
        }
        duration
    }

    pub fn report(&self) {
        let secs = self.cumtime.as_secs_f64();
        match self.level {
            LogLevel::INFO => info!("Time elapsed in '{}' is: {:.02}s", self.name, secs),
            LogLevel::DEBUG => debug!("Time elapsed in '{}' is: {:.02}s", self.name, secs),
            LogLevel::TRACE => trace!("Time elapsed in '{}' is: {:.02}s", self.name, secs),
        }
    }
}
